//! Category-scoped audio playback.
//!
//! The engine owns the audio context and every track. Bgm and narration hold at most one track
//! each; ambient and sfx hold any number of instances keyed by [`InstanceId`]. Every track keeps a
//! [`PauseState`] so it can be torn down on pause and rebuilt at the same buffer offset on resume.
//!
//! Nothing here fails loudly: unknown assets, a missing context and graph errors are logged and
//! turned into `None` or no-ops.

use crate::audio::backend::{AudioBackend, AudioClip, ContextState, NodeId};
use crate::audio::mixer::{VolumeControls, VolumeMixer};
use crate::audio::track::{
    create_track, release_track, schedule_fade_out, PauseFlags, PauseState, PendingStop,
    TrackSpec, Voice,
};
use crate::audio::{AudioCategory, InstanceId, PlayOptions, TrackHandle, VolumeTarget};
use crate::config::AudioSettings;
use crate::lifecycle::LifecycleEvent;
use ahash::AHashMap;
#[cfg(feature = "profiling")]
use tracing::info_span;
use tracing::{debug, info, trace, warn};

type ContextFactory = Box<dyn FnMut() -> Option<Box<dyn AudioBackend>>>;

/// Where the engine gets its audio context from, on first use
pub enum ContextSource {
    /// Reuse an existing context, usually the one the loader decoded with
    Shared(Box<dyn AudioBackend>),
    /// Create one; `None` means the platform has no audio. Retried on later plays.
    Factory(ContextFactory),
    Unavailable,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum VoiceKey {
    Single(AudioCategory),
    Instance(AudioCategory, InstanceId),
}

impl VoiceKey {
    fn category(&self) -> AudioCategory {
        match self {
            VoiceKey::Single(category) | VoiceKey::Instance(category, _) => *category,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum PauseReason {
    User,
    Mute,
}

/// Track slots per category
#[derive(Debug, Default)]
struct Lanes {
    bgm: Option<Voice>,
    narration: Option<Voice>,
    ambient: AHashMap<InstanceId, Voice>,
    sfx: AHashMap<InstanceId, Voice>,
}

impl Lanes {
    fn single_mut(&mut self, category: AudioCategory) -> Option<&mut Option<Voice>> {
        match category {
            AudioCategory::Bgm => Some(&mut self.bgm),
            AudioCategory::Narration => Some(&mut self.narration),
            AudioCategory::Ambient | AudioCategory::Sfx => None,
        }
    }

    fn instances(&self, category: AudioCategory) -> Option<&AHashMap<InstanceId, Voice>> {
        match category {
            AudioCategory::Ambient => Some(&self.ambient),
            AudioCategory::Sfx => Some(&self.sfx),
            AudioCategory::Bgm | AudioCategory::Narration => None,
        }
    }

    fn instances_mut(&mut self, category: AudioCategory) -> Option<&mut AHashMap<InstanceId, Voice>> {
        match category {
            AudioCategory::Ambient => Some(&mut self.ambient),
            AudioCategory::Sfx => Some(&mut self.sfx),
            AudioCategory::Bgm | AudioCategory::Narration => None,
        }
    }

    fn get(&self, key: &VoiceKey) -> Option<&Voice> {
        match key {
            VoiceKey::Single(AudioCategory::Bgm) => self.bgm.as_ref(),
            VoiceKey::Single(AudioCategory::Narration) => self.narration.as_ref(),
            VoiceKey::Single(_) => None,
            VoiceKey::Instance(category, id) => self.instances(*category)?.get(id),
        }
    }

    fn get_mut(&mut self, key: &VoiceKey) -> Option<&mut Voice> {
        match key {
            VoiceKey::Single(category) => self.single_mut(*category)?.as_mut(),
            VoiceKey::Instance(category, id) => self.instances_mut(*category)?.get_mut(id),
        }
    }

    fn insert(&mut self, key: &VoiceKey, voice: Voice) {
        match key {
            VoiceKey::Single(category) => {
                if let Some(slot) = self.single_mut(*category) {
                    *slot = Some(voice);
                }
            }
            VoiceKey::Instance(category, id) => {
                if let Some(map) = self.instances_mut(*category) {
                    map.insert(id.clone(), voice);
                }
            }
        }
    }

    fn remove(&mut self, key: &VoiceKey) -> Option<Voice> {
        match key {
            VoiceKey::Single(category) => self.single_mut(*category)?.take(),
            VoiceKey::Instance(category, id) => self.instances_mut(*category)?.remove(id),
        }
    }

    /// Keys addressed by a category and optional instance
    fn keys(&self, category: AudioCategory, instance: Option<&InstanceId>) -> Vec<VoiceKey> {
        if category.is_single_owner() {
            let key = VoiceKey::Single(category);
            return self.get(&key).map(|_| key).into_iter().collect();
        }
        let Some(map) = self.instances(category) else {
            return Vec::new();
        };
        match instance {
            Some(id) if map.contains_key(id) => vec![VoiceKey::Instance(category, id.clone())],
            Some(_) => Vec::new(),
            None => map
                .keys()
                .map(|id| VoiceKey::Instance(category, id.clone()))
                .collect(),
        }
    }

    fn all_keys(&self) -> Vec<VoiceKey> {
        AudioCategory::ALL
            .into_iter()
            .flat_map(|category| self.keys(category, None))
            .collect()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (AudioCategory, &mut Voice)> {
        self.bgm
            .iter_mut()
            .map(|voice| (AudioCategory::Bgm, voice))
            .chain(
                self.narration
                    .iter_mut()
                    .map(|voice| (AudioCategory::Narration, voice)),
            )
            .chain(
                self.ambient
                    .values_mut()
                    .map(|voice| (AudioCategory::Ambient, voice)),
            )
            .chain(self.sfx.values_mut().map(|voice| (AudioCategory::Sfx, voice)))
    }
}

/// Layered audio playback over an [`AudioBackend`]
pub struct AudioEngine {
    settings: AudioSettings,
    clips: AHashMap<String, AudioClip>,
    source: ContextSource,
    context: Option<Box<dyn AudioBackend>>,
    awaiting_gesture: bool,
    lifecycle_suspended: bool,
    mixer: VolumeMixer,
    muted: bool,
    lanes: Lanes,
    /// Playing source → owning slot, for natural-end handling
    live: AHashMap<NodeId, VoiceKey>,
    pending_stops: Vec<PendingStop>,
    destroyed: bool,
}

impl AudioEngine {
    pub fn new(
        clips: AHashMap<String, AudioClip>,
        source: ContextSource,
        settings: AudioSettings,
    ) -> Self {
        Self {
            mixer: VolumeMixer::from_settings(&settings),
            settings,
            clips,
            source,
            context: None,
            awaiting_gesture: false,
            lifecycle_suspended: false,
            muted: false,
            lanes: Lanes::default(),
            live: AHashMap::new(),
            pending_stops: Vec::new(),
            destroyed: false,
        }
    }

    /// Acquire the context on first use. False when no usable context exists.
    fn ensure_context(&mut self) -> bool {
        if self.context.is_none() && !self.destroyed {
            let acquired = match std::mem::replace(&mut self.source, ContextSource::Unavailable) {
                ContextSource::Shared(context) => Some(context),
                ContextSource::Factory(mut factory) => {
                    let context = factory();
                    if context.is_none() {
                        self.source = ContextSource::Factory(factory);
                    }
                    context
                }
                ContextSource::Unavailable => None,
            };

            if let Some(context) = acquired {
                if context.state() == ContextState::Suspended {
                    info!("audio context suspended until the next user gesture");
                    self.awaiting_gesture = true;
                }
                self.context = Some(context);
            }
        }

        matches!(
            self.context.as_deref().map(|context| context.state()),
            Some(ContextState::Running | ContextState::Suspended)
        )
    }

    /// Start a track. `None` when muted, without a context, or for an unknown asset.
    pub fn play(
        &mut self,
        asset_id: &str,
        category: AudioCategory,
        options: PlayOptions,
    ) -> Option<TrackHandle> {
        if self.destroyed {
            warn!(asset = asset_id, "play after destroy ignored");
            return None;
        }
        if self.muted {
            debug!(asset = asset_id, %category, "muted, play ignored");
            return None;
        }
        if !self.ensure_context() {
            warn!(asset = asset_id, "no audio context, play ignored");
            return None;
        }
        let Some(clip) = self.clips.get(asset_id).cloned() else {
            warn!(asset = asset_id, "unknown audio asset");
            return None;
        };

        // Sfx are one-shots: no fade, always from the start
        let (fade_in, offset) = if category == AudioCategory::Sfx {
            (0.0, 0.0)
        } else {
            (non_negative_secs(options.fade_in), non_negative_secs(options.offset))
        };
        let volume = if options.volume.is_finite() {
            options.volume.max(0.0)
        } else {
            1.0
        };

        let key = if category.is_single_owner() {
            let key = VoiceKey::Single(category);
            if let Some(previous) = self.lanes.remove(&key) {
                self.retire(category, previous, 0.0);
            }
            key
        } else {
            VoiceKey::Instance(category, InstanceId::mint(asset_id))
        };

        let context = self.context.as_deref_mut()?;
        let spec = TrackSpec {
            clip: &clip,
            looping: options.looping,
            fade_in,
            gain: self.mixer.effective(category, volume),
            offset,
        };
        let track = match create_track(context, spec) {
            Ok(track) => track,
            Err(err) => {
                warn!(asset = asset_id, error = %err, "could not create track");
                return None;
            }
        };
        let now = context.current_time();

        self.live.insert(track.source, key.clone());
        self.lanes.insert(
            &key,
            Voice {
                track: Some(track),
                state: PauseState {
                    flags: PauseFlags::default(),
                    start_time: now - offset,
                    pause_time: 0.0,
                    saved_asset_id: asset_id.to_string(),
                    saved_loop: options.looping,
                    saved_volume: volume,
                },
            },
        );
        debug!(asset = asset_id, %category, looping = options.looping, "track started");

        Some(TrackHandle {
            category,
            asset_id: asset_id.to_string(),
            instance: match key {
                VoiceKey::Instance(_, id) => Some(id),
                VoiceKey::Single(_) => None,
            },
            source: track.source,
            gain: track.gain,
        })
    }

    /// [`play`](Self::play) with a category name, as used by scripted triggers
    pub fn play_named(
        &mut self,
        asset_id: &str,
        category: &str,
        options: PlayOptions,
    ) -> Option<TrackHandle> {
        match category.parse() {
            Ok(category) => self.play(asset_id, category, options),
            Err(err) => {
                warn!(asset = asset_id, error = %err, "play ignored");
                None
            }
        }
    }

    /// Stop a category. Single-owner categories ignore `instance`; multi-instance categories stop
    /// every instance when it is `None`. Sfx always stop immediately.
    pub fn stop(&mut self, category: AudioCategory, fade_out: f64, instance: Option<&InstanceId>) {
        let fade = if category == AudioCategory::Sfx {
            0.0
        } else {
            non_negative_secs(fade_out)
        };

        for key in self.lanes.keys(category, instance) {
            if let Some(voice) = self.lanes.remove(&key) {
                self.retire(category, voice, fade);
            }
        }

        if fade == 0.0 && instance.is_none() {
            self.flush_pending(Some(category));
        }
    }

    /// Stop with the configured default fade
    pub fn stop_default(&mut self, category: AudioCategory) {
        self.stop(category, self.settings.default_fade_out, None);
    }

    /// Release a removed voice's nodes, now or after a fade
    fn retire(&mut self, category: AudioCategory, voice: Voice, fade: f64) {
        let Some(track) = voice.track else {
            return;
        };
        self.live.remove(&track.source);
        let Some(context) = self.context.as_deref_mut() else {
            return;
        };

        if fade > 0.0 {
            let due = schedule_fade_out(context, track, fade);
            self.pending_stops.push(PendingStop {
                category,
                track,
                due,
            });
        } else {
            release_track(context, track);
        }
    }

    /// Release fading tracks before their timer fires
    fn flush_pending(&mut self, category: Option<AudioCategory>) {
        let (flushed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_stops)
            .into_iter()
            .partition(|pending| category.map_or(true, |c| pending.category == c));
        self.pending_stops = kept;

        if let Some(context) = self.context.as_deref_mut() {
            let now = context.current_time();
            for pending in flushed {
                context.cancel_scheduled(pending.track.gain, now);
                release_track(context, pending.track);
            }
        }
    }

    pub fn pause(&mut self, category: AudioCategory, instance: Option<&InstanceId>) {
        for key in self.lanes.keys(category, instance) {
            self.pause_voice(&key, PauseReason::User);
        }
    }

    pub fn resume(&mut self, category: AudioCategory, instance: Option<&InstanceId>) {
        let muted = self.muted;
        for key in self.lanes.keys(category, instance) {
            if let Some(voice) = self.lanes.get_mut(&key) {
                voice.state.flags.user = false;
                // While muted the track waits for unmute instead
                if muted && voice.track.is_none() {
                    voice.state.flags.muted = true;
                }
            }
            self.restart_voice(&key);
        }
    }

    fn pause_voice(&mut self, key: &VoiceKey, reason: PauseReason) {
        let Some(voice) = self.lanes.get_mut(key) else {
            return;
        };
        if matches!(reason, PauseReason::Mute) && voice.track.is_none() {
            return;
        }
        match reason {
            PauseReason::User => voice.state.flags.user = true,
            PauseReason::Mute => voice.state.flags.muted = true,
        }

        let Some(track) = voice.track.take() else {
            return;
        };
        self.live.remove(&track.source);
        if let Some(context) = self.context.as_deref_mut() {
            let now = context.current_time();
            voice.state.pause_time = (now - voice.state.start_time).max(0.0);
            release_track(context, track);
        }
        trace!(asset = %voice.state.saved_asset_id, at = voice.state.pause_time, ?reason, "paused");
    }

    /// Rebuild a paused voice at its saved offset once nothing holds it paused
    fn restart_voice(&mut self, key: &VoiceKey) {
        let Some(context) = self.context.as_deref_mut() else {
            return;
        };
        let Some(voice) = self.lanes.get_mut(key) else {
            return;
        };
        if voice.state.is_paused() || voice.track.is_some() {
            return;
        }
        let Some(clip) = self.clips.get(&voice.state.saved_asset_id) else {
            warn!(asset = %voice.state.saved_asset_id, "cannot resume unknown asset");
            return;
        };

        let category = key.category();
        let duration = clip.duration();
        let mut offset = voice.state.pause_time;
        if voice.state.saved_loop && duration > 0.0 {
            offset %= duration;
        }
        let fade_in = if category.is_single_owner() {
            self.settings.resume_fade_single
        } else {
            self.settings.resume_fade_multi
        };

        let spec = TrackSpec {
            clip,
            looping: voice.state.saved_loop,
            fade_in,
            gain: self.mixer.effective(category, voice.state.saved_volume),
            offset,
        };
        match create_track(context, spec) {
            Ok(track) => {
                voice.state.start_time = context.current_time() - offset;
                voice.track = Some(track);
                self.live.insert(track.source, key.clone());
                trace!(asset = %voice.state.saved_asset_id, offset, "resumed");
            }
            Err(err) => {
                warn!(asset = %voice.state.saved_asset_id, error = %err, "could not resume track")
            }
        }
    }

    /// Set a volume (clamped to `[0, 1]`) and re-apply gains in scope. Returns the stored value.
    pub fn set_volume(&mut self, target: VolumeTarget, value: f32) -> f32 {
        if !value.is_finite() {
            warn!(?target, value, "ignoring non-finite volume");
            return self.mixer.get(target);
        }
        let applied = self.mixer.set(target, value);

        let Some(context) = self.context.as_deref_mut() else {
            return applied;
        };
        let mixer = self.mixer;
        for (category, voice) in self.lanes.iter_mut() {
            let in_scope = match target {
                VolumeTarget::Master => true,
                VolumeTarget::Category(target) => target == category,
            };
            if let (true, Some(track)) = (in_scope, voice.track) {
                context.set_gain(track.gain, mixer.effective(category, voice.state.saved_volume));
            }
        }
        applied
    }

    pub fn get_volume(&self, target: VolumeTarget) -> f32 {
        self.mixer.get(target)
    }

    /// Flip mute. Muting pauses every playing track; unmuting resumes only those the mute paused.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        let keys = self.lanes.all_keys();

        if self.muted {
            for key in &keys {
                self.pause_voice(key, PauseReason::Mute);
            }
        } else {
            for key in &keys {
                if let Some(voice) = self.lanes.get_mut(key) {
                    voice.state.flags.muted = false;
                }
                self.restart_voice(key);
            }
        }

        info!(muted = self.muted, "mute toggled");
        self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Whether any track of the category is audible (present and not paused)
    pub fn is_playing(&self, category: AudioCategory) -> bool {
        self.lanes
            .keys(category, None)
            .iter()
            .filter_map(|key| self.lanes.get(key))
            .any(|voice| voice.track.is_some())
    }

    /// Pause bookkeeping of a track, `instance` ignored for single-owner categories
    pub fn pause_state(
        &self,
        category: AudioCategory,
        instance: Option<&InstanceId>,
    ) -> Option<&PauseState> {
        let key = if category.is_single_owner() {
            VoiceKey::Single(category)
        } else {
            VoiceKey::Instance(category, instance?.clone())
        };
        self.lanes.get(&key).map(|voice| &voice.state)
    }

    /// Live instance ids of a multi-instance category
    pub fn instances(&self, category: AudioCategory) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self
            .lanes
            .instances(category)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Advance fades and reap tracks that finished on their own. Call once per frame.
    pub fn update(&mut self) {
        #[cfg(feature = "profiling")]
        let span = info_span!("audio.update", live = self.live.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let Some(context) = self.context.as_deref_mut() else {
            return;
        };
        let now = context.current_time();

        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_stops)
            .into_iter()
            .partition(|pending| pending.due <= now);
        self.pending_stops = waiting;
        for pending in due {
            release_track(context, pending.track);
        }

        for source in context.drain_ended() {
            let Some(key) = self.live.remove(&source) else {
                continue;
            };
            if let Some(voice) = self.lanes.remove(&key) {
                if let Some(track) = voice.track {
                    release_track(context, track);
                }
                debug!(asset = %voice.state.saved_asset_id, category = %key.category(), "track finished");
            }
        }
    }

    /// React to page lifecycle: suspend the context while hidden
    pub fn on_lifecycle(&mut self, event: LifecycleEvent) {
        let Some(context) = self.context.as_deref_mut() else {
            return;
        };
        match event {
            LifecycleEvent::Pause => {
                if context.state() == ContextState::Running {
                    context.suspend();
                    self.lifecycle_suspended = true;
                }
            }
            LifecycleEvent::Resume => {
                if self.lifecycle_suspended {
                    self.lifecycle_suspended = false;
                    if context.state() == ContextState::Suspended {
                        context.resume();
                    }
                }
            }
        }
    }

    /// First user interaction: resume a context the platform started suspended
    pub fn notify_user_gesture(&mut self) {
        if !self.ensure_context() || !self.awaiting_gesture {
            return;
        }
        self.awaiting_gesture = false;
        if let Some(context) = self.context.as_deref_mut() {
            if context.state() == ContextState::Suspended {
                context.resume();
                info!("audio context resumed by user gesture");
            }
        }
    }

    /// Resume the context if needed and loop the configured background track
    pub fn start_default_bgm(&mut self) -> Option<TrackHandle> {
        if !self.ensure_context() {
            return None;
        }
        if let Some(context) = self.context.as_deref_mut() {
            if context.state() == ContextState::Suspended {
                context.resume();
            }
        }
        self.awaiting_gesture = false;

        let asset = self.settings.default_bgm.clone();
        let options = PlayOptions::looped().fade_in(self.settings.default_bgm_fade_in);
        self.play(&asset, AudioCategory::Bgm, options)
    }

    /// Stop everything without fades and close the context
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        for category in AudioCategory::ALL {
            self.stop(category, 0.0, None);
        }
        self.flush_pending(None);
        self.live.clear();

        if let Some(mut context) = self.context.take() {
            context.close();
        }
        self.destroyed = true;
        info!("audio engine destroyed");
    }

    pub fn context_state(&self) -> Option<ContextState> {
        self.context.as_deref().map(|context| context.state())
    }

    pub fn volume_controls(&self) -> VolumeControls {
        VolumeControls::new(&self.mixer, self.muted)
    }

    pub fn has_clip(&self, asset_id: &str) -> bool {
        self.clips.contains_key(asset_id)
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    // Shorthands kept for UI and scene scripts written against the flat API

    pub fn play_bgm(&mut self, asset_id: &str, looping: bool, fade_in: f64) -> Option<TrackHandle> {
        let options = PlayOptions {
            looping,
            fade_in,
            ..PlayOptions::default()
        };
        self.play(asset_id, AudioCategory::Bgm, options)
    }

    pub fn stop_bgm(&mut self, fade_out: f64) {
        self.stop(AudioCategory::Bgm, fade_out, None);
    }

    pub fn pause_bgm(&mut self) {
        self.pause(AudioCategory::Bgm, None);
    }

    pub fn resume_bgm(&mut self) {
        self.resume(AudioCategory::Bgm, None);
    }

    pub fn play_sfx(&mut self, asset_id: &str, volume: f32) -> Option<TrackHandle> {
        self.play(
            asset_id,
            AudioCategory::Sfx,
            PlayOptions::default().volume(volume),
        )
    }

    pub fn set_master_volume(&mut self, value: f32) -> f32 {
        self.set_volume(VolumeTarget::Master, value)
    }

    pub fn set_bgm_volume(&mut self, value: f32) -> f32 {
        self.set_volume(AudioCategory::Bgm.into(), value)
    }

    pub fn set_ambient_volume(&mut self, value: f32) -> f32 {
        self.set_volume(AudioCategory::Ambient.into(), value)
    }

    pub fn set_sfx_volume(&mut self, value: f32) -> f32 {
        self.set_volume(AudioCategory::Sfx.into(), value)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Non-finite durations collapse to zero
fn non_negative_secs(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SimulatedContext;

    fn engine_with(ctx: &SimulatedContext) -> AudioEngine {
        let mut clips = AHashMap::new();
        clips.insert("theme".to_string(), AudioClip::silent(10.0, 100));
        clips.insert("click".to_string(), AudioClip::silent(0.5, 100));
        AudioEngine::new(
            clips,
            ContextSource::Shared(Box::new(ctx.clone())),
            AudioSettings::default(),
        )
    }

    #[test]
    fn test_unknown_asset_returns_none() {
        let ctx = SimulatedContext::new();
        let mut engine = engine_with(&ctx);
        assert!(engine
            .play("missing", AudioCategory::Bgm, PlayOptions::default())
            .is_none());
        assert!(engine
            .play_named("theme", "voice", PlayOptions::default())
            .is_none());
    }

    #[test]
    fn test_unavailable_context_is_noop() {
        let mut engine = AudioEngine::new(
            AHashMap::new(),
            ContextSource::Factory(Box::new(|| None)),
            AudioSettings::default(),
        );
        assert!(engine
            .play("theme", AudioCategory::Bgm, PlayOptions::default())
            .is_none());
        engine.pause(AudioCategory::Bgm, None);
        engine.update();
        assert!(engine.toggle_mute());
        engine.destroy();
    }

    #[test]
    fn test_sfx_ignores_fade_and_offset() {
        let ctx = SimulatedContext::new();
        let mut engine = engine_with(&ctx);
        let handle = engine
            .play(
                "click",
                AudioCategory::Sfx,
                PlayOptions::default().fade_in(3.0).offset(0.2),
            )
            .unwrap();

        assert_eq!(ctx.start_offset(handle.source), Some(0.0));
        assert_eq!(ctx.gain(handle.gain), 1.0);
    }

    #[test]
    fn test_fading_stop_releases_after_due_time() {
        let ctx = SimulatedContext::new();
        let mut engine = engine_with(&ctx);
        let handle = engine
            .play("theme", AudioCategory::Bgm, PlayOptions::looped())
            .unwrap();

        engine.stop(AudioCategory::Bgm, 1.0, None);
        assert!(!engine.is_playing(AudioCategory::Bgm));
        assert!(ctx.is_playing(handle.source));

        ctx.advance(0.5);
        engine.update();
        assert!(ctx.is_playing(handle.source));

        ctx.advance(0.6);
        engine.update();
        assert!(!ctx.is_playing(handle.source));
        assert!(!ctx.is_connected(handle.gain));
    }

    #[test]
    fn test_zero_fade_stop_flushes_pending_fade() {
        let ctx = SimulatedContext::new();
        let mut engine = engine_with(&ctx);
        let handle = engine
            .play("theme", AudioCategory::Bgm, PlayOptions::looped())
            .unwrap();

        engine.stop(AudioCategory::Bgm, 2.0, None);
        engine.stop(AudioCategory::Bgm, 0.0, None);
        assert!(!ctx.is_playing(handle.source));

        ctx.advance(3.0);
        engine.update();
        assert_eq!(ctx.audible_sources(), 0);
    }

    #[test]
    fn test_infinite_fade_stops_immediately() {
        let ctx = SimulatedContext::new();
        let mut engine = engine_with(&ctx);
        let handle = engine
            .play("theme", AudioCategory::Bgm, PlayOptions::looped())
            .unwrap();

        engine.stop(AudioCategory::Bgm, f64::INFINITY, None);
        assert!(!ctx.is_playing(handle.source));
        assert!(!ctx.is_connected(handle.gain));

        let handle = engine
            .play(
                "theme",
                AudioCategory::Bgm,
                PlayOptions::looped().fade_in(f64::NAN).offset(f64::INFINITY),
            )
            .unwrap();
        assert!((ctx.gain(handle.gain) - 0.5).abs() < 1e-5);
        engine.stop(AudioCategory::Bgm, f64::NAN, None);
        assert_eq!(ctx.audible_sources(), 0);
    }

    #[test]
    fn test_lifecycle_suspends_context() {
        let ctx = SimulatedContext::new();
        let mut engine = engine_with(&ctx);
        engine.play("theme", AudioCategory::Bgm, PlayOptions::looped());

        engine.on_lifecycle(LifecycleEvent::Pause);
        engine.on_lifecycle(LifecycleEvent::Pause);
        assert_eq!(engine.context_state(), Some(ContextState::Suspended));

        engine.on_lifecycle(LifecycleEvent::Resume);
        assert_eq!(engine.context_state(), Some(ContextState::Running));
    }

    #[test]
    fn test_user_gesture_resumes_suspended_context_once() {
        let ctx = SimulatedContext::suspended();
        let mut engine = engine_with(&ctx);

        engine.notify_user_gesture();
        engine.notify_user_gesture();
        assert_eq!(ctx.resume_calls(), 1);
        assert_eq!(engine.context_state(), Some(ContextState::Running));
    }

    #[test]
    fn test_destroy_closes_context() {
        let ctx = SimulatedContext::new();
        let mut engine = engine_with(&ctx);
        engine.play("theme", AudioCategory::Bgm, PlayOptions::looped().fade_in(1.0));
        engine.stop(AudioCategory::Bgm, 1.0, None);

        engine.destroy();
        assert_eq!(ctx.state(), ContextState::Closed);
        assert!(engine
            .play("theme", AudioCategory::Bgm, PlayOptions::default())
            .is_none());
    }
}
