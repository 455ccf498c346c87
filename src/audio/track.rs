use crate::audio::backend::{AudioBackend, AudioClip, NodeId};
use crate::audio::AudioCategory;
use crate::error::AudioGraphError;
use tracing::trace;

/// Source and gain node of one playing track
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Track {
    pub source: NodeId,
    pub gain: NodeId,
}

/// Why a track is paused. A track resumes only once every flag is clear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PauseFlags {
    /// Paused through `pause`
    pub user: bool,
    /// Paused by muting the engine
    pub muted: bool,
}

impl PauseFlags {
    pub fn any(&self) -> bool {
        self.user || self.muted
    }
}

/// Bookkeeping needed to restart a track where it left off
#[derive(Clone, Debug, PartialEq)]
pub struct PauseState {
    pub flags: PauseFlags,
    /// Context time at which buffer offset zero would have played
    pub start_time: f64,
    /// Buffer position at the moment of pausing
    pub pause_time: f64,
    pub saved_asset_id: String,
    pub saved_loop: bool,
    /// Per-play volume multiplier
    pub saved_volume: f32,
}

impl PauseState {
    pub fn is_paused(&self) -> bool {
        self.flags.any()
    }
}

/// A track slot: live nodes while playing, none while paused
#[derive(Debug)]
pub(crate) struct Voice {
    pub track: Option<Track>,
    pub state: PauseState,
}

pub(crate) struct TrackSpec<'a> {
    pub clip: &'a AudioClip,
    pub looping: bool,
    pub fade_in: f64,
    pub gain: f32,
    pub offset: f64,
}

/// Build source → gain → destination and start playback
pub(crate) fn create_track(
    backend: &mut dyn AudioBackend,
    spec: TrackSpec,
) -> Result<Track, AudioGraphError> {
    let source = backend.create_source(spec.clip, spec.looping)?;
    let gain = match backend.create_gain() {
        Ok(gain) => gain,
        Err(err) => {
            let _ = backend.disconnect(source);
            return Err(err);
        }
    };
    let track = Track { source, gain };
    let now = backend.current_time();

    if spec.fade_in > 0.0 {
        backend.set_gain_at(gain, 0.0, now);
        backend.linear_ramp_to(gain, spec.gain, now + spec.fade_in);
    } else {
        backend.set_gain(gain, spec.gain);
    }

    let wired = backend
        .connect(source, gain)
        .and_then(|_| backend.connect_to_destination(gain))
        .and_then(|_| backend.start(source, now, spec.offset));
    if let Err(err) = wired {
        release_track(backend, track);
        return Err(err);
    }
    Ok(track)
}

/// Stop and disconnect both nodes. Already-stopped sources are fine.
pub(crate) fn release_track(backend: &mut dyn AudioBackend, track: Track) {
    match backend.stop(track.source) {
        Ok(()) | Err(AudioGraphError::AlreadyStopped) => {}
        Err(err) => trace!(source = track.source.0, error = %err, "stop failed"),
    }
    for node in [track.source, track.gain] {
        if let Err(err) = backend.disconnect(node) {
            trace!(node = node.0, error = %err, "disconnect failed");
        }
    }
}

/// Ramp the gain from its current value to silence; returns when the ramp ends
pub(crate) fn schedule_fade_out(backend: &mut dyn AudioBackend, track: Track, seconds: f64) -> f64 {
    let now = backend.current_time();
    let current = backend.gain_value(track.gain);
    backend.cancel_scheduled(track.gain, now);
    backend.set_gain_at(track.gain, current, now);
    backend.linear_ramp_to(track.gain, 0.0, now + seconds);
    now + seconds
}

/// Track fading out, released once its ramp has finished
#[derive(Clone, Copy, Debug)]
pub(crate) struct PendingStop {
    pub category: AudioCategory,
    pub track: Track,
    pub due: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SimulatedContext;

    #[test]
    fn test_create_track_with_fade_in() {
        let mut ctx = SimulatedContext::new();
        let clip = AudioClip::silent(10.0, 100);
        let track = create_track(
            &mut ctx,
            TrackSpec {
                clip: &clip,
                looping: true,
                fade_in: 2.0,
                gain: 0.5,
                offset: 1.0,
            },
        )
        .unwrap();

        assert_eq!(ctx.gain(track.gain), 0.0);
        assert_eq!(ctx.start_offset(track.source), Some(1.0));
        ctx.advance(1.0);
        assert!((ctx.gain(track.gain) - 0.25).abs() < 1e-6);
        assert_eq!(ctx.audible_sources(), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut ctx = SimulatedContext::new();
        let clip = AudioClip::silent(1.0, 100);
        let track = create_track(
            &mut ctx,
            TrackSpec {
                clip: &clip,
                looping: false,
                fade_in: 0.0,
                gain: 1.0,
                offset: 0.0,
            },
        )
        .unwrap();

        release_track(&mut ctx, track);
        release_track(&mut ctx, track);
        assert!(!ctx.is_connected(track.gain));
        assert_eq!(ctx.audible_sources(), 0);
    }

    #[test]
    fn test_fade_out_ramps_to_zero() {
        let mut ctx = SimulatedContext::new();
        let clip = AudioClip::silent(10.0, 100);
        let track = create_track(
            &mut ctx,
            TrackSpec {
                clip: &clip,
                looping: true,
                fade_in: 0.0,
                gain: 0.8,
                offset: 0.0,
            },
        )
        .unwrap();

        let due = schedule_fade_out(&mut ctx, track, 1.0);
        assert_eq!(due, 1.0);
        ctx.advance(0.5);
        assert!((ctx.gain(track.gain) - 0.4).abs() < 1e-6);
    }
}
