use crate::audio::{AudioCategory, VolumeTarget};
use crate::config::AudioSettings;
use crate::utils::unit_clamp;
use serde::Serialize;

/// Master and per-category volumes, each in `[0, 1]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeMixer {
    master: f32,
    bgm: f32,
    ambient: f32,
    narration: f32,
    sfx: f32,
}

impl VolumeMixer {
    pub fn from_settings(settings: &AudioSettings) -> Self {
        Self {
            master: unit_clamp(settings.master_volume),
            bgm: unit_clamp(settings.bgm_volume),
            ambient: unit_clamp(settings.ambient_volume),
            narration: unit_clamp(settings.narration_volume),
            sfx: unit_clamp(settings.sfx_volume),
        }
    }

    pub fn get(&self, target: VolumeTarget) -> f32 {
        match target {
            VolumeTarget::Master => self.master,
            VolumeTarget::Category(category) => self.category(category),
        }
    }

    /// Store a clamped volume and return what was stored
    pub fn set(&mut self, target: VolumeTarget, value: f32) -> f32 {
        let value = unit_clamp(value);
        let slot = match target {
            VolumeTarget::Master => &mut self.master,
            VolumeTarget::Category(AudioCategory::Bgm) => &mut self.bgm,
            VolumeTarget::Category(AudioCategory::Ambient) => &mut self.ambient,
            VolumeTarget::Category(AudioCategory::Narration) => &mut self.narration,
            VolumeTarget::Category(AudioCategory::Sfx) => &mut self.sfx,
        };
        *slot = value;
        value
    }

    pub fn category(&self, category: AudioCategory) -> f32 {
        match category {
            AudioCategory::Bgm => self.bgm,
            AudioCategory::Ambient => self.ambient,
            AudioCategory::Narration => self.narration,
            AudioCategory::Sfx => self.sfx,
        }
    }

    /// Gain applied to a track: category * master * per-play multiplier
    pub fn effective(&self, category: AudioCategory, multiplier: f32) -> f32 {
        self.category(category) * self.master * multiplier.max(0.0)
    }
}

impl Default for VolumeMixer {
    fn default() -> Self {
        Self::from_settings(&AudioSettings::default())
    }
}

/// Snapshot for volume sliders, in whole percent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VolumeControls {
    pub master: u8,
    pub bgm: u8,
    pub ambient: u8,
    pub narration: u8,
    pub sfx: u8,
    pub muted: bool,
}

impl VolumeControls {
    pub fn new(mixer: &VolumeMixer, muted: bool) -> Self {
        let percent = |value: f32| (value * 100.0).round() as u8;
        Self {
            master: percent(mixer.master),
            bgm: percent(mixer.bgm),
            ambient: percent(mixer.ambient),
            narration: percent(mixer.narration),
            sfx: percent(mixer.sfx),
            muted,
        }
    }
}
