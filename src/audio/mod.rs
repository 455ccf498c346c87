// Audio Module
//
// Layered playback on top of a platform audio graph:
// - Four categories with independent volume (bgm, ambient, narration, sfx)
// - Single-owner categories replace their track, multi-instance categories stack
// - Pause/resume by offset, fades as scheduled gain automation
// - Headless simulated context for tests and servers

pub mod backend;
pub mod engine;
pub mod mixer;
pub mod simulated;
mod track;

pub use backend::{AudioBackend, AudioClip, ContextState, NodeId};
pub use engine::{AudioEngine, ContextSource};
pub use mixer::{VolumeControls, VolumeMixer};
pub use simulated::SimulatedContext;
pub use track::{PauseFlags, PauseState};

use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Playback category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCategory {
    Bgm,
    Ambient,
    Narration,
    Sfx,
}

impl AudioCategory {
    pub const ALL: [AudioCategory; 4] = [
        AudioCategory::Bgm,
        AudioCategory::Ambient,
        AudioCategory::Narration,
        AudioCategory::Sfx,
    ];

    /// At most one track at a time; a new play replaces the old one
    pub fn is_single_owner(self) -> bool {
        matches!(self, AudioCategory::Bgm | AudioCategory::Narration)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AudioCategory::Bgm => "bgm",
            AudioCategory::Ambient => "ambient",
            AudioCategory::Narration => "narration",
            AudioCategory::Sfx => "sfx",
        }
    }
}

impl fmt::Display for AudioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioCategory {
    type Err = RuntimeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "bgm" => Ok(AudioCategory::Bgm),
            "ambient" => Ok(AudioCategory::Ambient),
            "narration" => Ok(AudioCategory::Narration),
            "sfx" => Ok(AudioCategory::Sfx),
            _ => Err(RuntimeError::Config(format!("unknown audio category '{name}'"))),
        }
    }
}

/// What a volume setter addresses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VolumeTarget {
    Master,
    Category(AudioCategory),
}

impl From<AudioCategory> for VolumeTarget {
    fn from(category: AudioCategory) -> Self {
        VolumeTarget::Category(category)
    }
}

impl FromStr for VolumeTarget {
    type Err = RuntimeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("master") {
            Ok(VolumeTarget::Master)
        } else {
            name.parse().map(VolumeTarget::Category)
        }
    }
}

/// Per-play options
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayOptions {
    pub looping: bool,
    /// Linear ramp from silence, seconds
    pub fade_in: f64,
    /// Multiplier on top of category and master volume
    pub volume: f32,
    /// Start position in the clip, seconds
    pub offset: f64,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            looping: false,
            fade_in: 0.0,
            volume: 1.0,
            offset: 0.0,
        }
    }
}

impl PlayOptions {
    pub fn looped() -> Self {
        Self {
            looping: true,
            ..Self::default()
        }
    }

    pub fn fade_in(mut self, seconds: f64) -> Self {
        self.fade_in = seconds;
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn offset(mut self, seconds: f64) -> Self {
        self.offset = seconds;
        self
    }
}

/// Key of one multi-instance track
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(String);

impl InstanceId {
    /// `<asset>_<millis>_<counter>`, unique within the process
    pub(crate) fn mint(asset_id: &str) -> Self {
        InstanceId(format!(
            "{asset_id}_{}_{}",
            crate::utils::timestamp_millis(),
            crate::utils::next_id()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returned by a successful play
#[derive(Clone, Debug, PartialEq)]
pub struct TrackHandle {
    pub category: AudioCategory,
    pub asset_id: String,
    /// Set for ambient and sfx plays
    pub instance: Option<InstanceId>,
    pub source: NodeId,
    pub gain: NodeId,
}
