//! Runtime configuration.
//!
//! Settings are plain serde structs with defaults, so a partial JSON document only overrides
//! what it names. [`RuntimeOptions`] comes from the page query string instead.

use crate::assets::LoaderSettings;
use crate::error::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Audio engine defaults
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub master_volume: f32,
    pub bgm_volume: f32,
    pub ambient_volume: f32,
    pub narration_volume: f32,
    pub sfx_volume: f32,
    /// Fade used by `stop` when the caller does not pick one
    pub default_fade_out: f64,
    /// Fade-in when a bgm or narration track resumes
    pub resume_fade_single: f64,
    /// Fade-in when an ambient or sfx instance resumes
    pub resume_fade_multi: f64,
    /// Asset started by `start_default_bgm`
    pub default_bgm: String,
    pub default_bgm_fade_in: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            bgm_volume: 0.5,
            ambient_volume: 0.6,
            narration_volume: 0.8,
            sfx_volume: 1.0,
            default_fade_out: 1.0,
            resume_fade_single: 0.3,
            resume_fade_multi: 0.1,
            default_bgm: "bgmBrattEveretAlmond".to_string(),
            default_bgm_fade_in: 2.0,
        }
    }
}

/// Frame clock limits
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    /// Upper bound for a single frame delta, seconds
    pub max_delta: f32,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self { max_delta: 0.05 }
    }
}

/// Which world the experience builds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SceneVariant {
    #[default]
    World,
    DevEnvironment,
}

/// Switches read from the page URL
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// `mode=debug` enables instrumentation panels
    pub debug: bool,
    pub scene: SceneVariant,
}

impl RuntimeOptions {
    /// Parse `?mode=debug&scene=dev`. Unknown keys are ignored.
    pub fn from_query(query: &str) -> Self {
        let mut options = RuntimeOptions::default();
        let query = query.trim_start_matches('?');

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "mode" => options.debug = value == "debug",
                "scene" if matches!(value, "dev" | "devEnvironment") => {
                    options.scene = SceneVariant::DevEnvironment
                }
                "scene" => options.scene = SceneVariant::World,
                _ => {}
            }
        }
        options
    }
}

/// Settings document for a whole runtime
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub audio: AudioSettings,
    pub clock: ClockSettings,
    pub loader: LoaderSettings,
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(json).map_err(|err| RuntimeError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<()> {
        if !(self.clock.max_delta.is_finite() && self.clock.max_delta > 0.0) {
            return Err(RuntimeError::Config(format!(
                "clock.max_delta must be positive, got {}",
                self.clock.max_delta
            )));
        }
        let fades = [
            self.audio.default_fade_out,
            self.audio.resume_fade_single,
            self.audio.resume_fade_multi,
            self.audio.default_bgm_fade_in,
        ];
        if fades.iter().any(|fade| !fade.is_finite() || *fade < 0.0) {
            return Err(RuntimeError::Config(
                "audio fades must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_switches() {
        let options = RuntimeOptions::from_query("?mode=debug&scene=dev");
        assert!(options.debug);
        assert_eq!(options.scene, SceneVariant::DevEnvironment);

        let options = RuntimeOptions::from_query("mode=release&other=1");
        assert_eq!(options, RuntimeOptions::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = RuntimeConfig::from_json(
            r#"{"audio": {"bgm_volume": 0.2}, "loader": {"base_url": "http://localhost/"}}"#,
        )
        .unwrap();

        assert_eq!(config.audio.bgm_volume, 0.2);
        assert_eq!(config.audio.sfx_volume, 1.0);
        assert_eq!(config.clock.max_delta, 0.05);
        assert_eq!(config.loader.base_url.as_deref(), Some("http://localhost/"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            RuntimeConfig::from_json(r#"{"clock": {"max_delta": 0.0}}"#),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_json(r#"{"audio": {"resume_fade_multi": -1.0}}"#),
            Err(RuntimeError::Config(_))
        ));
        assert!(RuntimeConfig::from_json("not json").is_err());
    }
}
