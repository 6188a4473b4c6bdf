use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    callout::CalloutConfig,
    engine::{BeatEngine, EngineTunables},
    slideshow::SlideshowTunables,
    PulsedeckError, Result,
};

/// Top-level persisted configuration for the application.
///
/// Every field is optional in the on-disk document and falls back to its
/// default, so a missing or partial file always loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineTunables,
    pub slideshow: SlideshowTunables,
    pub callout: CalloutConfig,
    /// Pattern names the engine may draw from; empty means the full catalog.
    pub selected_patterns: Vec<String>,
    pub beat_loudness: f64,
    pub video_loudness: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineTunables::default(),
            slideshow: SlideshowTunables::default(),
            callout: CalloutConfig::default(),
            selected_patterns: Vec::new(),
            beat_loudness: 1.0,
            video_loudness: 0.7,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a JSON file. A missing file yields the
    /// defaults; a malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(error.into()),
        }
    }

    /// Persists the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Settings surface between edits and the running engine.
///
/// All validation happens here, before any engine state changes: the engine
/// itself never observes out-of-order bounds or an empty selection.
#[derive(Debug, Default)]
pub struct SettingsEditor;

impl SettingsEditor {
    /// Validates `config` and pushes the engine-facing parts into the
    /// engine. On any failure the engine is left untouched. Accepted values
    /// take effect on the engine's next scheduling decision.
    pub fn apply<R: Rng>(config: &AppConfig, engine: &mut BeatEngine<R>) -> Result<()> {
        Self::validate(config)?;

        let selection = (!config.selected_patterns.is_empty())
            .then(|| config.selected_patterns.clone());
        engine.apply_settings(config.engine.clone(), selection)
    }

    /// Checks every bound pair and probability without touching any engine.
    pub fn validate(config: &AppConfig) -> Result<()> {
        let engine = &config.engine;
        Self::ordered("frequency", engine.min_frequency, engine.max_frequency)?;
        Self::positive("frequency", engine.min_frequency)?;
        Self::ordered(
            "segment duration",
            engine.min_segment_secs,
            engine.max_segment_secs,
        )?;
        Self::positive("segment duration", engine.min_segment_secs)?;
        Self::ordered(
            "pause duration",
            engine.min_pause_secs as f64,
            engine.max_pause_secs as f64,
        )?;
        Self::chance("resample_chance", engine.resample_chance)?;
        Self::chance("pause_chance", engine.pause_chance)?;

        let slideshow = &config.slideshow;
        Self::ordered(
            "display duration",
            slideshow.min_display_secs,
            slideshow.max_display_secs,
        )?;
        Self::positive("display duration", slideshow.min_display_secs)?;
        Self::chance("talking_chance", config.callout.talking_chance)?;
        Self::chance("beat_loudness", config.beat_loudness)?;
        Self::chance("video_loudness", config.video_loudness)?;
        Ok(())
    }

    fn ordered(what: &'static str, min: f64, max: f64) -> Result<()> {
        if min > max {
            return Err(PulsedeckError::InvalidRange(
                what,
                format!("min {min} exceeds max {max}"),
            ));
        }
        Ok(())
    }

    fn positive(what: &'static str, min: f64) -> Result<()> {
        if min <= 0.0 {
            return Err(PulsedeckError::InvalidRange(
                what,
                format!("minimum must be positive, got {min}"),
            ));
        }
        Ok(())
    }

    fn chance(what: &'static str, value: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(PulsedeckError::InvalidRange(
                what,
                format!("probability {value} outside [0, 1]"),
            ));
        }
        Ok(())
    }
}
