use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::events::SessionEvent;

/// Per-language callout text, loaded from one JSON document per language
/// code. Each document maps a category name to its candidate lines.
#[derive(Debug, Default, Clone)]
pub struct CalloutLibrary {
    languages: Vec<String>,
    data: HashMap<String, HashMap<String, Vec<String>>>,
}

impl CalloutLibrary {
    /// Loads every `<lang>.json` in `dir`. Files that are missing, fail to
    /// parse, or have the wrong shape are logged and skipped; a missing
    /// directory yields an empty library and no callouts are ever emitted.
    pub fn load_dir(dir: &Path) -> Self {
        let mut library = Self::default();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(?dir, %error, "callout directory unavailable");
                return library;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(lang) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path)
                .map_err(crate::PulsedeckError::from)
                .and_then(|text| Ok(serde_json::from_str(&text)?))
            {
                Ok(categories) => {
                    library.languages.push(lang.to_string());
                    library.data.insert(lang.to_string(), categories);
                }
                Err(error) => {
                    tracing::warn!(?path, %error, "skipping unreadable callout file");
                }
            }
        }
        library.languages.sort();
        library
    }

    /// Builds a library from in-memory documents; used by tests.
    pub fn from_documents(documents: Vec<(String, HashMap<String, Vec<String>>)>) -> Self {
        let mut library = Self::default();
        for (lang, categories) in documents {
            library.languages.push(lang.clone());
            library.data.insert(lang, categories);
        }
        library
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    fn lines(&self, lang: &str, category: &str) -> Option<&[String]> {
        let lines = self.data.get(lang)?.get(category)?;
        (!lines.is_empty()).then_some(lines.as_slice())
    }
}

/// Settings for the callout subsystem, persisted alongside the rest of the
/// application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalloutConfig {
    pub enabled: bool,
    pub language: String,
    /// Probability that a triggering event actually produces a callout.
    pub talking_chance: f64,
    /// How long an emitted callout stays on screen.
    pub display_secs: u64,
}

impl Default for CalloutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en".to_string(),
            talking_chance: 0.5,
            display_secs: 7,
        }
    }
}

/// Show/hide lifecycle of an emitted callout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalloutAction {
    Show(String),
    Hide,
}

/// Picks short text cues in response to session events.
///
/// At most one callout is displayed at a time; while one is showing, all
/// triggers are ignored until the auto-hide deadline passes.
#[derive(Debug)]
pub struct CalloutSelector<R: Rng = StdRng> {
    library: CalloutLibrary,
    config: CalloutConfig,
    rng: R,
    hide_at: Option<Duration>,
    /// Frequency reported by the previous beat change, used to classify the
    /// next one as faster or slower.
    last_frequency: f64,
}

impl CalloutSelector<StdRng> {
    pub fn new(library: CalloutLibrary, config: CalloutConfig) -> Self {
        Self::with_rng(library, config, StdRng::from_os_rng())
    }
}

impl<R: Rng> CalloutSelector<R> {
    pub fn with_rng(library: CalloutLibrary, config: CalloutConfig, rng: R) -> Self {
        let mut config = config;
        if !library.languages().contains(&config.language) {
            if let Some(fallback) = library.languages().first() {
                tracing::warn!(
                    requested = %config.language,
                    fallback = %fallback,
                    "configured callout language unavailable"
                );
                config.language = fallback.clone();
            }
        }
        Self {
            library,
            config,
            rng,
            hide_at: None,
            last_frequency: 0.0,
        }
    }

    pub fn language(&self) -> &str {
        &self.config.language
    }

    pub fn is_displaying(&self) -> bool {
        self.hide_at.is_some()
    }

    /// Reacts to a session event, possibly emitting a callout to show.
    pub fn handle(&mut self, now: Duration, event: &SessionEvent) -> Option<CalloutAction> {
        let category = match event {
            SessionEvent::SessionStarted => "session_started",
            SessionEvent::SessionEnded => "session_ended",
            SessionEvent::MediaSkipped => "media_skipped",
            SessionEvent::MediaRepeated => "media_repeated",
            SessionEvent::PauseStarted { .. } => "pause_started",
            SessionEvent::PauseEnded => "pause_ended",
            SessionEvent::BeatChanged { new_frequency, .. } => {
                self.classify_beat_change(*new_frequency)
            }
            SessionEvent::BeatPulse => return None,
        };
        self.select(now, category)
    }

    /// Emits the hide action once the display interval has elapsed.
    pub fn tick(&mut self, now: Duration) -> Option<CalloutAction> {
        if self.hide_at.is_some_and(|deadline| now >= deadline) {
            self.hide_at = None;
            return Some(CalloutAction::Hide);
        }
        None
    }

    /// Deadline of the currently displaying callout, if any.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.hide_at
    }

    /// Half the time a beat change stays generic; otherwise it is called
    /// out as faster or slower relative to the previously reported
    /// frequency (equal frequencies stay generic too).
    fn classify_beat_change(&mut self, new_frequency: f64) -> &'static str {
        let previous = self.last_frequency;
        self.last_frequency = new_frequency;
        if self.rng.random_bool(0.5) {
            return "beat_change_general";
        }
        if previous > new_frequency {
            "beat_change_slower"
        } else if previous < new_frequency {
            "beat_change_faster"
        } else {
            "beat_change_general"
        }
    }

    fn select(&mut self, now: Duration, category: &str) -> Option<CalloutAction> {
        if !self.config.enabled || self.is_displaying() {
            return None;
        }
        if !self.rng.random_bool(self.config.talking_chance.clamp(0.0, 1.0)) {
            return None;
        }
        let Some(lines) = self.library.lines(&self.config.language, category) else {
            tracing::debug!(category, "no callout lines available");
            return None;
        };
        let line = lines[self.rng.random_range(0..lines.len())].clone();
        self.hide_at = Some(now + Duration::from_secs(self.config.display_secs));
        Some(CalloutAction::Show(line))
    }
}
