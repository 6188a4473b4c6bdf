//! Core library for the Pulsedeck application.
//!
//! Pulsedeck cycles a folder of media on screen while a probabilistic beat
//! engine drives a continuously varying rhythmic pulse, interrupted by
//! randomized rest periods. Each module owns a distinct subsystem: the beat
//! engine and its pattern catalog, the timer scheduling it runs on, the
//! slideshow playlist, and the passive collaborators (statistics, callouts)
//! that observe session events.

pub mod callout;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod pattern;
pub mod slideshow;
pub mod stats;
pub mod timeline;

pub use callout::{CalloutAction, CalloutConfig, CalloutLibrary, CalloutSelector};
pub use config::{AppConfig, SettingsEditor};
pub use engine::{BeatEngine, EngineEvent, EngineTunables};
pub use error::{PulsedeckError, Result};
pub use events::{EventBus, SessionEvent};
pub use pattern::{PatternCatalog, RhythmPattern};
pub use slideshow::{scan_folder, MediaKind, Slideshow, SlideshowTunables};
pub use stats::{SessionReport, SessionStats};
pub use timeline::{TimerId, TimerWheel};
