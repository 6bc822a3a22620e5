//! Configuration and settings management.
//!
//! Settings are stored in the user's config directory as JSON. Rule files are plain
//! JSON arrays of rules.

mod settings;

pub use settings::{
    load_rules, ConfigError, EngineSettings, LearnerSettings, ScoringSettings, Settings,
};
