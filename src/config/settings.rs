//! Application settings and configuration types.
//!
//! Settings are persisted to `~/.config/triage/settings.json` (or the platform
//! equivalent). Missing fields fall back to their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Rule, TierThresholds};
use crate::engine::MatchMode;
use crate::services::{KeywordWeight, VipSenders};

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no configuration directory available")]
    NoConfigDir,

    #[error("tier thresholds must be strictly descending: {0:?}")]
    Thresholds(TierThresholds),

    #[error("invalid learner setting: {0}")]
    Learner(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rule processing.
    pub engine: EngineSettings,
    /// Priority scoring.
    pub scoring: ScoringSettings,
    /// Rule suggestion learning.
    pub learner: LearnerSettings,
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> Result<PathBuf> {
        directories::ProjectDirs::from("", "", "triage")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Loads and validates settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Loads settings from `path`, or defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "no settings file, using defaults");
            Ok(Self::default())
        }
    }

    /// Writes settings as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<()> {
        if !self.scoring.thresholds.is_descending() {
            return Err(ConfigError::Thresholds(self.scoring.thresholds));
        }
        let learner = &self.learner;
        if !(0.0..=1.0).contains(&learner.min_confidence) {
            return Err(ConfigError::Learner(format!(
                "minConfidence {} is outside [0, 1]",
                learner.min_confidence
            )));
        }
        if learner.min_support == 0 {
            return Err(ConfigError::Learner("minSupport must be at least 1".into()));
        }
        if learner.max_events == 0 {
            return Err(ConfigError::Learner("maxEvents must be at least 1".into()));
        }
        Ok(())
    }
}

/// Rule processing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    /// Whether processing continues after the first matching rule.
    pub match_mode: MatchMode,
}

/// Priority scoring configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringSettings {
    /// Tier lower bounds.
    pub thresholds: TierThresholds,
    /// VIP addresses (`user@domain`) or bare domains.
    pub vip_senders: Vec<String>,
    /// Impact of a VIP sender.
    pub vip_impact: i32,
    /// Keywords that raise or lower priority.
    pub keywords: Vec<KeywordWeight>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            thresholds: TierThresholds::STANDARD,
            vip_senders: Vec::new(),
            vip_impact: VipSenders::DEFAULT_IMPACT,
            keywords: Vec::new(),
        }
    }
}

/// Suggestion learner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LearnerSettings {
    /// Accepted events a pattern needs before it is suggested.
    pub min_support: u32,
    /// Minimum accepted / (accepted + rejected) ratio.
    pub min_confidence: f64,
    /// Shortest subject or body word considered a token.
    pub min_token_length: usize,
    /// Cap on token-based candidates per label.
    pub max_token_candidates_per_label: usize,
    /// Maximum retained feedback events.
    pub max_events: usize,
    /// Feedback older than this is dropped by `expire`.
    pub retention_days: u32,
}

impl Default for LearnerSettings {
    fn default() -> Self {
        Self {
            min_support: 3,
            min_confidence: 0.7,
            min_token_length: 4,
            max_token_candidates_per_label: 3,
            max_events: 1000,
            retention_days: 90,
        }
    }
}

/// Reads a JSON array of rules.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let rules: Vec<Rule> = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), count = rules.len(), "rules loaded");
    Ok(rules)
}
