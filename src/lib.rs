//! triage - A rule engine for classifying email
//!
//! This crate provides condition matching and ordered rule processing, priority
//! scoring from weighted factors, and a learner that proposes new rules from
//! label feedback.

pub mod config;
pub mod domain;
pub mod engine;
pub mod services;

pub use engine::{MatchMode, RuleSet};
pub use services::{PriorityService, RuleEngine, SuggestionLearner};
