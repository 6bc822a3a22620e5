//! Services layer.
//!
//! Services wrap the pure [`crate::engine`] pipeline with the state and policy an
//! application needs: the active rule set, scoring producers, and the feedback window.
//!
//! # Architecture
//!
//! ```text
//! Application Layer (CLI, mail pipeline)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//!   Engine + Domain (pure evaluation)
//! ```
//!
//! # Services Overview
//!
//! - [`RuleEngine`]: Owns the rule set, processes emails, edits rules
//! - [`PriorityService`]: Collects factors and scores emails
//! - [`SuggestionLearner`]: Turns label feedback into candidate rules

mod priority_service;
mod rule_service;
mod suggestion_service;

pub use priority_service::{
    assign, collect_factors, score, score_with, KeywordSignal, KeywordWeight, PriorityService,
    SignalProducer, VipSenders,
};
pub use rule_service::{process_batch, RuleEngine, RuleEngineError};
pub use suggestion_service::{mine, tokenize, Observation, SuggestionLearner};
