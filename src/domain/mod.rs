//! Domain layer types for the triage engine.
//!
//! This module contains the data the engine consumes and produces: email snapshots,
//! rules, priority factors, feedback events and processing outcomes.

mod email;
mod feedback;
mod outcome;
mod priority;
mod rule;
mod types;

pub use email::{Address, Attachment, Email, ARCHIVE_FOLDER, INBOX_FOLDER};
pub use feedback::{CandidateRule, FeedbackEvent};
pub use outcome::{Diagnostic, DiagnosticKind, Effect, ProcessOutcome};
pub use priority::{
    PriorityFactor, PriorityScore, PriorityTier, TierThresholds, MAX_IMPACT, MIN_IMPACT,
};
pub use rule::{
    Action, ActionType, Condition, ConditionField, ConditionOperator, MatchOperator, Rule,
    RuleSource,
};
pub use types::{EmailId, RuleId};
