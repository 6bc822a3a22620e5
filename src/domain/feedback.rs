//! Feedback and suggestion domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EmailId, Rule};

/// A user's verdict on an automatic classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    /// Email the classification was applied to.
    pub email_id: EmailId,
    /// Label the engine proposed.
    pub proposed_label: String,
    /// Whether the user kept the label.
    pub accepted: bool,
    /// When the user decided.
    pub timestamp: DateTime<Utc>,
}

impl FeedbackEvent {
    /// Creates an accepted feedback event stamped now.
    pub fn accepted(email_id: impl Into<EmailId>, label: impl Into<String>) -> Self {
        Self {
            email_id: email_id.into(),
            proposed_label: label.into(),
            accepted: true,
            timestamp: Utc::now(),
        }
    }

    /// Creates a rejected feedback event stamped now.
    pub fn rejected(email_id: impl Into<EmailId>, label: impl Into<String>) -> Self {
        Self {
            accepted: false,
            ..Self::accepted(email_id, label)
        }
    }
}

/// A disabled rule proposed by the suggestion learner.
///
/// Candidates are never active on their own; a user has to promote them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRule {
    /// The proposed rule, always disabled and `ai-suggested`.
    pub rule: Rule,
    /// Acceptance ratio of the supporting feedback, in `[0, 1]`.
    pub confidence: f64,
    /// Number of accepted events backing the pattern.
    pub support_count: u32,
}

impl CandidateRule {
    /// Turns the candidate into an enabled rule.
    pub fn promote(self) -> Rule {
        Rule {
            enabled: true,
            ..self.rule
        }
    }
}
