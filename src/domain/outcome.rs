//! Results the engine hands back to its host.

use serde::{Deserialize, Serialize};

use super::{Email, RuleId};

/// An instruction for an external system that the engine does not execute itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Effect {
    /// Forward the message to an address.
    Forward { to: String },
    /// Remove the message from the mail store.
    Delete,
}

/// Category of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// A condition or action could not be evaluated; the rule was skipped.
    ConfigurationError,
    /// Two actions targeted incompatible states; the later one won.
    ConflictWarning,
}

/// A non-fatal problem found while processing an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Rule the problem belongs to.
    pub rule_id: RuleId,
    /// Category.
    pub kind: DiagnosticKind,
    /// Human readable detail.
    pub message: String,
}

impl Diagnostic {
    /// Creates a configuration error entry.
    pub fn configuration(rule_id: RuleId, message: impl Into<String>) -> Self {
        Self {
            rule_id,
            kind: DiagnosticKind::ConfigurationError,
            message: message.into(),
        }
    }

    /// Creates a conflict warning entry.
    pub fn conflict(rule_id: RuleId, message: impl Into<String>) -> Self {
        Self {
            rule_id,
            kind: DiagnosticKind::ConflictWarning,
            message: message.into(),
        }
    }
}

/// Result of running one email through the rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    /// The email after all applied rules.
    pub email: Email,
    /// Rules that matched and were applied, in application order.
    pub applied_rule_ids: Vec<RuleId>,
    /// Side effects for external systems, deduplicated.
    pub effects: Vec<Effect>,
    /// Skipped rules and resolved conflicts.
    pub diagnostics: Vec<Diagnostic>,
}

impl ProcessOutcome {
    /// Returns true if processing produced any configuration errors.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ConfigurationError)
    }
}
