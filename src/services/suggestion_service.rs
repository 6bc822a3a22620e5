//! Suggestion learner.
//!
//! Watches users accept or reject automatic labels and proposes new rules once a
//! pattern has enough support. Patterns are:
//! - sender domain -> label
//! - subject token -> label
//! - body token -> label
//!
//! Candidates are always disabled. They reach the active rule set only through
//! [`crate::services::RuleEngine::promote_candidate`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LearnerSettings;
use crate::domain::{
    Action, ActionType, CandidateRule, Condition, ConditionField, ConditionOperator, Email,
    FeedbackEvent, MatchOperator, Rule, RuleId, RuleSource,
};

/// A feedback event together with the email attributes mining looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub event: FeedbackEvent,
    pub sender_domain: String,
    pub subject_tokens: BTreeSet<String>,
    pub body_tokens: BTreeSet<String>,
}

impl Observation {
    /// Captures what mining needs from the email the feedback refers to.
    pub fn new(event: FeedbackEvent, email: &Email, min_token_length: usize) -> Self {
        Self {
            event,
            sender_domain: email.sender_domain(),
            subject_tokens: tokenize(&email.subject, min_token_length),
            body_tokens: tokenize(&email.body_text, min_token_length),
        }
    }
}

/// Splits text into lowercase alphanumeric words of at least `min_length` characters.
///
/// Purely numeric words are dropped; invoice numbers and dates make poor rules.
pub fn tokenize(text: &str, min_length: usize) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= min_length)
        .filter(|word| !word.chars().all(|c| c.is_numeric()))
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    accepted: u32,
    rejected: u32,
}

impl Tally {
    fn record(&mut self, accepted: bool) {
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }

    fn confidence(&self) -> f64 {
        let total = self.accepted + self.rejected;
        if total == 0 {
            return 0.0;
        }
        f64::from(self.accepted) / f64::from(total)
    }

    fn qualifies(&self, settings: &LearnerSettings) -> bool {
        self.accepted >= settings.min_support && self.confidence() >= settings.min_confidence
    }
}

/// Pattern kind, also used as the id prefix of generated candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PatternKind {
    Domain,
    Subject,
    Body,
}

impl PatternKind {
    fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Domain => "domain",
            PatternKind::Subject => "subject",
            PatternKind::Body => "body",
        }
    }

    fn condition(&self, pattern: &str) -> Condition {
        match self {
            PatternKind::Domain => {
                Condition::new(ConditionField::Domain, ConditionOperator::Equals, pattern)
            }
            PatternKind::Subject => {
                Condition::new(ConditionField::Subject, ConditionOperator::Contains, pattern)
            }
            PatternKind::Body => {
                Condition::new(ConditionField::Body, ConditionOperator::Contains, pattern)
            }
        }
    }

    fn rule_name(&self, pattern: &str, label: &str) -> String {
        match self {
            PatternKind::Domain => format!("Label mail from {pattern} as {label}"),
            PatternKind::Subject => format!("Label subjects mentioning \"{pattern}\" as {label}"),
            PatternKind::Body => format!("Label messages mentioning \"{pattern}\" as {label}"),
        }
    }
}

type Tallies = BTreeMap<(PatternKind, String, String), Tally>;

/// Mines candidate rules from a window of observations.
///
/// Pure: the same window and settings always give the same candidates in the same
/// order (confidence, then support, descending; ties by id).
pub fn mine<'a, I>(window: I, settings: &LearnerSettings) -> Vec<CandidateRule>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut tallies = Tallies::new();
    for observation in window {
        let label = observation.event.proposed_label.trim();
        if label.is_empty() {
            continue;
        }
        let accepted = observation.event.accepted;

        if !observation.sender_domain.is_empty() {
            tallies
                .entry((PatternKind::Domain, observation.sender_domain.clone(), label.to_string()))
                .or_default()
                .record(accepted);
        }
        for token in &observation.subject_tokens {
            tallies
                .entry((PatternKind::Subject, token.clone(), label.to_string()))
                .or_default()
                .record(accepted);
        }
        for token in &observation.body_tokens {
            tallies
                .entry((PatternKind::Body, token.clone(), label.to_string()))
                .or_default()
                .record(accepted);
        }
    }

    let mut candidates = Vec::new();
    let mut token_candidates: BTreeMap<String, Vec<CandidateRule>> = BTreeMap::new();

    for ((kind, pattern, label), tally) in &tallies {
        if !tally.qualifies(settings) {
            if tally.accepted > 0 {
                tracing::debug!(
                    kind = kind.as_str(),
                    pattern = %pattern,
                    label = %label,
                    support = tally.accepted,
                    confidence = tally.confidence(),
                    "pattern below thresholds"
                );
            }
            continue;
        }

        let candidate = build_candidate(*kind, pattern, label, tally);
        match kind {
            PatternKind::Domain => candidates.push(candidate),
            PatternKind::Subject | PatternKind::Body => {
                token_candidates.entry(label.clone()).or_default().push(candidate)
            }
        }
    }

    for (_, mut per_label) in token_candidates {
        per_label.sort_by(|a, b| {
            b.support_count
                .cmp(&a.support_count)
                .then_with(|| a.rule.id.cmp(&b.rule.id))
        });
        per_label.truncate(settings.max_token_candidates_per_label);
        candidates.extend(per_label);
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.support_count.cmp(&a.support_count))
            .then_with(|| a.rule.id.cmp(&b.rule.id))
    });
    tracing::debug!(candidates = candidates.len(), "mining finished");
    candidates
}

fn build_candidate(kind: PatternKind, pattern: &str, label: &str, tally: &Tally) -> CandidateRule {
    let rule = Rule {
        id: RuleId::from(format!("suggested:{}:{}:{}", kind.as_str(), pattern, label)),
        name: kind.rule_name(pattern, label),
        enabled: false,
        condition_operator: MatchOperator::All,
        conditions: vec![kind.condition(pattern)],
        actions: vec![Action::add_label(label)],
        order: 0,
        source: RuleSource::AiSuggested,
        match_count: 0,
        stop_processing: false,
    };
    CandidateRule {
        rule,
        confidence: tally.confidence(),
        support_count: tally.accepted,
    }
}

/// Returns true if `rule` already applies the candidate's label on the same condition.
fn covers(rule: &Rule, candidate: &CandidateRule) -> bool {
    let same_condition = candidate.rule.conditions.iter().all(|wanted| {
        rule.conditions.iter().any(|c| {
            c.field == wanted.field
                && c.operator == wanted.operator
                && c.value.eq_ignore_ascii_case(&wanted.value)
        })
    });
    let same_label = candidate.rule.actions.iter().all(|wanted| {
        rule.actions
            .iter()
            .any(|a| a.kind == ActionType::AddLabel && a.target() == wanted.target())
    });
    same_condition && same_label
}

/// Rolling window of feedback observations.
#[derive(Debug, Clone)]
pub struct SuggestionLearner {
    settings: LearnerSettings,
    window: VecDeque<Observation>,
}

impl SuggestionLearner {
    /// Creates an empty learner.
    pub fn new(settings: LearnerSettings) -> Self {
        Self {
            settings,
            window: VecDeque::new(),
        }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &LearnerSettings {
        &self.settings
    }

    /// Number of retained observations.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns true if no feedback is retained.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Retained observations, oldest first.
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.window.iter()
    }

    /// Records feedback about `email`.
    ///
    /// A newer verdict on the same email and label replaces the older one. Returns
    /// false, recording nothing, if the event refers to a different email.
    pub fn observe(&mut self, event: FeedbackEvent, email: &Email) -> bool {
        if event.email_id != email.id {
            tracing::warn!(
                event_email = %event.email_id,
                email_id = %email.id,
                "feedback does not match email, ignoring"
            );
            return false;
        }

        self.window.retain(|o| {
            !(o.event.email_id == event.email_id
                && o.event.proposed_label == event.proposed_label)
        });
        self.window
            .push_back(Observation::new(event, email, self.settings.min_token_length));

        while self.window.len() > self.settings.max_events {
            self.window.pop_front();
        }
        true
    }

    /// Drops observations older than the retention period and returns how many.
    ///
    /// A retention period reaching before the earliest representable date keeps
    /// everything.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = Duration::try_days(i64::from(self.settings.retention_days))
            .and_then(|retention| now.checked_sub_signed(retention))
        else {
            return 0;
        };
        let before = self.window.len();
        self.window.retain(|o| o.event.timestamp >= cutoff);
        let removed = before - self.window.len();
        if removed > 0 {
            tracing::debug!(removed, "expired feedback");
        }
        removed
    }

    /// Mines candidates from the current window.
    pub fn mine(&self) -> Vec<CandidateRule> {
        mine(&self.window, &self.settings)
    }

    /// Mines candidates, dropping any an existing rule already covers.
    pub fn mine_excluding(&self, existing: &[Rule]) -> Vec<CandidateRule> {
        self.mine()
            .into_iter()
            .filter(|candidate| !existing.iter().any(|rule| covers(rule, candidate)))
            .collect()
    }
}
