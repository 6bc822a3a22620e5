//! Rule engine service.
//!
//! Owns the active rule set and exposes the editing operations a settings UI needs:
//! - Processing single emails and batches
//! - Adding, removing, updating and toggling rules
//! - Reordering with gap-free renumbering
//! - Promoting candidate rules from the suggestion learner
//!
//! The rule set lives behind an [`Arc`] and edits are copy-on-write, so a batch that
//! took a [`RuleEngine::snapshot`] is never affected by edits made while it runs.

use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;

use crate::config::EngineSettings;
use crate::domain::{CandidateRule, Email, ProcessOutcome, Rule, RuleId};
use crate::engine::{MatchMode, RuleSet, RuleSetError};

/// Errors that can occur while editing the rule set.
#[derive(Debug, Error)]
pub enum RuleEngineError {
    #[error("rule not found: {0}")]
    NotFound(RuleId),

    #[error(transparent)]
    Invalid(#[from] RuleSetError),
}

/// Result type for rule engine operations.
pub type Result<T> = std::result::Result<T, RuleEngineError>;

/// Processes a batch of emails against one rule set snapshot.
///
/// Emails are independent, so they are processed in parallel. Output order matches
/// input order.
pub fn process_batch(rules: &RuleSet, emails: &[Email], mode: MatchMode) -> Vec<ProcessOutcome> {
    emails
        .par_iter()
        .map(|email| rules.process(email, mode))
        .collect()
}

/// Service that owns the active rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Arc<RuleSet>,
    mode: MatchMode,
}

impl RuleEngine {
    /// Creates an engine from raw rules, rejecting structurally invalid ones.
    pub fn new(rules: Vec<Rule>, settings: &EngineSettings) -> Result<Self> {
        let rules = RuleSet::new(rules)?;
        tracing::info!(rules = rules.len(), mode = ?settings.match_mode, "rule engine loaded");
        Ok(Self {
            rules: Arc::new(rules),
            mode: settings.match_mode,
        })
    }

    /// Returns an immutable view of the current rule set.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        self.rules.rules()
    }

    /// Looks up a rule.
    pub fn get(&self, id: &RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }

    /// Current match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Changes the match mode for subsequent passes.
    pub fn set_mode(&mut self, mode: MatchMode) {
        self.mode = mode;
    }

    /// Processes one email and bumps the match counters of applied rules.
    pub fn process(&mut self, email: &Email) -> ProcessOutcome {
        let outcome = self.rules.process(email, self.mode);
        self.record_outcomes(std::slice::from_ref(&outcome));
        outcome
    }

    /// Processes a batch against a single snapshot, then records match counters.
    pub fn process_batch(&mut self, emails: &[Email]) -> Vec<ProcessOutcome> {
        let snapshot = self.snapshot();
        let outcomes = process_batch(&snapshot, emails, self.mode);
        tracing::debug!(emails = emails.len(), "batch processed");
        self.record_outcomes(&outcomes);
        outcomes
    }

    /// Increments match counters for every applied rule in the outcomes.
    ///
    /// Rules removed since the outcomes were produced are ignored.
    pub fn record_outcomes(&mut self, outcomes: &[ProcessOutcome]) {
        if outcomes.iter().all(|o| o.applied_rule_ids.is_empty()) {
            return;
        }
        Arc::make_mut(&mut self.rules)
            .record_matches(outcomes.iter().flat_map(|o| o.applied_rule_ids.iter()));
    }

    /// Adds a rule at the position given by its `order`.
    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        let id = rule.id.clone();
        Arc::make_mut(&mut self.rules).insert(rule)?;
        tracing::info!(rule_id = %id, "rule added");
        Ok(())
    }

    /// Removes a rule and renumbers the rest.
    pub fn remove_rule(&mut self, id: &RuleId) -> Result<Rule> {
        self.ensure_exists(id)?;
        let removed = Arc::make_mut(&mut self.rules)
            .remove(id)
            .ok_or_else(|| RuleEngineError::NotFound(id.clone()))?;
        tracing::info!(rule_id = %id, "rule removed");
        Ok(removed)
    }

    /// Replaces a rule's definition, keeping its position and match counter.
    pub fn update_rule(&mut self, rule: Rule) -> Result<Rule> {
        let match_count = self
            .rules
            .get(&rule.id)
            .map(|r| r.match_count)
            .ok_or_else(|| RuleEngineError::NotFound(rule.id.clone()))?;
        let id = rule.id.clone();
        let previous = Arc::make_mut(&mut self.rules)
            .replace(Rule { match_count, ..rule })?
            .ok_or_else(|| RuleEngineError::NotFound(id.clone()))?;
        tracing::info!(rule_id = %id, "rule updated");
        Ok(previous)
    }

    /// Flips a rule's enabled flag and returns the new state.
    pub fn toggle_rule(&mut self, id: &RuleId) -> Result<bool> {
        let enabled = !self.require(id)?.enabled;
        self.set_enabled(id, enabled)?;
        Ok(enabled)
    }

    /// Enables or disables a rule.
    pub fn set_enabled(&mut self, id: &RuleId, enabled: bool) -> Result<()> {
        if self.require(id)?.enabled == enabled {
            return Ok(());
        }
        if let Some(rule) = Arc::make_mut(&mut self.rules).get_mut(id) {
            rule.enabled = enabled;
        }
        tracing::info!(rule_id = %id, enabled, "rule toggled");
        Ok(())
    }

    /// Moves a rule to a zero-based position and renumbers all rules to `0..n`.
    ///
    /// Positions past the end place the rule last.
    pub fn reorder(&mut self, id: &RuleId, new_order: usize) -> Result<()> {
        self.ensure_exists(id)?;
        Arc::make_mut(&mut self.rules).move_to(id, new_order);
        tracing::debug!(rule_id = %id, new_order, "rule reordered");
        Ok(())
    }

    /// Adds an accepted candidate as an enabled rule at the end of the set.
    pub fn promote_candidate(&mut self, candidate: CandidateRule) -> Result<RuleId> {
        let mut rule = candidate.promote();
        rule.order = self.rules.rules().last().map_or(0, |r| r.order.saturating_add(1));
        let id = rule.id.clone();
        self.add_rule(rule)?;
        Ok(id)
    }

    fn require(&self, id: &RuleId) -> Result<&Rule> {
        self.rules
            .get(id)
            .ok_or_else(|| RuleEngineError::NotFound(id.clone()))
    }

    fn ensure_exists(&self, id: &RuleId) -> Result<()> {
        self.require(id).map(|_| ())
    }
}
