//! Validated rule sets and the per-email processing pass.
//!
//! A [`RuleSet`] is structurally valid by construction: every rule has at least one
//! condition, at least one action, targets where targets are required, and a unique id.
//! Rules are kept in evaluation order, ascending by `order` with ties broken by
//! insertion order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Diagnostic, Email, ProcessOutcome, Rule, RuleId};

use super::condition::PatternCache;
use super::{executor, matcher};

/// A rule set that cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSetError {
    #[error("rule `{0}` has an empty id")]
    EmptyId(String),

    #[error("duplicate rule id: {0}")]
    DuplicateId(RuleId),

    #[error("rule {0} has no conditions")]
    NoConditions(RuleId),

    #[error("rule {0} has no actions")]
    NoActions(RuleId),

    #[error("rule {rule_id}: `{action}` requires a target")]
    MissingTarget {
        rule_id: RuleId,
        action: &'static str,
    },
}

/// Whether a pass keeps going after the first applied rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    /// Every matching rule applies.
    #[default]
    ContinueOnMatch,
    /// The pass ends after the first applied rule.
    FirstMatch,
}

/// Checks the structural invariants of a single rule.
pub fn validate_rule(rule: &Rule) -> Result<(), RuleSetError> {
    if rule.id.as_str().trim().is_empty() {
        return Err(RuleSetError::EmptyId(rule.name.clone()));
    }
    if rule.conditions.is_empty() {
        return Err(RuleSetError::NoConditions(rule.id.clone()));
    }
    if rule.actions.is_empty() {
        return Err(RuleSetError::NoActions(rule.id.clone()));
    }
    if let Some(action) = rule
        .actions
        .iter()
        .find(|a| a.kind.requires_target() && a.target().is_none())
    {
        return Err(RuleSetError::MissingTarget {
            rule_id: rule.id.clone(),
            action: action.kind.as_str(),
        });
    }
    Ok(())
}

/// An ordered, structurally valid collection of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
    #[serde(skip)]
    patterns: PatternCache,
}

impl RuleSet {
    /// Validates rules and arranges them in evaluation order.
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleSetError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            validate_rule(rule)?;
            if !seen.insert(rule.id.clone()) {
                return Err(RuleSetError::DuplicateId(rule.id.clone()));
            }
        }

        let mut rules = rules;
        // Stable sort keeps insertion order among equal `order` values.
        rules.sort_by_key(|r| r.order);
        let patterns = PatternCache::for_conditions(rules.iter().flat_map(|r| &r.conditions));
        Ok(Self { rules, patterns })
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Looks up a rule by id.
    pub fn get(&self, id: &RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| &r.id == id)
    }

    /// Number of rules, enabled or not.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs one email through the rule set.
    ///
    /// Pure: the same email and rule set always produce the same outcome.
    pub fn process(&self, email: &Email, mode: MatchMode) -> ProcessOutcome {
        let mut current = email.clone();
        let mut applied_rule_ids = Vec::new();
        let mut effects = Vec::new();
        let mut diagnostics = Vec::new();
        let mut folder_owner: Option<RuleId> = None;

        tracing::trace!(email_id = %email.id, rules = self.rules.len(), "evaluating");

        for rule in self.rules.iter().filter(|r| r.enabled) {
            match matcher::matches_with(rule, &current, &self.patterns) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, email_id = %email.id, "skipping rule: {}", e);
                    diagnostics.push(Diagnostic::configuration(rule.id.clone(), e.to_string()));
                    continue;
                }
            }
            tracing::trace!(rule_id = %rule.id, email_id = %email.id, "matched");

            let execution = match executor::apply(&rule.actions, &current) {
                Ok(execution) => execution,
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, email_id = %email.id, "skipping rule: {}", e);
                    diagnostics.push(Diagnostic::configuration(rule.id.clone(), e.to_string()));
                    continue;
                }
            };

            for conflict in execution.conflicts {
                diagnostics.push(Diagnostic::conflict(rule.id.clone(), conflict));
            }

            if execution.folder_set {
                if let Some(owner) = &folder_owner {
                    if execution.email.folder != current.folder {
                        diagnostics.push(Diagnostic::conflict(
                            rule.id.clone(),
                            format!(
                                "folder `{}` set by rule {} overridden by `{}`",
                                current.folder, owner, execution.email.folder
                            ),
                        ));
                    }
                }
                folder_owner = Some(rule.id.clone());
            }

            for effect in execution.effects {
                if !effects.contains(&effect) {
                    effects.push(effect);
                }
            }

            current = execution.email;
            applied_rule_ids.push(rule.id.clone());
            tracing::debug!(rule_id = %rule.id, email_id = %email.id, "applied");

            if rule.is_terminal() {
                tracing::debug!(rule_id = %rule.id, email_id = %email.id, "email deleted, ending pass");
                break;
            }
            if rule.stop_processing || mode == MatchMode::FirstMatch {
                break;
            }
        }

        tracing::trace!(email_id = %email.id, applied = applied_rule_ids.len(), "done");

        ProcessOutcome {
            email: current,
            applied_rule_ids,
            effects,
            diagnostics,
        }
    }

    /// Inserts a validated rule after every rule whose `order` is not greater.
    pub(crate) fn insert(&mut self, rule: Rule) -> Result<(), RuleSetError> {
        validate_rule(&rule)?;
        if self.get(&rule.id).is_some() {
            return Err(RuleSetError::DuplicateId(rule.id));
        }
        self.patterns.extend(&rule.conditions);
        let position = self.rules.partition_point(|r| r.order <= rule.order);
        self.rules.insert(position, rule);
        self.renormalize();
        Ok(())
    }

    /// Removes a rule, closing the gap it leaves.
    pub(crate) fn remove(&mut self, id: &RuleId) -> Option<Rule> {
        let index = self.rules.iter().position(|r| &r.id == id)?;
        let removed = self.rules.remove(index);
        self.renormalize();
        self.rebuild_patterns();
        Some(removed)
    }

    /// Replaces a rule in place, keeping its position.
    pub(crate) fn replace(&mut self, rule: Rule) -> Result<Option<Rule>, RuleSetError> {
        validate_rule(&rule)?;
        let Some(slot) = self.rules.iter_mut().find(|r| r.id == rule.id) else {
            return Ok(None);
        };
        let order = slot.order;
        let previous = std::mem::replace(slot, Rule { order, ..rule });
        self.rebuild_patterns();
        Ok(Some(previous))
    }

    pub(crate) fn get_mut(&mut self, id: &RuleId) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| &r.id == id)
    }

    /// Moves a rule to `position` (clamped to the end) and renumbers every rule.
    pub(crate) fn move_to(&mut self, id: &RuleId, position: usize) -> bool {
        let Some(index) = self.rules.iter().position(|r| &r.id == id) else {
            return false;
        };
        let rule = self.rules.remove(index);
        let position = position.min(self.rules.len());
        self.rules.insert(position, rule);
        self.renormalize();
        true
    }

    /// Increments the match counter of each listed rule.
    pub(crate) fn record_matches<'a>(&mut self, ids: impl IntoIterator<Item = &'a RuleId>) {
        for id in ids {
            if let Some(rule) = self.get_mut(id) {
                rule.match_count += 1;
            }
        }
    }

    fn rebuild_patterns(&mut self) {
        self.patterns =
            PatternCache::for_conditions(self.rules.iter().flat_map(|r| &r.conditions));
    }

    /// Regexes compiled for the current rules.
    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    /// Rewrites `order` as `0..n` in current evaluation order.
    fn renormalize(&mut self) {
        for (index, rule) in self.rules.iter_mut().enumerate() {
            rule.order = index as u32;
        }
    }
}
