//! Rule matching.
//!
//! Combines a rule's conditions with ALL/ANY semantics. Every condition is checked for
//! configuration errors before any is evaluated, so a misconfigured rule never matches
//! no matter where the bad condition sits in the list.

use crate::domain::{Email, MatchOperator, Rule};

use super::condition::{self, ConditionError, PatternCache};

/// Decides whether a rule fires for an email.
///
/// Disabled rules return `Ok(false)` without looking at their conditions.
pub fn matches(rule: &Rule, email: &Email) -> Result<bool, ConditionError> {
    matches_with(rule, email, &PatternCache::default())
}

/// Like [`matches`], reusing regexes compiled ahead of time.
pub fn matches_with(
    rule: &Rule,
    email: &Email,
    patterns: &PatternCache,
) -> Result<bool, ConditionError> {
    if !rule.enabled {
        return Ok(false);
    }

    for c in &rule.conditions {
        condition::check_with(c, patterns)?;
    }

    match rule.condition_operator {
        MatchOperator::All => {
            for c in &rule.conditions {
                if !condition::evaluate_with(c, email, patterns)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        MatchOperator::Any => {
            for c in &rule.conditions {
                if condition::evaluate_with(c, email, patterns)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Like [`matches`], but a misconfigured rule is logged and treated as non-matching.
pub fn is_match(rule: &Rule, email: &Email) -> bool {
    match matches(rule, email) {
        Ok(matched) => matched,
        Err(e) => {
            tracing::warn!(rule_id = %rule.id, email_id = %email.id, "rule failed closed: {}", e);
            false
        }
    }
}
