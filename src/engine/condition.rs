//! Condition evaluation.
//!
//! Decides whether a single [`Condition`] holds for an [`Email`]. Text comparisons are
//! case-insensitive. `contains` and `notContains` treat a `|`-delimited value as a list
//! of alternatives, so `"faktura|račun"` matches either word.

use std::borrow::Cow;
use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::domain::{Condition, ConditionField, ConditionOperator, Email};

/// Upper bound on compiled pattern size, in bytes.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// A condition that cannot be evaluated because it is misconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("operator `{operator}` needs a numeric field, but `{field}` is not numeric")]
    NonNumericField {
        field: &'static str,
        operator: &'static str,
    },

    #[error("`{0}` is not a valid size")]
    InvalidNumber(String),

    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Result type for condition evaluation.
pub type Result<T> = std::result::Result<T, ConditionError>;

/// Value of an email field as seen by a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldValue<'a> {
    Text(Cow<'a, str>),
    Flag(bool),
    Number(u64),
}

impl FieldValue<'_> {
    fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(text) => Cow::Borrowed(text.as_ref()),
            FieldValue::Flag(flag) => Cow::Borrowed(if *flag { "true" } else { "false" }),
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
        }
    }
}

fn extract(field: ConditionField, email: &Email) -> FieldValue<'_> {
    match field {
        ConditionField::Sender => FieldValue::Text(Cow::Borrowed(email.from.email.as_str())),
        ConditionField::Domain => FieldValue::Text(Cow::Owned(email.sender_domain())),
        ConditionField::Subject => FieldValue::Text(Cow::Borrowed(email.subject.as_str())),
        ConditionField::Body => FieldValue::Text(Cow::Borrowed(email.body_text.as_str())),
        ConditionField::HasAttachment => FieldValue::Flag(email.has_attachment()),
        ConditionField::Size => FieldValue::Number(email.size_bytes()),
    }
}

/// Regex patterns compiled ahead of evaluation, keyed by their source text.
///
/// Patterns that fail to compile are left out and reported when a condition using them
/// is checked.
#[derive(Debug, Clone, Default)]
pub struct PatternCache {
    compiled: HashMap<String, Regex>,
}

impl PatternCache {
    /// Compiles the regex patterns of the given conditions.
    pub fn for_conditions<'a>(conditions: impl IntoIterator<Item = &'a Condition>) -> Self {
        let mut cache = Self::default();
        cache.extend(conditions);
        cache
    }

    /// Compiles any regex patterns not already cached.
    pub fn extend<'a>(&mut self, conditions: impl IntoIterator<Item = &'a Condition>) {
        for condition in conditions {
            if condition.operator != ConditionOperator::Regex
                || self.compiled.contains_key(&condition.value)
            {
                continue;
            }
            if let Ok(regex) = compile(&condition.value) {
                self.compiled.insert(condition.value.clone(), regex);
            }
        }
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Cow<'_, Regex>> {
        match self.compiled.get(pattern) {
            Some(regex) => Ok(Cow::Borrowed(regex)),
            None => compile(pattern).map(Cow::Owned),
        }
    }
}

// Compiled regexes are a pure function of their source.
impl PartialEq for PatternCache {
    fn eq(&self, other: &Self) -> bool {
        self.compiled.len() == other.compiled.len()
            && self.compiled.keys().all(|k| other.compiled.contains_key(k))
    }
}

impl Eq for PatternCache {}

/// Checks the parts of a condition that do not depend on any email.
///
/// A condition that passes this check can only fail to evaluate if the email itself is
/// unusual, which never happens with the current field set.
pub fn check(condition: &Condition) -> Result<()> {
    check_with(condition, &PatternCache::default())
}

/// Like [`check`], reusing patterns from `patterns`.
pub fn check_with(condition: &Condition, patterns: &PatternCache) -> Result<()> {
    match condition.operator {
        ConditionOperator::GreaterThan | ConditionOperator::LessThan => {
            numeric_operand(condition).map(|_| ())
        }
        ConditionOperator::Regex => patterns.get_or_compile(&condition.value).map(|_| ()),
        _ => Ok(()),
    }
}

/// Evaluates a condition against an email.
pub fn evaluate(condition: &Condition, email: &Email) -> Result<bool> {
    evaluate_with(condition, email, &PatternCache::default())
}

/// Like [`evaluate`], reusing patterns from `patterns`.
pub fn evaluate_with(condition: &Condition, email: &Email, patterns: &PatternCache) -> Result<bool> {
    let field = extract(condition.field, email);

    match condition.operator {
        ConditionOperator::GreaterThan | ConditionOperator::LessThan => {
            let threshold = numeric_operand(condition)?;
            let FieldValue::Number(actual) = field else {
                return Err(non_numeric(condition));
            };
            Ok(match condition.operator {
                ConditionOperator::GreaterThan => actual > threshold,
                _ => actual < threshold,
            })
        }
        ConditionOperator::Regex => {
            let pattern = patterns.get_or_compile(&condition.value)?;
            Ok(pattern.is_match(&field.as_text()))
        }
        operator => {
            let haystack = field.as_text().to_lowercase();
            let needle = condition.value.to_lowercase();
            Ok(match operator {
                ConditionOperator::Contains => {
                    alternatives(&needle).any(|alt| haystack.contains(alt))
                }
                ConditionOperator::NotContains => {
                    !alternatives(&needle).any(|alt| haystack.contains(alt))
                }
                ConditionOperator::Equals => haystack == needle,
                ConditionOperator::StartsWith => haystack.starts_with(&needle),
                ConditionOperator::EndsWith => haystack.ends_with(&needle),
                _ => unreachable!("numeric and regex operators handled above"),
            })
        }
    }
}

/// Evaluates a condition, treating configuration errors as "does not match".
pub fn is_satisfied(condition: &Condition, email: &Email) -> bool {
    match evaluate(condition, email) {
        Ok(matched) => matched,
        Err(e) => {
            tracing::warn!(
                email_id = %email.id,
                field = condition.field.as_str(),
                operator = condition.operator.as_str(),
                "condition failed closed: {}",
                e
            );
            false
        }
    }
}

fn alternatives(value: &str) -> impl Iterator<Item = &str> {
    value.split('|').map(str::trim).filter(|alt| !alt.is_empty())
}

fn non_numeric(condition: &Condition) -> ConditionError {
    ConditionError::NonNumericField {
        field: condition.field.as_str(),
        operator: condition.operator.as_str(),
    }
}

fn numeric_operand(condition: &Condition) -> Result<u64> {
    if !condition.field.is_numeric() {
        return Err(non_numeric(condition));
    }
    parse_size(&condition.value).ok_or_else(|| ConditionError::InvalidNumber(condition.value.clone()))
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| ConditionError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Parses a byte count with an optional `B`, `KB`, `MB` or `GB` suffix (1024-based).
pub fn parse_size(raw: &str) -> Option<u64> {
    let upper = raw.trim().to_ascii_uppercase();
    let (digits, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1u64 << 30)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1 << 20)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1 << 10)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };

    let amount: f64 = digits.trim().parse().ok()?;
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    Some((amount * multiplier as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Attachment;

    fn invoice_email() -> Email {
        let mut email = Email::new(
            "e1",
            "racuni@Banka.hr",
            "Vaša faktura #123",
            "U prilogu je račun za ožujak.",
        );
        email.attachments.push(Attachment {
            filename: "racun.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 2 * 1024 * 1024,
        });
        email
    }

    fn cond(field: ConditionField, operator: ConditionOperator, value: &str) -> Condition {
        Condition::new(field, operator, value)
    }

    #[test]
    fn contains_is_case_insensitive() {
        let c = cond(ConditionField::Subject, ConditionOperator::Contains, "FAKTURA");
        assert_eq!(evaluate(&c, &invoice_email()), Ok(true));
    }

    #[test]
    fn contains_alternation_matches_any_literal() {
        let email = invoice_email();
        let c = cond(
            ConditionField::Subject,
            ConditionOperator::Contains,
            "faktura|račun",
        );
        assert_eq!(evaluate(&c, &email), Ok(true));

        let body = cond(ConditionField::Body, ConditionOperator::Contains, "ponuda | RAČUN");
        assert_eq!(evaluate(&body, &email), Ok(true));

        let miss = cond(ConditionField::Subject, ConditionOperator::Contains, "ponuda|uplata");
        assert_eq!(evaluate(&miss, &email), Ok(false));
    }

    #[test]
    fn not_contains_requires_every_alternative_absent() {
        let email = invoice_email();
        let c = cond(
            ConditionField::Subject,
            ConditionOperator::NotContains,
            "newsletter|faktura",
        );
        assert_eq!(evaluate(&c, &email), Ok(false));

        let c = cond(
            ConditionField::Subject,
            ConditionOperator::NotContains,
            "newsletter|promo",
        );
        assert_eq!(evaluate(&c, &email), Ok(true));
    }

    #[test]
    fn empty_contains_value_matches_nothing() {
        let c = cond(ConditionField::Subject, ConditionOperator::Contains, " | ");
        assert_eq!(evaluate(&c, &invoice_email()), Ok(false));
    }

    #[test]
    fn domain_equals_and_affixes() {
        let email = invoice_email();
        let eq = cond(ConditionField::Domain, ConditionOperator::Equals, "BANKA.HR");
        let starts = cond(ConditionField::Sender, ConditionOperator::StartsWith, "racuni@");
        let ends = cond(ConditionField::Sender, ConditionOperator::EndsWith, ".hr");
        let equals_substring = cond(ConditionField::Domain, ConditionOperator::Equals, "banka");

        assert_eq!(evaluate(&eq, &email), Ok(true));
        assert_eq!(evaluate(&starts, &email), Ok(true));
        assert_eq!(evaluate(&ends, &email), Ok(true));
        assert_eq!(evaluate(&equals_substring, &email), Ok(false));
    }

    #[test]
    fn has_attachment_compares_as_text() {
        let email = invoice_email();
        let yes = cond(ConditionField::HasAttachment, ConditionOperator::Equals, "true");
        assert_eq!(evaluate(&yes, &email), Ok(true));

        let plain = Email::new("e2", "a@b.com", "hi", "");
        assert_eq!(evaluate(&yes, &plain), Ok(false));
    }

    #[test]
    fn size_comparisons_accept_suffixes() {
        let email = invoice_email();
        let big = cond(ConditionField::Size, ConditionOperator::GreaterThan, "1MB");
        let small = cond(ConditionField::Size, ConditionOperator::LessThan, "512 KB");

        assert_eq!(evaluate(&big, &email), Ok(true));
        assert_eq!(evaluate(&small, &email), Ok(false));
    }

    #[test]
    fn numeric_operator_on_text_field_fails_closed() {
        let c = cond(ConditionField::Subject, ConditionOperator::GreaterThan, "10");
        let email = invoice_email();

        assert_eq!(
            evaluate(&c, &email),
            Err(ConditionError::NonNumericField {
                field: "subject",
                operator: "greaterThan",
            })
        );
        assert!(!is_satisfied(&c, &email));
        assert!(check(&c).is_err());
    }

    #[test]
    fn unparseable_size_is_an_error() {
        let c = cond(ConditionField::Size, ConditionOperator::LessThan, "huge");
        assert_eq!(
            evaluate(&c, &invoice_email()),
            Err(ConditionError::InvalidNumber("huge".to_string()))
        );
    }

    #[test]
    fn regex_matches_case_insensitively() {
        let c = cond(ConditionField::Subject, ConditionOperator::Regex, r"faktura\s+#\d+");
        assert_eq!(evaluate(&c, &invoice_email()), Ok(true));
    }

    #[test]
    fn invalid_regex_fails_closed() {
        let c = cond(ConditionField::Subject, ConditionOperator::Regex, "(unclosed");
        assert!(matches!(
            evaluate(&c, &invoice_email()),
            Err(ConditionError::InvalidPattern { .. })
        ));
        assert!(!is_satisfied(&c, &invoice_email()));
    }

    #[test]
    fn parse_size_variants() {
        assert_eq!(parse_size("100"), Some(100));
        assert_eq!(parse_size("100b"), Some(100));
        assert_eq!(parse_size("2KB"), Some(2048));
        assert_eq!(parse_size("1.5 MB"), Some(1_572_864));
        assert_eq!(parse_size("1gb"), Some(1 << 30));
        assert_eq!(parse_size("-4"), None);
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn pattern_cache_compiles_each_valid_regex_once() {
        let conditions = vec![
            cond(ConditionField::Subject, ConditionOperator::Regex, r"faktura\s+#\d+"),
            cond(ConditionField::Body, ConditionOperator::Regex, r"faktura\s+#\d+"),
            cond(ConditionField::Subject, ConditionOperator::Regex, "(unclosed"),
            cond(ConditionField::Subject, ConditionOperator::Contains, "faktura"),
        ];
        let cache = PatternCache::for_conditions(&conditions);

        assert_eq!(cache.len(), 1);
        assert_eq!(evaluate_with(&conditions[0], &invoice_email(), &cache), Ok(true));
        assert_eq!(
            evaluate_with(&conditions[0], &invoice_email(), &cache),
            evaluate(&conditions[0], &invoice_email())
        );
        assert!(matches!(
            check_with(&conditions[2], &cache),
            Err(ConditionError::InvalidPattern { .. })
        ));
    }
}
