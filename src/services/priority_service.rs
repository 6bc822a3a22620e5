//! Priority scoring service.
//!
//! Scores are the sum of signed factor impacts, saturated to `[0, 100]`, then bucketed
//! into tiers. Factors come from [`SignalProducer`]s; the scoring itself is pure.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::ScoringSettings;
use crate::domain::{
    Email, PriorityFactor, PriorityScore, TierThresholds, MAX_IMPACT, MIN_IMPACT,
};

/// Scores an email with the standard tier thresholds.
pub fn score(email: &Email, factors: &[PriorityFactor]) -> PriorityScore {
    score_with(email, factors, &TierThresholds::STANDARD)
}

/// Scores an email with explicit tier thresholds.
pub fn score_with(
    email: &Email,
    factors: &[PriorityFactor],
    thresholds: &TierThresholds,
) -> PriorityScore {
    let mut total: i64 = 0;
    for factor in factors {
        if !(MIN_IMPACT..=MAX_IMPACT).contains(&factor.impact) {
            tracing::warn!(
                email_id = %email.id,
                factor = %factor.name,
                impact = factor.impact,
                "factor impact out of range, clamping"
            );
        }
        total += i64::from(factor.bounded_impact());
    }

    let score = total.clamp(0, 100) as u8;
    let tier = thresholds.tier_for(score);
    tracing::debug!(email_id = %email.id, score, tier = tier.label(), "scored");
    PriorityScore { score, tier }
}

/// Returns a copy of the email carrying the score.
pub fn assign(email: &Email, score: &PriorityScore) -> Email {
    Email {
        priority_score: Some(score.score),
        ..email.clone()
    }
}

/// A source of priority factors for an email.
pub trait SignalProducer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Factors this producer attaches to the email; may be empty.
    fn factors(&self, email: &Email) -> Vec<PriorityFactor>;
}

/// Concatenates the factors of every producer, in producer order.
pub fn collect_factors(producers: &[Box<dyn SignalProducer>], email: &Email) -> Vec<PriorityFactor> {
    producers
        .iter()
        .flat_map(|p| {
            let factors = p.factors(email);
            tracing::trace!(producer = p.name(), count = factors.len(), "factors collected");
            factors
        })
        .collect()
}

/// Raises the priority of mail from VIP addresses or domains.
#[derive(Debug, Clone)]
pub struct VipSenders {
    addresses: HashSet<String>,
    domains: HashSet<String>,
    impact: i32,
}

impl VipSenders {
    /// Default impact of a VIP sender.
    pub const DEFAULT_IMPACT: i32 = 10;

    /// Builds the list from entries that are either `user@domain` or a bare domain.
    pub fn new<I, S>(entries: I, impact: i32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut addresses = HashSet::new();
        let mut domains = HashSet::new();
        for entry in entries {
            let entry = entry.as_ref().trim().to_lowercase();
            if entry.is_empty() {
                continue;
            }
            if entry.contains('@') {
                addresses.insert(entry);
            } else {
                domains.insert(entry);
            }
        }
        Self {
            addresses,
            domains,
            impact,
        }
    }

    fn is_vip(&self, email: &Email) -> bool {
        self.addresses.contains(&email.from.email.to_lowercase())
            || self.domains.contains(&email.sender_domain())
    }
}

impl SignalProducer for VipSenders {
    fn name(&self) -> &str {
        "vip-senders"
    }

    fn factors(&self, email: &Email) -> Vec<PriorityFactor> {
        if !self.is_vip(email) {
            return Vec::new();
        }
        vec![PriorityFactor::new(
            "vip-sender",
            self.impact,
            format!("{} is a VIP sender", email.from.email),
        )]
    }
}

/// A keyword and the impact it has when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordWeight {
    pub keyword: String,
    pub impact: i32,
}

/// Adds one factor per configured keyword found in the subject or body.
#[derive(Debug, Clone, Default)]
pub struct KeywordSignal {
    weights: Vec<KeywordWeight>,
}

impl KeywordSignal {
    /// Creates the producer; matching is case-insensitive.
    pub fn new(weights: Vec<KeywordWeight>) -> Self {
        Self { weights }
    }
}

impl SignalProducer for KeywordSignal {
    fn name(&self) -> &str {
        "keywords"
    }

    fn factors(&self, email: &Email) -> Vec<PriorityFactor> {
        let subject = email.subject.to_lowercase();
        let body = email.body_text.to_lowercase();

        self.weights
            .iter()
            .filter(|w| !w.keyword.trim().is_empty())
            .filter(|w| {
                let keyword = w.keyword.to_lowercase();
                subject.contains(&keyword) || body.contains(&keyword)
            })
            .map(|w| {
                PriorityFactor::new(
                    format!("keyword:{}", w.keyword),
                    w.impact,
                    format!("mentions \"{}\"", w.keyword),
                )
            })
            .collect()
    }
}

/// Scores emails using configured producers and thresholds.
pub struct PriorityService {
    producers: Vec<Box<dyn SignalProducer>>,
    thresholds: TierThresholds,
}

impl PriorityService {
    /// Creates a service with explicit producers and thresholds.
    pub fn new(producers: Vec<Box<dyn SignalProducer>>, thresholds: TierThresholds) -> Self {
        Self {
            producers,
            thresholds,
        }
    }

    /// Builds the built-in producers from settings.
    pub fn from_settings(settings: &ScoringSettings) -> Self {
        let mut producers: Vec<Box<dyn SignalProducer>> = Vec::new();
        if !settings.vip_senders.is_empty() {
            producers.push(Box::new(VipSenders::new(
                &settings.vip_senders,
                settings.vip_impact,
            )));
        }
        if !settings.keywords.is_empty() {
            producers.push(Box::new(KeywordSignal::new(settings.keywords.clone())));
        }
        Self::new(producers, settings.thresholds)
    }

    /// Adds another producer after the existing ones.
    pub fn with_producer(mut self, producer: Box<dyn SignalProducer>) -> Self {
        self.producers.push(producer);
        self
    }

    /// Scores an email from producer factors plus any externally supplied ones.
    ///
    /// Returns the score and the full factor list it was computed from.
    pub fn evaluate(
        &self,
        email: &Email,
        external: &[PriorityFactor],
    ) -> (PriorityScore, Vec<PriorityFactor>) {
        let mut factors = collect_factors(&self.producers, email);
        factors.extend_from_slice(external);
        let score = score_with(email, &factors, &self.thresholds);
        (score, factors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriorityTier;

    fn email() -> Email {
        Email::new("e1", "CEO@Firma.hr", "Urgent: contract deadline", "Please sign today")
    }

    fn factors(impacts: &[i32]) -> Vec<PriorityFactor> {
        impacts
            .iter()
            .enumerate()
            .map(|(i, impact)| PriorityFactor::new(format!("f{i}"), *impact, ""))
            .collect()
    }

    #[test]
    fn sums_impacts() {
        let s = score(&email(), &factors(&[10, 10, 10, 5]));
        assert_eq!(s.score, 35);
        assert_eq!(s.tier, PriorityTier::Low);
    }

    #[test]
    fn negative_sum_clamps_to_zero() {
        let s = score(&email(), &factors(&[-10, -10, 3]));
        assert_eq!(s.score, 0);
        assert_eq!(s.tier, PriorityTier::Minimal);
    }

    #[test]
    fn large_sum_clamps_to_hundred() {
        let s = score(&email(), &factors(&[10; 15]));
        assert_eq!(s.score, 100);
        assert_eq!(s.tier, PriorityTier::Critical);
    }

    #[test]
    fn out_of_range_impacts_are_bounded() {
        let s = score(&email(), &factors(&[50]));
        assert_eq!(s.score, 10);
    }

    #[test]
    fn no_factors_is_minimal() {
        let s = score(&email(), &[]);
        assert_eq!(s.score, 0);
        assert_eq!(s.tier, PriorityTier::Minimal);
    }

    #[test]
    fn tier_boundaries_on_exact_scores() {
        let at = |n: usize| score(&email(), &factors(&vec![10; n])).tier;
        assert_eq!(at(8), PriorityTier::Critical);
        assert_eq!(at(6), PriorityTier::High);
        assert_eq!(at(4), PriorityTier::Medium);
        assert_eq!(at(2), PriorityTier::Low);
        assert_eq!(at(1), PriorityTier::Minimal);

        let mut just_below = factors(&[10; 8]);
        just_below.push(PriorityFactor::new("minus-one", -1, ""));
        assert_eq!(score(&email(), &just_below).score, 79);
        assert_eq!(score(&email(), &just_below).tier, PriorityTier::High);
    }

    #[test]
    fn explicit_thresholds() {
        let lenient = TierThresholds {
            critical: 30,
            high: 20,
            medium: 10,
            low: 5,
        };
        let s = score_with(&email(), &factors(&[10, 10, 10]), &lenient);
        assert_eq!(s.tier, PriorityTier::Critical);
    }

    #[test]
    fn assign_writes_score() {
        let s = score(&email(), &factors(&[10, 10]));
        let scored = assign(&email(), &s);
        assert_eq!(scored.priority_score, Some(20));
    }

    #[test]
    fn vip_by_address_and_domain() {
        let by_address = VipSenders::new(["ceo@firma.hr"], 10);
        let by_domain = VipSenders::new(["FIRMA.hr"], 7);
        let other = VipSenders::new(["boss@elsewhere.com"], 10);

        assert_eq!(by_address.factors(&email())[0].impact, 10);
        assert_eq!(by_domain.factors(&email())[0].impact, 7);
        assert!(other.factors(&email()).is_empty());
    }

    #[test]
    fn keyword_signal_matches_subject_and_body() {
        let signal = KeywordSignal::new(vec![
            KeywordWeight {
                keyword: "urgent".to_string(),
                impact: 8,
            },
            KeywordWeight {
                keyword: "sign today".to_string(),
                impact: 5,
            },
            KeywordWeight {
                keyword: "newsletter".to_string(),
                impact: -5,
            },
        ]);

        let found = signal.factors(&email());
        let names: Vec<_> = found.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["keyword:urgent", "keyword:sign today"]);
    }

    #[test]
    fn service_combines_producers_and_external_factors() {
        let service = PriorityService::new(
            vec![Box::new(VipSenders::new(["firma.hr"], 10))],
            TierThresholds::STANDARD,
        );
        let external = factors(&[10, 10, 10, 10, 10, 10, 10]);

        let (s, used) = service.evaluate(&email(), &external);

        assert_eq!(used.len(), 8);
        assert_eq!(used[0].name, "vip-sender");
        assert_eq!(s.score, 80);
        assert_eq!(s.tier, PriorityTier::Critical);
    }
}
