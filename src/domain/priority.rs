//! Priority scoring domain types.

use serde::{Deserialize, Serialize};

/// Smallest impact a single factor may contribute.
pub const MIN_IMPACT: i32 = -10;

/// Largest impact a single factor may contribute.
pub const MAX_IMPACT: i32 = 10;

/// A signed contribution to a message's priority score.
///
/// Produced by upstream signal sources (VIP lookup, deadline detection, sentiment)
/// and consumed by the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityFactor {
    /// Short factor name, e.g. "vip-sender".
    pub name: String,
    /// Signed contribution in `[-10, 10]`.
    pub impact: i32,
    /// Explanation shown next to the score.
    #[serde(default)]
    pub description: String,
}

impl PriorityFactor {
    /// Creates a new factor.
    pub fn new(name: impl Into<String>, impact: i32, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            impact,
            description: description.into(),
        }
    }

    /// Impact limited to the allowed range.
    pub fn bounded_impact(&self) -> i32 {
        self.impact.clamp(MIN_IMPACT, MAX_IMPACT)
    }
}

/// Named bucket of the priority score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityTier {
    /// Returns the display label for this tier.
    pub fn label(&self) -> &'static str {
        match self {
            PriorityTier::Critical => "critical",
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
            PriorityTier::Minimal => "minimal",
        }
    }
}

/// Lower bounds (inclusive) of each tier above `minimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub critical: u8,
    pub high: u8,
    pub medium: u8,
    pub low: u8,
}

impl TierThresholds {
    /// The fixed thresholds used by [`crate::services::score`].
    pub const STANDARD: TierThresholds = TierThresholds {
        critical: 80,
        high: 60,
        medium: 40,
        low: 20,
    };

    /// Classifies a score into a tier.
    pub fn tier_for(&self, score: u8) -> PriorityTier {
        if score >= self.critical {
            PriorityTier::Critical
        } else if score >= self.high {
            PriorityTier::High
        } else if score >= self.medium {
            PriorityTier::Medium
        } else if score >= self.low {
            PriorityTier::Low
        } else {
            PriorityTier::Minimal
        }
    }

    /// Returns true if the thresholds are strictly descending.
    pub fn is_descending(&self) -> bool {
        self.critical > self.high && self.high > self.medium && self.medium > self.low
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Composite priority of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityScore {
    /// Score in `[0, 100]`.
    pub score: u8,
    /// Tier the score falls into.
    pub tier: PriorityTier,
}
