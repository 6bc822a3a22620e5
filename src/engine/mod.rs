//! Rule evaluation pipeline.
//!
//! Leaf-first: [`condition`] evaluates single predicates, [`matcher`] combines them per
//! rule, [`executor`] applies a rule's actions, and [`rule_set`] runs an email through an
//! ordered set of rules.
//!
//! ```text
//! Email -> RuleSet::process
//!            for each enabled rule, in order:
//!              matcher::matches_with -> condition::evaluate_with
//!              executor::apply  -> patched email + effects
//!          -> ProcessOutcome
//! ```
//!
//! Everything here is synchronous and free of shared state.

pub mod condition;
pub mod executor;
pub mod matcher;
pub mod rule_set;

pub use condition::{ConditionError, PatternCache};
pub use executor::{ActionError, Execution};
pub use rule_set::{validate_rule, MatchMode, RuleSet, RuleSetError};
