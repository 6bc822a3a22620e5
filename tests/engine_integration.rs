//! Integration tests for the rule engine, scoring, and suggestion learning.
//!
//! These exercise the public API end to end. Each module contains its own unit
//! tests for detailed logic.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use triage::config::{EngineSettings, LearnerSettings, Settings};
use triage::domain::{
    Action, Condition, ConditionField, ConditionOperator, DiagnosticKind, Effect, Email,
    FeedbackEvent, MatchOperator, PriorityFactor, PriorityTier, Rule, RuleSource,
};
use triage::engine::{condition, matcher, MatchMode, RuleSet};
use triage::services::{score, PriorityService, RuleEngine, SuggestionLearner};

fn subject_contains(value: &str) -> Condition {
    Condition::new(ConditionField::Subject, ConditionOperator::Contains, value)
}

fn rule(id: &str, order: u32, conditions: Vec<Condition>, actions: Vec<Action>) -> Rule {
    Rule::new(id, conditions, actions)
        .with_id(id)
        .with_order(order)
}

// ============================================================================
// Rule Processing
// ============================================================================

#[test]
fn alternation_moves_and_labels_invoice() {
    let rules = vec![rule(
        "fakture",
        0,
        vec![subject_contains("faktura|račun")],
        vec![Action::move_to("Fakture"), Action::add_label("Fakture")],
    )
    .with_operator(MatchOperator::Any)];
    let mut engine = RuleEngine::new(rules, &EngineSettings::default()).unwrap();

    let email = Email::new("e1", "billing@shop.hr", "Vaša faktura #123", "");
    let outcome = engine.process(&email);

    assert_eq!(outcome.email.folder, "Fakture");
    assert!(outcome.email.labels.contains("Fakture"));
    assert_eq!(outcome.applied_rule_ids.len(), 1);
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn later_rule_wins_folder() {
    let rules = vec![
        rule("second", 1, vec![subject_contains("report")], vec![Action::move_to("B")]),
        rule("first", 0, vec![subject_contains("report")], vec![Action::move_to("A")]),
    ];
    let set = RuleSet::new(rules).unwrap();

    let email = Email::new("e1", "a@b.com", "Weekly report", "");
    let outcome = set.process(&email, MatchMode::ContinueOnMatch);

    assert_eq!(outcome.email.folder, "B");
    let applied: Vec<_> = outcome.applied_rule_ids.iter().map(|id| id.as_str()).collect();
    assert_eq!(applied, vec!["first", "second"]);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::ConflictWarning));
}

#[test]
fn first_match_mode_stops_after_one_rule() {
    let rules = vec![
        rule("first", 0, vec![subject_contains("report")], vec![Action::move_to("A")]),
        rule("second", 1, vec![subject_contains("report")], vec![Action::move_to("B")]),
    ];
    let settings = EngineSettings {
        match_mode: MatchMode::FirstMatch,
    };
    let mut engine = RuleEngine::new(rules, &settings).unwrap();

    let outcome = engine.process(&Email::new("e1", "a@b.com", "Weekly report", ""));

    assert_eq!(outcome.email.folder, "A");
    assert_eq!(outcome.applied_rule_ids.len(), 1);
}

#[test]
fn numeric_operator_on_text_field_is_reported() {
    let rules = vec![
        rule(
            "broken",
            0,
            vec![Condition::new(
                ConditionField::Subject,
                ConditionOperator::GreaterThan,
                "10",
            )],
            vec![Action::add_label("Never")],
        ),
        rule("ok", 1, vec![subject_contains("hello")], vec![Action::star()]),
    ];
    let mut engine = RuleEngine::new(rules, &EngineSettings::default()).unwrap();

    let outcome = engine.process(&Email::new("e1", "a@b.com", "hello there", ""));

    assert!(!outcome.email.labels.contains("Never"));
    assert!(outcome.email.is_starred);
    assert!(outcome.has_errors());
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ConfigurationError);
    assert_eq!(outcome.diagnostics[0].rule_id.as_str(), "broken");
}

#[test]
fn delete_ends_the_pass_and_forward_is_an_effect() {
    let rules = vec![
        rule(
            "forward",
            0,
            vec![subject_contains("spam")],
            vec![Action::forward("abuse@example.com")],
        ),
        rule("delete", 1, vec![subject_contains("spam")], vec![Action::delete()]),
        rule("label", 2, vec![subject_contains("spam")], vec![Action::add_label("Late")]),
    ];
    let set = RuleSet::new(rules).unwrap();

    let outcome = set.process(
        &Email::new("e1", "x@y.com", "Cheap spam offer", ""),
        MatchMode::ContinueOnMatch,
    );

    assert!(outcome.email.is_deleted);
    assert!(!outcome.email.labels.contains("Late"));
    assert_eq!(
        outcome.effects,
        vec![
            Effect::Forward {
                to: "abuse@example.com".to_string()
            },
            Effect::Delete
        ]
    );
}

#[test]
fn engine_edits_change_processing() {
    let rules = vec![
        rule("a", 0, vec![subject_contains("report")], vec![Action::move_to("A")]),
        rule("b", 1, vec![subject_contains("report")], vec![Action::move_to("B")]),
    ];
    let mut engine = RuleEngine::new(rules, &EngineSettings::default()).unwrap();
    let email = Email::new("e1", "a@b.com", "Weekly report", "");

    engine.reorder(&"b".into(), 0).unwrap();
    assert_eq!(engine.process(&email).email.folder, "A");

    engine.toggle_rule(&"a".into()).unwrap();
    assert_eq!(engine.process(&email).email.folder, "B");

    engine.remove_rule(&"b".into()).unwrap();
    assert_eq!(engine.process(&email).email.folder, "Inbox");
}

#[test]
fn batch_matches_sequential_processing() {
    let rules = vec![
        rule("a", 0, vec![subject_contains("report")], vec![Action::add_label("Reports")]),
        rule(
            "b",
            1,
            vec![Condition::new(
                ConditionField::Domain,
                ConditionOperator::Equals,
                "b.com",
            )],
            vec![Action::archive()],
        ),
    ];
    let set = RuleSet::new(rules).unwrap();
    let emails: Vec<Email> = (0..20)
        .map(|i| {
            let sender = if i % 2 == 0 { "x@b.com" } else { "x@c.com" };
            let subject = if i % 3 == 0 { "Monthly report" } else { "Hi" };
            Email::new(format!("e{i}"), sender, subject, "")
        })
        .collect();

    let batch = triage::services::process_batch(&set, &emails, MatchMode::ContinueOnMatch);
    let sequential: Vec<_> = emails
        .iter()
        .map(|e| set.process(e, MatchMode::ContinueOnMatch))
        .collect();

    assert_eq!(batch, sequential);
}

// ============================================================================
// Priority Scoring
// ============================================================================

#[test]
fn vip_and_keywords_from_settings() {
    let settings: Settings = serde_json::from_str(
        r#"{
            "scoring": {
                "vipSenders": ["firma.hr"],
                "keywords": [{"keyword": "urgent", "impact": 8}]
            }
        }"#,
    )
    .unwrap();
    let service = PriorityService::from_settings(&settings.scoring);
    let email = Email::new("e1", "ceo@firma.hr", "URGENT: sign", "");

    let external = vec![PriorityFactor::new("deadline", 10, "due today"); 3];
    let (s, factors) = service.evaluate(&email, &external);

    assert_eq!(factors.len(), 5);
    assert_eq!(s.score, 48);
    assert_eq!(s.tier, PriorityTier::Medium);
}

// ============================================================================
// Suggestion Learning
// ============================================================================

#[test]
fn bank_feedback_becomes_disabled_candidate_then_promoted() {
    let mut learner = SuggestionLearner::new(LearnerSettings::default());
    for (i, subject) in ["Izvod", "Obavijest", "Kartica", "Kredit"].iter().enumerate() {
        let email = Email::new(format!("e{i}"), "info@banka.hr", *subject, "");
        learner.observe(FeedbackEvent::accepted(email.id.clone(), "Financije"), &email);
    }

    let candidates = learner.mine();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].confidence, 1.0);
    assert!(!candidates[0].rule.enabled);
    assert_eq!(candidates[0].rule.source, RuleSource::AiSuggested);

    let mut engine = RuleEngine::new(Vec::new(), &EngineSettings::default()).unwrap();
    let id = engine.promote_candidate(candidates[0].clone()).unwrap();
    assert!(engine.get(&id).unwrap().enabled);

    let outcome = engine.process(&Email::new("e9", "noreply@banka.hr", "Novo", ""));
    assert!(outcome.email.labels.contains("Financije"));

    assert!(learner.mine_excluding(engine.rules()).is_empty());
}

// ============================================================================
// Properties
// ============================================================================

fn word() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["invoice", "report", "hello", "faktura", "urgent", "news"])
        .prop_map(String::from)
}

fn condition_strategy() -> impl Strategy<Value = Condition> {
    (
        prop::sample::select(vec![ConditionField::Subject, ConditionField::Body]),
        prop::sample::select(vec![
            ConditionOperator::Contains,
            ConditionOperator::NotContains,
            ConditionOperator::Equals,
            ConditionOperator::StartsWith,
        ]),
        word(),
    )
        .prop_map(|(field, operator, value)| Condition::new(field, operator, value))
}

fn email_strategy() -> impl Strategy<Value = Email> {
    (prop::collection::vec(word(), 0..4), prop::collection::vec(word(), 0..4)).prop_map(
        |(subject, body)| Email::new("p1", "someone@example.com", subject.join(" "), body.join(" ")),
    )
}

proptest! {
    #[test]
    fn processing_is_deterministic(
        conditions in prop::collection::vec(condition_strategy(), 1..4),
        email in email_strategy(),
    ) {
        let rules = vec![
            rule("r1", 0, conditions.clone(), vec![Action::add_label("One"), Action::move_to("X")]),
            rule("r2", 1, conditions, vec![Action::remove_label("One"), Action::mark_as("read")]),
        ];
        let set = RuleSet::new(rules).unwrap();

        let first = set.process(&email, MatchMode::ContinueOnMatch);
        let second = set.process(&email, MatchMode::ContinueOnMatch);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn all_is_conjunction_and_any_is_disjunction(
        conditions in prop::collection::vec(condition_strategy(), 1..5),
        email in email_strategy(),
    ) {
        let results: Vec<bool> = conditions
            .iter()
            .map(|c| condition::evaluate(c, &email).unwrap())
            .collect();
        let all = rule("r", 0, conditions.clone(), vec![Action::star()])
            .with_operator(MatchOperator::All);
        let any = rule("r", 0, conditions, vec![Action::star()])
            .with_operator(MatchOperator::Any);

        prop_assert_eq!(matcher::matches(&all, &email), Ok(results.iter().all(|&r| r)));
        prop_assert_eq!(matcher::matches(&any, &email), Ok(results.iter().any(|&r| r)));
    }

    #[test]
    fn score_is_clamped_sum(impacts in prop::collection::vec(-50i32..50, 0..20)) {
        let factors: Vec<_> = impacts
            .iter()
            .map(|i| PriorityFactor::new("f", *i, ""))
            .collect();
        let email = Email::new("p1", "a@b.com", "", "");

        let expected: i32 = impacts.iter().map(|&i| i.clamp(-10, 10)).sum::<i32>().clamp(0, 100);
        let s = score(&email, &factors);

        prop_assert_eq!(i32::from(s.score), expected);
    }
}
