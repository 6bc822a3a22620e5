//! triage - Entry point for the rule engine command line

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use triage::config::{load_rules, Settings};
use triage::domain::{Email, EmailId, FeedbackEvent, PriorityFactor, PriorityTier};
use triage::engine::{condition, validate_rule};
use triage::services::{assign, PriorityService, RuleEngine, SuggestionLearner};

#[derive(Parser)]
#[command(name = "triage", version, about = "Rule-based email classification")]
struct Cli {
    /// Settings file; defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run emails through a rule set.
    Process {
        #[arg(long)]
        rules: PathBuf,
        #[arg(long)]
        emails: PathBuf,
        /// Stop each email after its first applied rule.
        #[arg(long)]
        first_match: bool,
    },
    /// Score emails from their priority factors.
    Score {
        /// JSON array of `{ "email": ..., "factors": [...] }`.
        #[arg(long)]
        factors: PathBuf,
    },
    /// Mine candidate rules from label feedback.
    Mine {
        #[arg(long)]
        feedback: PathBuf,
        #[arg(long)]
        emails: PathBuf,
        /// Existing rules; candidates they already cover are dropped.
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Check a rules file without processing anything.
    Validate {
        #[arg(long)]
        rules: PathBuf,
    },
}

#[derive(Deserialize)]
struct ScoreInput {
    email: Email,
    #[serde(default)]
    factors: Vec<PriorityFactor>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreReport {
    email_id: EmailId,
    score: u8,
    tier: PriorityTier,
    factors: Vec<PriorityFactor>,
    email: Email,
}

#[derive(Serialize)]
struct ValidationIssue {
    rule: String,
    error: String,
}

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    rules: usize,
    issues: Vec<ValidationIssue>,
}

fn main() {
    // Initialize logging; stdout carries the JSON output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match run(Cli::parse()) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            tracing::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Runs a command; `Ok(false)` means it completed but found problems.
fn run(cli: Cli) -> Result<bool> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_or_default(&Settings::default_path()?)?,
    };

    match cli.command {
        Command::Process {
            rules,
            emails,
            first_match,
        } => {
            let mut engine_settings = settings.engine.clone();
            if first_match {
                engine_settings.match_mode = triage::engine::MatchMode::FirstMatch;
            }
            let mut engine = RuleEngine::new(load_rules(&rules)?, &engine_settings)
                .context("rule set rejected")?;
            let emails: Vec<Email> = read_json(&emails)?;
            tracing::info!(rules = engine.rules().len(), emails = emails.len(), "processing");

            let outcomes = engine.process_batch(&emails);
            let ok = !outcomes.iter().any(|o| o.has_errors());
            print_json(&outcomes)?;
            Ok(ok)
        }
        Command::Score { factors } => {
            let inputs: Vec<ScoreInput> = read_json(&factors)?;
            let service = PriorityService::from_settings(&settings.scoring);
            let reports: Vec<ScoreReport> = inputs
                .into_iter()
                .map(|input| {
                    let (score, factors) = service.evaluate(&input.email, &input.factors);
                    ScoreReport {
                        email_id: input.email.id.clone(),
                        score: score.score,
                        tier: score.tier,
                        factors,
                        email: assign(&input.email, &score),
                    }
                })
                .collect();
            print_json(&reports)?;
            Ok(true)
        }
        Command::Mine {
            feedback,
            emails,
            rules,
        } => {
            let events: Vec<FeedbackEvent> = read_json(&feedback)?;
            let emails: Vec<Email> = read_json(&emails)?;
            let by_id: HashMap<&EmailId, &Email> = emails.iter().map(|e| (&e.id, e)).collect();

            let mut learner = SuggestionLearner::new(settings.learner.clone());
            for event in events {
                match by_id.get(&event.email_id) {
                    Some(email) => {
                        learner.observe(event, email);
                    }
                    None => tracing::warn!(email_id = %event.email_id, "feedback for unknown email"),
                }
            }
            learner.expire(chrono::Utc::now());

            let candidates = match rules {
                Some(path) => learner.mine_excluding(&load_rules(&path)?),
                None => learner.mine(),
            };
            tracing::info!(
                observations = learner.len(),
                candidates = candidates.len(),
                "mining complete"
            );
            print_json(&candidates)?;
            Ok(true)
        }
        Command::Validate { rules } => {
            let rules = load_rules(&rules)?;
            let mut issues = Vec::new();
            let mut seen = HashSet::new();
            for rule in &rules {
                let name = rule.id.to_string();
                if let Err(e) = validate_rule(rule) {
                    issues.push(ValidationIssue {
                        rule: name.clone(),
                        error: e.to_string(),
                    });
                }
                if !seen.insert(&rule.id) {
                    issues.push(ValidationIssue {
                        rule: name.clone(),
                        error: "duplicate rule id".to_string(),
                    });
                }
                for c in &rule.conditions {
                    if let Err(e) = condition::check(c) {
                        issues.push(ValidationIssue {
                            rule: name.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            let report = ValidationReport {
                valid: issues.is_empty(),
                rules: rules.len(),
                issues,
            };
            let valid = report.valid;
            print_json(&report)?;
            Ok(valid)
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
