//! Rule domain types.
//!
//! A [`Rule`] pairs an ordered list of [`Condition`]s with an ordered list of
//! [`Action`]s. Rules are evaluated in ascending `order`.

use serde::{Deserialize, Serialize};

use super::RuleId;

/// Email attribute a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionField {
    /// Full sender address.
    Sender,
    /// Part of the sender address after `@`.
    Domain,
    /// Subject line.
    Subject,
    /// Plain text body.
    Body,
    /// Whether any attachment is present.
    HasAttachment,
    /// Byte length of body plus attachments.
    Size,
}

impl ConditionField {
    /// Returns true if numeric comparisons are meaningful for this field.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ConditionField::Size)
    }

    /// Returns the wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionField::Sender => "sender",
            ConditionField::Domain => "domain",
            ConditionField::Subject => "subject",
            ConditionField::Body => "body",
            ConditionField::HasAttachment => "hasAttachment",
            ConditionField::Size => "size",
        }
    }
}

/// Comparison a condition performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Contains,
    NotContains,
    Equals,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Regex,
}

impl ConditionOperator {
    /// Returns true for operators that only apply to numeric fields.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ConditionOperator::GreaterThan | ConditionOperator::LessThan
        )
    }

    /// Returns the wire name of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Contains => "contains",
            ConditionOperator::NotContains => "notContains",
            ConditionOperator::Equals => "equals",
            ConditionOperator::StartsWith => "startsWith",
            ConditionOperator::EndsWith => "endsWith",
            ConditionOperator::GreaterThan => "greaterThan",
            ConditionOperator::LessThan => "lessThan",
            ConditionOperator::Regex => "regex",
        }
    }
}

/// A single predicate over one email field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    /// Field to inspect.
    pub field: ConditionField,
    /// Comparison to perform.
    pub operator: ConditionOperator,
    /// Comparison operand.
    pub value: String,
}

impl Condition {
    /// Creates a new condition.
    pub fn new(field: ConditionField, operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
        }
    }
}

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOperator {
    /// Every condition must hold.
    #[default]
    All,
    /// At least one condition must hold.
    Any,
}

/// Kind of mutation or side effect an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    MoveTo,
    AddLabel,
    RemoveLabel,
    MarkAs,
    Forward,
    Archive,
    Delete,
    Star,
}

impl ActionType {
    /// Returns true if the action is meaningless without a target.
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            ActionType::MoveTo
                | ActionType::AddLabel
                | ActionType::RemoveLabel
                | ActionType::MarkAs
                | ActionType::Forward
        )
    }

    /// Returns the wire name of the action type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::MoveTo => "moveTo",
            ActionType::AddLabel => "addLabel",
            ActionType::RemoveLabel => "removeLabel",
            ActionType::MarkAs => "markAs",
            ActionType::Forward => "forward",
            ActionType::Archive => "archive",
            ActionType::Delete => "delete",
            ActionType::Star => "star",
        }
    }
}

/// A single deterministic mutation or emitted side effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    /// Action kind.
    #[serde(rename = "type")]
    pub kind: ActionType,
    /// Folder, label, marker or forwarding address, depending on `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Action {
    fn targeted(kind: ActionType, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: Some(target.into()),
        }
    }

    fn bare(kind: ActionType) -> Self {
        Self { kind, target: None }
    }

    /// Moves the email into a folder.
    pub fn move_to(folder: impl Into<String>) -> Self {
        Self::targeted(ActionType::MoveTo, folder)
    }

    /// Adds a label.
    pub fn add_label(label: impl Into<String>) -> Self {
        Self::targeted(ActionType::AddLabel, label)
    }

    /// Removes a label.
    pub fn remove_label(label: impl Into<String>) -> Self {
        Self::targeted(ActionType::RemoveLabel, label)
    }

    /// Marks the email (`read`, `unread`, `important`, `spam`).
    pub fn mark_as(marker: impl Into<String>) -> Self {
        Self::targeted(ActionType::MarkAs, marker)
    }

    /// Forwards the email to an address.
    pub fn forward(to: impl Into<String>) -> Self {
        Self::targeted(ActionType::Forward, to)
    }

    /// Moves the email to the archive folder.
    pub fn archive() -> Self {
        Self::bare(ActionType::Archive)
    }

    /// Deletes the email.
    pub fn delete() -> Self {
        Self::bare(ActionType::Delete)
    }

    /// Stars the email.
    pub fn star() -> Self {
        Self::bare(ActionType::Star)
    }

    /// Returns the trimmed target, treating blank strings as absent.
    pub fn target(&self) -> Option<&str> {
        self.target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Where a rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleSource {
    /// Written by the user.
    #[default]
    #[serde(rename = "manual")]
    Manual,
    /// Proposed by the suggestion learner and accepted by the user.
    #[serde(rename = "ai-suggested")]
    AiSuggested,
}

/// A classification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique identifier for this rule.
    pub id: RuleId,
    /// Display name.
    pub name: String,
    /// Disabled rules never match.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// How conditions combine.
    #[serde(default)]
    pub condition_operator: MatchOperator,
    /// Conditions, evaluated in order.
    pub conditions: Vec<Condition>,
    /// Actions, applied in order.
    pub actions: Vec<Action>,
    /// Evaluation position; lower runs first.
    #[serde(default)]
    pub order: u32,
    /// Origin of the rule.
    #[serde(default)]
    pub source: RuleSource,
    /// Number of emails this rule has been applied to.
    #[serde(default)]
    pub match_count: u64,
    /// Ends the pass after this rule applies.
    #[serde(default)]
    pub stop_processing: bool,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// Creates an enabled manual rule with a generated id.
    pub fn new(name: impl Into<String>, conditions: Vec<Condition>, actions: Vec<Action>) -> Self {
        Self {
            id: RuleId::generate(),
            name: name.into(),
            enabled: true,
            condition_operator: MatchOperator::All,
            conditions,
            actions,
            order: 0,
            source: RuleSource::Manual,
            match_count: 0,
            stop_processing: false,
        }
    }

    /// Replaces the generated id.
    pub fn with_id(mut self, id: impl Into<RuleId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the evaluation order.
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    /// Sets how conditions combine.
    pub fn with_operator(mut self, operator: MatchOperator) -> Self {
        self.condition_operator = operator;
        self
    }

    /// Returns true if any action deletes the email.
    pub fn is_terminal(&self) -> bool {
        self.actions.iter().any(|a| a.kind == ActionType::Delete)
    }
}
