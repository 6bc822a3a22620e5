//! Action execution.
//!
//! Applies an ordered action list to a copy of an email. Mutations happen in list order,
//! so when two actions disagree the later one wins; each such disagreement is reported
//! as a conflict. Side effects the engine cannot perform itself (forwarding, physical
//! deletion) are returned as [`Effect`]s.

use std::collections::HashSet;

use thiserror::Error;

use crate::domain::{Action, ActionType, Effect, Email, ARCHIVE_FOLDER};

/// An action that cannot be applied because it is misconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("`{0}` requires a target")]
    MissingTarget(&'static str),

    #[error("unknown marker `{0}`, expected read, unread, important or spam")]
    UnknownMarker(String),
}

/// Outcome of applying an action list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// The patched email.
    pub email: Email,
    /// Side effects in emission order.
    pub effects: Vec<Effect>,
    /// Descriptions of conflicting actions resolved last-write-wins.
    pub conflicts: Vec<String>,
    /// Whether any action wrote the folder, even to its current value.
    pub folder_set: bool,
}

/// Tracks which states this action list has already written.
#[derive(Default)]
struct Writes {
    folder: Option<String>,
    read: Option<bool>,
    added: HashSet<String>,
    removed: HashSet<String>,
}

/// Applies actions in order to a copy of `email`.
///
/// On error nothing is returned but the error, so a failing list has no partial effect.
pub fn apply(actions: &[Action], email: &Email) -> Result<Execution, ActionError> {
    let mut patched = email.clone();
    let mut effects = Vec::new();
    let mut conflicts = Vec::new();
    let mut writes = Writes::default();

    for action in actions {
        match action.kind {
            ActionType::MoveTo => {
                let folder = required_target(action)?;
                set_folder(&mut patched, &mut writes, &mut conflicts, folder);
            }
            ActionType::Archive => {
                set_folder(&mut patched, &mut writes, &mut conflicts, ARCHIVE_FOLDER);
            }
            ActionType::AddLabel => {
                let label = required_target(action)?;
                if writes.removed.remove(label) {
                    conflicts.push(format!("label `{label}` removed then added again"));
                }
                writes.added.insert(label.to_string());
                patched.labels.insert(label.to_string());
            }
            ActionType::RemoveLabel => {
                let label = required_target(action)?;
                if writes.added.remove(label) {
                    conflicts.push(format!("label `{label}` added then removed"));
                }
                writes.removed.insert(label.to_string());
                patched.labels.remove(label);
            }
            ActionType::MarkAs => {
                let marker = required_target(action)?;
                mark(&mut patched, &mut writes, &mut conflicts, marker)?;
            }
            ActionType::Forward => {
                let to = required_target(action)?;
                effects.push(Effect::Forward { to: to.to_string() });
            }
            ActionType::Delete => {
                patched.is_deleted = true;
                effects.push(Effect::Delete);
            }
            ActionType::Star => {
                patched.is_starred = true;
            }
        }
    }

    Ok(Execution {
        email: patched,
        effects,
        conflicts,
        folder_set: writes.folder.is_some(),
    })
}

fn required_target(action: &Action) -> Result<&str, ActionError> {
    action
        .target()
        .ok_or(ActionError::MissingTarget(action.kind.as_str()))
}

fn set_folder(email: &mut Email, writes: &mut Writes, conflicts: &mut Vec<String>, folder: &str) {
    if let Some(previous) = writes.folder.as_deref() {
        if previous != folder {
            conflicts.push(format!("folder `{previous}` overridden by `{folder}`"));
        }
    }
    writes.folder = Some(folder.to_string());
    email.folder = folder.to_string();
}

fn mark(
    email: &mut Email,
    writes: &mut Writes,
    conflicts: &mut Vec<String>,
    marker: &str,
) -> Result<(), ActionError> {
    match marker.to_lowercase().as_str() {
        "read" => set_read(email, writes, conflicts, true),
        "unread" => set_read(email, writes, conflicts, false),
        "important" => email.is_important = true,
        "spam" => email.is_spam = true,
        _ => return Err(ActionError::UnknownMarker(marker.to_string())),
    }
    Ok(())
}

fn set_read(email: &mut Email, writes: &mut Writes, conflicts: &mut Vec<String>, read: bool) {
    if writes.read == Some(!read) {
        let state = if read { "read" } else { "unread" };
        conflicts.push(format!("read state overridden, now {state}"));
    }
    writes.read = Some(read);
    email.is_read = read;
}
