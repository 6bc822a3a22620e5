//! Email domain types.
//!
//! An [`Email`] is a snapshot handed to the engine by the mail store. The engine never
//! mutates the caller's copy; it returns a patched clone instead.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EmailId;

/// Folder that `archive` actions move messages into.
pub const ARCHIVE_FOLDER: &str = "Archive";

/// Folder new messages start in.
pub const INBOX_FOLDER: &str = "Inbox";

/// An individual email message as seen by the classification engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    /// Unique identifier for this email.
    pub id: EmailId,
    /// Sender address.
    pub from: Address,
    /// Email subject line.
    #[serde(default)]
    pub subject: String,
    /// Plain text body content.
    #[serde(default)]
    pub body_text: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
    /// Folder the message currently lives in.
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Labels applied to this email.
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Whether the email has been read.
    #[serde(default)]
    pub is_read: bool,
    /// Whether the email is starred.
    #[serde(default)]
    pub is_starred: bool,
    /// Whether the email was marked important.
    #[serde(default)]
    pub is_important: bool,
    /// Whether the email was marked as spam.
    #[serde(default)]
    pub is_spam: bool,
    /// Set by `delete` actions; physical removal is up to the caller.
    #[serde(default)]
    pub is_deleted: bool,
    /// File attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Priority score assigned by the scorer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<u8>,
}

fn default_folder() -> String {
    INBOX_FOLDER.to_string()
}

impl Email {
    /// Creates an unread inbox email with no labels or attachments.
    pub fn new(
        id: impl Into<EmailId>,
        from: impl Into<String>,
        subject: impl Into<String>,
        body_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            from: Address::new(from),
            subject: subject.into(),
            body_text: body_text.into(),
            received_at: Utc::now(),
            folder: default_folder(),
            labels: BTreeSet::new(),
            is_read: false,
            is_starred: false,
            is_important: false,
            is_spam: false,
            is_deleted: false,
            attachments: Vec::new(),
            priority_score: None,
        }
    }

    /// Returns the sender's domain, lowercased.
    ///
    /// Everything after the last `@` of the sender address; empty when there is none.
    pub fn sender_domain(&self) -> String {
        self.from.domain().unwrap_or_default().to_lowercase()
    }

    /// Returns true if the message carries at least one attachment.
    pub fn has_attachment(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Byte length of the body plus all attachments.
    pub fn size_bytes(&self) -> u64 {
        let attachments: u64 = self.attachments.iter().map(|a| a.size_bytes).sum();
        self.body_text.len() as u64 + attachments
    }

    /// Returns true if the label is present.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// An email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Email address.
    pub email: String,
    /// Display name (e.g., "Ana Horvat").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    /// Creates a new address with just an email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Creates a new address with email and display name.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }

    /// Returns the part after the last `@`, if any.
    pub fn domain(&self) -> Option<&str> {
        self.email
            .rsplit_once('@')
            .map(|(_, domain)| domain.trim_end_matches('>'))
    }

    /// Returns the display representation of this address.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// A file attachment on an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Original filename.
    pub filename: String,
    /// MIME content type.
    pub content_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
}
