use super::{generate_id, timestamp, Attachment};
use crate::config::UNKNOWN_NAME;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person in the address book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub biography: String,
    #[serde(default)]
    pub biography_attachments: Vec<Attachment>,
    /// Free-form notes about the contact (HTML from the rich-text editor)
    #[serde(default)]
    pub contact_notes: String,
    #[serde(default)]
    pub contact_notes_updated_at: Option<DateTime<Utc>>,
    #[serde(default = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating a contact; everything is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub biography: Option<String>,
    pub biography_attachments: Option<Vec<Attachment>>,
    pub contact_notes: Option<String>,
    pub contact_notes_updated_at: Option<DateTime<Utc>>,
}

/// Partial update for a contact
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub biography: Option<String>,
    pub biography_attachments: Option<Vec<Attachment>>,
    pub contact_notes: Option<String>,
    pub contact_notes_updated_at: Option<Option<DateTime<Utc>>>,
}

impl Contact {
    pub fn new(input: ContactInput) -> Self {
        Self {
            id: generate_id(),
            first_name: input.first_name.unwrap_or_default(),
            last_name: input.last_name.unwrap_or_default(),
            email: input.email.unwrap_or_default(),
            phone: input.phone.unwrap_or_default(),
            company: input.company.unwrap_or_default(),
            biography: input.biography.unwrap_or_default(),
            biography_attachments: input.biography_attachments.unwrap_or_default(),
            contact_notes: input.contact_notes.unwrap_or_default(),
            contact_notes_updated_at: input.contact_notes_updated_at,
            created_at: timestamp(),
        }
    }

    /// "First Last", trimmed, or "Unknown" when both are empty
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            UNKNOWN_NAME.to_string()
        } else {
            name.to_string()
        }
    }

    /// Return a copy with the patch applied
    pub fn apply(&self, patch: ContactPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.first_name {
            next.first_name = v;
        }
        if let Some(v) = patch.last_name {
            next.last_name = v;
        }
        if let Some(v) = patch.email {
            next.email = v;
        }
        if let Some(v) = patch.phone {
            next.phone = v;
        }
        if let Some(v) = patch.company {
            next.company = v;
        }
        if let Some(v) = patch.biography {
            next.biography = v;
        }
        if let Some(v) = patch.biography_attachments {
            next.biography_attachments = v;
        }
        if let Some(v) = patch.contact_notes {
            next.contact_notes = v;
        }
        if let Some(v) = patch.contact_notes_updated_at {
            next.contact_notes_updated_at = v;
        }
        next
    }
}
