use super::{empty_string_as_none, generate_id, timestamp, today, Attachment};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Notes from a call or meeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    /// `None` for standalone notes
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default = "today")]
    pub call_date: NaiveDate,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub project_id: Option<String>,
    #[serde(default = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoteInput {
    pub content: Option<String>,
    pub call_date: Option<NaiveDate>,
    pub attachments: Option<Vec<Attachment>>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotePatch {
    pub contact_id: Option<Option<String>>,
    pub content: Option<String>,
    pub call_date: Option<NaiveDate>,
    pub attachments: Option<Vec<Attachment>>,
    pub project_id: Option<Option<String>>,
}

impl Note {
    pub fn new(contact_id: Option<String>, input: NoteInput) -> Self {
        Self {
            id: generate_id(),
            contact_id,
            content: input.content.unwrap_or_default(),
            call_date: input.call_date.unwrap_or_else(today),
            attachments: input.attachments.unwrap_or_default(),
            project_id: input.project_id,
            created_at: timestamp(),
        }
    }

    pub fn apply(&self, patch: NotePatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.contact_id {
            next.contact_id = v;
        }
        if let Some(v) = patch.content {
            next.content = v;
        }
        if let Some(v) = patch.call_date {
            next.call_date = v;
        }
        if let Some(v) = patch.attachments {
            next.attachments = v;
        }
        if let Some(v) = patch.project_id {
            next.project_id = v;
        }
        next
    }
}
