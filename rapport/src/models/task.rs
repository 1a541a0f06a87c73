use super::{empty_date_as_none, empty_string_as_none, generate_id, timestamp, Attachment};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Sort rank, most pressing first
    pub fn rank(&self) -> u8 {
        match self {
            Self::Urgent => 0,
            Self::High => 1,
            Self::Low => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Urgent => "Urgent",
            Self::High => "High Priority",
            Self::Low => "Low Priority",
        }
    }
}

/// A to-do item, optionally linked to a contact and project.
///
/// Completed tasks live in the archive collection with `archived_at` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, deserialize_with = "empty_date_as_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub project_id: Option<String>,
    #[serde(default = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskInput {
    pub title: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
    pub attachments: Option<Vec<Attachment>>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub contact_id: Option<Option<String>>,
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Priority>,
    pub attachments: Option<Vec<Attachment>>,
    pub project_id: Option<Option<String>>,
}

impl Task {
    pub fn new(contact_id: Option<String>, input: TaskInput) -> Self {
        Self {
            id: generate_id(),
            contact_id,
            title: input.title.unwrap_or_default(),
            completed: false,
            due_date: input.due_date,
            priority: input.priority.unwrap_or_default(),
            attachments: input.attachments.unwrap_or_default(),
            project_id: input.project_id,
            created_at: timestamp(),
            archived_at: None,
        }
    }

    pub fn apply(&self, patch: TaskPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.contact_id {
            next.contact_id = v;
        }
        if let Some(v) = patch.title {
            next.title = v;
        }
        if let Some(v) = patch.completed {
            next.completed = v;
        }
        if let Some(v) = patch.due_date {
            next.due_date = v;
        }
        if let Some(v) = patch.priority {
            next.priority = v;
        }
        if let Some(v) = patch.attachments {
            next.attachments = v;
        }
        if let Some(v) = patch.project_id {
            next.project_id = v;
        }
        next
    }

    /// Completed copy for the archive, stamped with the archive time
    pub fn archived(&self, at: DateTime<Utc>) -> Self {
        Self {
            completed: true,
            archived_at: Some(at),
            ..self.clone()
        }
    }

    /// Active copy of an archived task
    pub fn restored(&self) -> Self {
        Self {
            completed: false,
            archived_at: None,
            ..self.clone()
        }
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}
