//! Entity models
//!
//! Plain-data records for everything Rapport stores. Records are replaced
//! whole by id; partial edits go through the `*Patch` types, which never
//! touch `id` or `created_at`.
//! All models use serde with camelCase field names so stored JSON matches
//! what the UI layer reads and writes.

pub mod attachment;
pub mod contact;
pub mod note;
pub mod project;
pub mod task;

pub use attachment::{Attachment, FileAttachment, LinkAttachment};
pub use contact::{Contact, ContactInput, ContactPatch};
pub use note::{Note, NoteInput, NotePatch};
pub use project::{Project, ProjectPatch};
pub use task::{Priority, Task, TaskInput, TaskPatch};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

/// Generate a globally unique record id
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current timestamp for `createdAt`-style fields
pub fn timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Today's calendar date (UTC)
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Reads an optional calendar date, treating `""` and `null` as absent.
///
/// Older stored tasks carry `dueDate: ""` rather than omitting the field.
pub(crate) fn empty_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Reads an optional id, treating `""` as absent
pub(crate) fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()))
}
