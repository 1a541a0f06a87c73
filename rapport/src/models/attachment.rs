use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file or link attached to a contact biography, note, or task.
///
/// The `type` field discriminates the variant in stored JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Attachment {
    File(FileAttachment),
    Link(LinkAttachment),
}

/// Uploaded file metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub id: String,
    pub file_name: String,
    /// Size in bytes
    pub file_size: u64,
    pub mime_type: String,
    /// Path inside the file storage, used for deletion
    pub storage_path: String,
    pub download_url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// External link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAttachment {
    pub id: String,
    pub url: String,
    pub title: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Attachment {
    pub fn id(&self) -> &str {
        match self {
            Self::File(file) => &file.id,
            Self::Link(link) => &link.id,
        }
    }

    /// Storage path for file attachments; links have none
    pub fn storage_path(&self) -> Option<&str> {
        match self {
            Self::File(file) if !file.storage_path.is_empty() => Some(&file.storage_path),
            _ => None,
        }
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        match self {
            Self::File(file) => file.uploaded_at,
            Self::Link(link) => link.uploaded_at,
        }
    }
}
