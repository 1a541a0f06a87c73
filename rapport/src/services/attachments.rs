//! Attachments service
//!
//! Validates and stores file attachments and builds link attachments for
//! contacts, notes and tasks. Only signed-in users can attach anything;
//! content goes through `FileStorage` and the returned metadata is kept on
//! the parent record.

use crate::config::{ALLOWED_ATTACHMENT_TYPES, MAX_ATTACHMENT_SIZE, MAX_FILE_NAME_LENGTH};
use crate::error::{AttachmentError, Result};
use crate::models::{generate_id, Attachment, FileAttachment, LinkAttachment};
use crate::session::Session;
use crate::storage::FileStorage;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Kind of record an attachment belongs to; also the storage path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Notes,
    Tasks,
    Contacts,
}

impl ParentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Tasks => "tasks",
            Self::Contacts => "contacts",
        }
    }
}

impl fmt::Display for ParentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file picked for upload
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Check size and type limits for a file of `size` bytes
pub fn validate_file(size: u64, mime_type: &str) -> std::result::Result<(), AttachmentError> {
    if size > MAX_ATTACHMENT_SIZE {
        return Err(AttachmentError::FileTooLarge { size });
    }

    if !ALLOWED_ATTACHMENT_TYPES.contains(&mime_type) {
        let shown = if mime_type.is_empty() { "unknown" } else { mime_type };
        return Err(AttachmentError::InvalidType(shown.to_string()));
    }

    Ok(())
}

/// Build a link attachment. An empty title defaults to the URL.
pub fn create_link(url: &str, title: &str) -> std::result::Result<Attachment, AttachmentError> {
    Url::parse(url).map_err(|_| AttachmentError::InvalidUrl(url.to_string()))?;

    let title = title.trim();
    Ok(Attachment::Link(LinkAttachment {
        id: generate_id(),
        url: url.to_string(),
        title: if title.is_empty() { url.to_string() } else { title.to_string() },
        uploaded_at: Utc::now(),
    }))
}

/// Service for managing attachments
#[derive(Clone)]
pub struct AttachmentsService {
    storage: Arc<dyn FileStorage>,
    session: Arc<Session>,
}

impl AttachmentsService {
    pub fn new(storage: Arc<dyn FileStorage>, session: Arc<Session>) -> Self {
        Self { storage, session }
    }

    /// Validate and store a file attachment for a parent record
    pub async fn upload(
        &self,
        parent: ParentKind,
        parent_id: &str,
        file: FileUpload,
    ) -> Result<Attachment> {
        let identity = self
            .session
            .current()
            .ok_or(AttachmentError::SignInRequired)?;

        validate_file(file.size(), &file.mime_type)?;

        tracing::info!(
            "Uploading attachment: {} for {} {} (size: {} bytes)",
            file.file_name,
            parent,
            parent_id,
            file.size()
        );

        let id = generate_id();
        let storage_path = format!(
            "users/{}/attachments/{}/{}/{}_{}",
            identity.uid,
            parent,
            parent_id,
            id,
            sanitize_filename(&file.file_name)
        );

        let download_url = self
            .storage
            .put(&storage_path, &file.mime_type, &file.data)
            .await
            .map_err(|e| AttachmentError::Upload(e.to_string()))?;

        tracing::info!("Attachment uploaded: {}", id);

        Ok(Attachment::File(FileAttachment {
            id,
            file_size: file.size(),
            file_name: file.file_name,
            mime_type: file.mime_type,
            storage_path,
            download_url,
            uploaded_at: Utc::now(),
        }))
    }

    /// Build a link attachment for a signed-in user
    pub fn add_link(&self, url: &str, title: &str) -> Result<Attachment> {
        if self.session.is_guest() {
            return Err(AttachmentError::SignInRequired.into());
        }
        Ok(create_link(url, title)?)
    }

    /// Delete an attachment's stored content. Links have nothing stored.
    pub async fn delete(&self, attachment: &Attachment) -> Result<()> {
        let Some(path) = attachment.storage_path() else {
            return Ok(());
        };

        tracing::info!("Deleting attachment: {}", attachment.id());

        self.storage
            .delete(path)
            .await
            .map_err(|e| AttachmentError::Delete(e.to_string()))?;

        Ok(())
    }
}

/// Append an attachment to a list
pub fn add_to(attachments: &[Attachment], attachment: Attachment) -> Vec<Attachment> {
    let mut next = attachments.to_vec();
    next.push(attachment);
    next
}

/// Remove an attachment by id
pub fn remove_from(attachments: &[Attachment], attachment_id: &str) -> Vec<Attachment> {
    attachments
        .iter()
        .filter(|a| a.id() != attachment_id)
        .cloned()
        .collect()
}

/// Human-readable file size
pub fn format_file_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}

/// Icon identifier for a MIME type
pub fn file_icon(mime_type: &str) -> &'static str {
    if mime_type == "application/pdf" {
        "pdf"
    } else if mime_type.starts_with("image/") {
        "image"
    } else if mime_type.contains("word") {
        "word"
    } else {
        "file"
    }
}

/// Sanitize filename to prevent path traversal attacks
fn sanitize_filename(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .take(MAX_FILE_NAME_LENGTH)
        .collect();

    match safe.trim_start_matches('.') {
        "" => "file".to_string(),
        _ => safe,
    }
}
