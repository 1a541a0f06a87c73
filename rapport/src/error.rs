//! Error types for Rapport
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to the UI layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Local store error: {0}")]
    Storage(String),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("{0}")]
    Generic(String),
}

/// Attachment failures. These are user-actionable and block only the
/// action that raised them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("File size exceeds 10 MB limit. File is {:.2} MB", as_mib(.size))]
    FileTooLarge { size: u64 },

    #[error("File type \"{0}\" is not supported. Allowed: PDF, Word, JPEG, PNG, GIF, WebP")]
    InvalidType(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("Sign in to add attachments")]
    SignInRequired,

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Failed to delete attachment: {0}")]
    Delete(String),
}

fn as_mib(bytes: &u64) -> f64 {
    *bytes as f64 / 1024.0 / 1024.0
}

impl AttachmentError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileTooLarge { .. } => "file-too-large",
            Self::InvalidType(_) => "invalid-type",
            Self::InvalidUrl(_) => "invalid-url",
            Self::SignInRequired => "sign-in-required",
            Self::Upload(_) => "upload-failed",
            Self::Delete(_) => "delete-failed",
        }
    }
}

/// Third-party contacts import failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("Google session expired. Please sign in again to use contacts import.")]
    SessionExpired,

    #[error("Contacts permission was denied. Please grant access to import contacts.")]
    PermissionDenied,

    #[error("Contacts API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Contacts import is not available without a signed-in account and token")]
    NotAvailable,
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
