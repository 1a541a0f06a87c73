//! Application configuration constants
//!
//! Central location for all configuration constants, resource limits,
//! and validation boundaries used throughout the application.

use std::path::{Path, PathBuf};
use std::time::Duration;

// ===== Collection Names =====

/// Local store key and remote collection name for contacts
pub const CONTACTS_COLLECTION: &str = "contacts";
/// Local store key and remote collection name for call notes
pub const NOTES_COLLECTION: &str = "notes";
/// Local store key and remote collection name for active tasks
pub const TASKS_COLLECTION: &str = "tasks";
/// Local store key and remote collection name for completed tasks
pub const ARCHIVED_TASKS_COLLECTION: &str = "archivedTasks";
/// Local store key and remote collection name for projects
pub const PROJECTS_COLLECTION: &str = "projects";

// ===== Attachment Limits =====

/// Maximum attachment size in bytes (10 MiB)
pub const MAX_ATTACHMENT_SIZE: u64 = 10 * 1024 * 1024;

/// MIME types accepted for file attachments
pub const ALLOWED_ATTACHMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Maximum stored file name length
pub const MAX_FILE_NAME_LENGTH: usize = 255;

// ===== Contacts Import =====

/// Google People API base URL
pub const PEOPLE_API_BASE: &str = "https://people.googleapis.com/v1";

/// Number of connections requested per import (API maximum is 1000)
pub const IMPORT_PAGE_SIZE: u32 = 500;

/// How long an imported contacts list stays fresh in the cache
pub const IMPORT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Local store key prefix for the per-user import cache
pub const IMPORT_CACHE_KEY: &str = "googleContactsCache";

// ===== Display =====

/// Placeholder when a contact has neither first nor last name
pub const UNKNOWN_NAME: &str = "Unknown";

/// Placeholder for notes and tasks without a linked contact
pub const NO_CONTACT_NAME: &str = "No Contact";

/// Palette for projects created without an explicit colour
pub const DEFAULT_PROJECT_COLORS: &[&str] = &[
    "#4a90d9", "#e91e63", "#4caf50", "#ff9800", "#9c27b0", "#00bcd4", "#795548",
];

// ===== Paths =====

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "RAPPORT_DATA_DIR";

/// Default data directory when the environment doesn't provide one
pub const DEFAULT_DATA_DIR: &str = "rapport-data";

/// Filesystem layout for a Rapport instance
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Resolve the data directory from `RAPPORT_DATA_DIR`, falling back to
    /// `./rapport-data`
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Self::new(data_dir)
    }

    /// Directory holding one JSON file per local collection
    pub fn collections_dir(&self) -> PathBuf {
        self.data_dir.join("collections")
    }

    /// Directory holding uploaded attachment files
    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
