//! Offline-first collection sync
//!
//! A `SyncedCollection` owns one named collection and keeps it consistent
//! across the local store (guests), the remote store (signed-in users), and
//! the one-time upload of guest data on first sign-in.

pub mod collection;
pub mod diff;

pub use collection::SyncedCollection;
pub use diff::{diff, Change};

use crate::models::{Contact, Note, Project, Task};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record that can live in a synced collection.
///
/// `id` must be unique within the collection and never change; it is the
/// remote document key.
pub trait SyncItem:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn id(&self) -> &str;
}

impl SyncItem for Contact {
    fn id(&self) -> &str {
        &self.id
    }
}

impl SyncItem for Note {
    fn id(&self) -> &str {
        &self.id
    }
}

impl SyncItem for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

impl SyncItem for Project {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Where reads and writes currently go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// No identity: local store only
    Guest,
    /// Identity just appeared; migration in progress, writes buffered
    Transitioning,
    /// Identity present: remote store, pushed state is authoritative
    Synced,
}

/// Result of the first-sign-in migration for the current identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    NotAttempted,
    /// Remote was empty and this many local records were uploaded
    Uploaded(usize),
    /// Remote was empty and so was the local store
    NothingToUpload,
    /// Remote already held data; local data was left alone
    RemoteHadData,
    /// Fetch or upload failed; not retried this session
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub mode: SyncMode,
    pub migration: MigrationOutcome,
}

impl SyncStatus {
    pub fn guest() -> Self {
        Self {
            mode: SyncMode::Guest,
            migration: MigrationOutcome::NotAttempted,
        }
    }
}
