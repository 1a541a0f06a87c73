//! Services module
//!
//! Application logic over the synced collections, attachment storage and
//! contacts import.

pub mod attachments;
pub mod import;
pub mod workspace;

pub use attachments::{AttachmentsService, FileUpload, ParentKind};
pub use import::{ContactImporter, ContactSource, GoogleContactsSource, ImportedContact};
pub use workspace::Workspace;
