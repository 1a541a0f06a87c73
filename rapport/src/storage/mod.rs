//! Storage module
//!
//! Local collection persistence, the remote document store interface,
//! and attachment file storage.

pub mod files;
pub mod local;
pub mod remote;

pub use files::{FileStorage, LocalFileStorage};
pub use local::{read_collection, write_collection, JsonFileStore, LocalStore, MemoryStore};
pub use remote::{ChangeCallback, MemoryRemote, RemoteStore, Subscription};
