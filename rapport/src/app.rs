//! Application state and initialization
//!
//! All services are built here from an `AppConfig` and a remote store, and
//! made available through `AppState`.

use crate::config::AppConfig;
use crate::error::Result;
use crate::services::{AttachmentsService, ContactImporter, GoogleContactsSource, Workspace};
use crate::session::Session;
use crate::storage::{JsonFileStore, LocalFileStorage, LocalStore, RemoteStore};
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub session: Arc<Session>,
    pub local: Arc<dyn LocalStore>,
    pub workspace: Workspace,
    pub attachments: AttachmentsService,
    pub importer: ContactImporter,
}

impl AppState {
    /// Flush pending remote writes and detach every collection from the session
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down");
        self.workspace.flush().await;
        self.workspace.stop();
    }
}

/// Application setup - called once on startup
pub async fn setup(config: AppConfig, remote: Arc<dyn RemoteStore>) -> Result<AppState> {
    tracing::info!("Initializing application");
    tracing::info!("App data directory: {:?}", config.data_dir());

    // Create necessary directories
    std::fs::create_dir_all(config.data_dir())?;
    std::fs::create_dir_all(config.collections_dir())?;

    let store = JsonFileStore::new(config.collections_dir());
    store.initialize()?;
    let local: Arc<dyn LocalStore> = Arc::new(store);

    let files = LocalFileStorage::open(config.attachments_dir()).await?;

    let session = Arc::new(Session::new());
    let workspace = Workspace::new(local.clone(), remote);
    let attachments = AttachmentsService::new(Arc::new(files), session.clone());
    let importer = ContactImporter::new(
        Arc::new(GoogleContactsSource::new()?),
        session.clone(),
        local.clone(),
    );

    workspace.start(&session);

    tracing::info!("Application initialized successfully");

    Ok(AppState {
        config,
        session,
        local,
        workspace,
        attachments,
        importer,
    })
}
