// Rapport - offline-first personal CRM core
// Entry point: opens the local data directory and reports what it holds

use rapport::app;
use rapport::config::AppConfig;
use rapport::session::Identity;
use rapport::storage::MemoryRemote;
use rapport::sync::SyncMode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Signing in as this uid exercises the first-sign-in migration against the
/// in-process remote store
const UID_ENV: &str = "RAPPORT_UID";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rapport=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rapport");

    let state = app::setup(AppConfig::from_env(), Arc::new(MemoryRemote::new())).await?;
    let ws = &state.workspace;

    tracing::info!(
        "Loaded {} contacts, {} notes, {} tasks ({} archived), {} projects",
        ws.contacts.value().len(),
        ws.notes.value().len(),
        ws.tasks.value().len(),
        ws.archived_tasks.value().len(),
        ws.projects.value().len()
    );

    if let Ok(uid) = std::env::var(UID_ENV) {
        let mut status = ws.contacts.watch_status();
        state.session.sign_in(Identity::new(uid), None);
        status.wait_for(|s| s.mode == SyncMode::Synced).await?;
        ws.flush().await;

        tracing::info!("Contacts migration: {:?}", ws.contacts.status().migration);
        tracing::info!("Notes migration: {:?}", ws.notes.status().migration);
        tracing::info!("Tasks migration: {:?}", ws.tasks.status().migration);
    }

    state.shutdown().await;
    Ok(())
}
