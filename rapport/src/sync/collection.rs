//! Synced collection core
//!
//! State machine:
//!
//! - `Guest`: no identity. Reads and writes use the local store only.
//! - `Transitioning`: an identity just appeared. The first time per identity
//!   and session the remote collection is fetched once; if it is empty the
//!   local data is batch-uploaded. Writes made meanwhile are buffered and
//!   replayed once `Synced` is reached.
//! - `Synced`: one remote subscription is open and every push replaces the
//!   published value. Writes publish immediately and send one remote call
//!   per changed id; the local store is not touched.
//!
//! Every identity transition bumps an epoch. Subscription callbacks and
//! in-flight transitions carry the epoch they started under and do nothing
//! once it is stale.
//!
//! The state mutex is never held across an `.await` or while calling into
//! the remote store.

use super::diff::{coalesce, diff, Change};
use super::{MigrationOutcome, SyncItem, SyncMode, SyncStatus};
use crate::error::Result;
use crate::session::{Identity, Session};
use crate::storage::local::{read_collection, write_collection, LocalStore};
use crate::storage::remote::{ChangeCallback, RemoteStore, Subscription};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

struct State<T> {
    value: Arc<Vec<T>>,
    mode: SyncMode,
    /// Last identity seen; `None` while a guest
    identity: Option<Identity>,
    /// Identities whose migration was already attempted this session
    migrated_for: HashSet<String>,
    migration: MigrationOutcome,
    subscription: Option<Subscription>,
    epoch: u64,
    /// Writes accepted while `Transitioning`
    buffered: Vec<Change<T>>,
    transition: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
}

struct Inner<T> {
    name: String,
    default: Vec<T>,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    state: Mutex<State<T>>,
    value_tx: watch::Sender<Arc<Vec<T>>>,
    status_tx: watch::Sender<SyncStatus>,
    /// Remote writes and identity transitions in flight
    tasks: TaskTracker,
    /// Serializes `flush` so one caller's `reopen` can't strand another
    flushing: tokio::sync::Mutex<()>,
}

/// One named collection kept in sync between local and remote storage.
///
/// Cloning is cheap and every clone shares the same state.
pub struct SyncedCollection<T: SyncItem> {
    inner: Arc<Inner<T>>,
}

impl<T: SyncItem> Clone for SyncedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: SyncItem> SyncedCollection<T> {
    /// Open a collection in guest mode, initialized from the local store
    /// (or `default` when nothing usable is stored)
    pub fn new(
        name: impl Into<String>,
        default: Vec<T>,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> Self {
        let name = name.into();
        let value = Arc::new(read_collection(local.as_ref(), &name, default.clone()));
        let (value_tx, _) = watch::channel(value.clone());
        let (status_tx, _) = watch::channel(SyncStatus::guest());

        tracing::info!("Opened collection {} with {} local records", name, value.len());

        let state = State {
            value,
            mode: SyncMode::Guest,
            identity: None,
            migrated_for: HashSet::new(),
            migration: MigrationOutcome::NotAttempted,
            subscription: None,
            epoch: 0,
            buffered: Vec::new(),
            transition: None,
            watcher: None,
        };

        Self {
            inner: Arc::new(Inner {
                name,
                default,
                local,
                remote,
                state: Mutex::new(state),
                value_tx,
                status_tx,
                tasks: TaskTracker::new(),
                flushing: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Copy of the current published value
    pub fn value(&self) -> Vec<T> {
        self.inner.lock().value.as_ref().clone()
    }

    /// Shared handle to the current published value
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.inner.lock().value.clone()
    }

    /// Receiver notified whenever the published value changes
    pub fn watch(&self) -> watch::Receiver<Arc<Vec<T>>> {
        self.inner.value_tx.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status_tx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn mode(&self) -> SyncMode {
        self.inner.lock().mode
    }

    /// Replace the whole collection
    pub fn set(&self, next: Vec<T>) {
        self.update(move |_| next);
    }

    /// Compute the next collection from the current one and publish it.
    ///
    /// The updater runs under the collection lock and must not call back
    /// into this collection. In `Synced` mode the remote calls are spawned on
    /// the tokio runtime; failures are logged and never rolled back.
    pub fn update<F>(&self, updater: F)
    where
        F: FnOnce(&[T]) -> Vec<T>,
    {
        let inner = &self.inner;
        let mut state = inner.lock();

        let next = Arc::new(updater(state.value.as_slice()));
        let changes = diff(state.value.as_slice(), next.as_slice());
        state.value = next.clone();
        inner.value_tx.send_replace(next.clone());

        match state.mode {
            SyncMode::Guest => {
                write_collection(inner.local.as_ref(), &inner.name, next.as_slice());
            }
            SyncMode::Transitioning => {
                if !changes.is_empty() {
                    tracing::debug!(
                        "Buffering {} change(s) to {} until sync is ready",
                        changes.len(),
                        inner.name
                    );
                }
                for change in changes {
                    coalesce(&mut state.buffered, change);
                }
            }
            SyncMode::Synced => {
                let Some(owner) = state.identity.as_ref().map(|i| i.uid.clone()) else {
                    return;
                };
                for change in changes {
                    inner.spawn_write(&owner, change);
                }
            }
        }
    }

    /// React to an identity change and wait for the resulting transition.
    ///
    /// Re-applying the identity already in effect does nothing.
    pub async fn apply_identity(&self, identity: Option<Identity>) {
        if let Some((identity, epoch)) = self.begin_transition(identity) {
            self.run_transition(identity, epoch).await;
        }
    }

    /// Follow `session`: apply its current identity and every later change
    pub fn start(&self, session: &Session) {
        let mut rx = session.watch();
        let current = rx.borrow_and_update().clone();
        let weak = Arc::downgrade(&self.inner);

        let watcher = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let identity = rx.borrow_and_update().clone();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SyncedCollection { inner }.spawn_transition(identity);
            }
        });

        if let Some(previous) = self.inner.lock().watcher.replace(watcher) {
            previous.abort();
        }

        self.spawn_transition(current);
    }

    /// Stop following the session and close the remote subscription.
    ///
    /// The collection drops back to its guest value; migration memory is
    /// kept so a later `start` with the same identity won't upload again.
    pub fn stop(&self) {
        let (subscription, transition, watcher) = {
            let mut state = self.inner.lock();
            if state.mode != SyncMode::Guest {
                self.inner.enter_guest(&mut state);
            }
            self.inner.publish_status(&state);
            (
                state.subscription.take(),
                state.transition.take(),
                state.watcher.take(),
            )
        };

        if let Some(task) = transition {
            task.abort();
        }
        if let Some(task) = watcher {
            task.abort();
        }
        drop(subscription);

        tracing::info!("Stopped collection {}", self.inner.name);
    }

    /// Wait for in-flight remote writes and identity transitions
    pub async fn flush(&self) {
        let _flushing = self.inner.flushing.lock().await;
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }

    fn spawn_transition(&self, identity: Option<Identity>) {
        let Some((identity, epoch)) = self.begin_transition(identity) else {
            return;
        };

        let this = self.clone();
        let handle = self
            .inner
            .tasks
            .spawn(async move { this.run_transition(identity, epoch).await });

        let mut state = self.inner.lock();
        if state.epoch == epoch {
            state.transition = Some(handle);
        }
    }

    /// Synchronous half of an identity change: tear down whatever belonged to
    /// the previous identity. Returns the identity and epoch to continue
    /// with when a sign-in needs the async half.
    fn begin_transition(&self, identity: Option<Identity>) -> Option<(Identity, u64)> {
        let inner = &self.inner;
        let mut state = inner.lock();

        let next = match identity {
            None => {
                if state.identity.is_none() && state.mode == SyncMode::Guest {
                    return None;
                }
                inner.enter_guest(&mut state);
                state.migrated_for.clear();
                state.migration = MigrationOutcome::NotAttempted;
                tracing::info!("Signed out: {} back on local storage", inner.name);
                None
            }
            Some(identity) => {
                let same = state
                    .identity
                    .as_ref()
                    .is_some_and(|current| current.uid == identity.uid);
                if same {
                    return None;
                }

                state.epoch += 1;
                state.identity = Some(identity.clone());
                state.mode = SyncMode::Transitioning;
                state.buffered.clear();
                tracing::info!("Identity changed: {} transitioning for {}", inner.name, identity.uid);
                Some((identity, state.epoch))
            }
        };

        inner.publish_status(&state);
        let subscription = state.subscription.take();
        let transition = state.transition.take();
        drop(state);

        if let Some(task) = transition {
            task.abort();
        }
        drop(subscription);

        next
    }

    /// Async half of a sign-in: migrate, replay buffered writes, subscribe
    async fn run_transition(&self, identity: Identity, epoch: u64) {
        let inner = &self.inner;
        let uid = identity.uid.as_str();

        let first_attempt = {
            let mut state = inner.lock();
            if state.epoch != epoch {
                return;
            }
            state.migrated_for.insert(uid.to_string())
        };

        if first_attempt {
            let outcome = self.migrate(uid, epoch).await;
            let mut state = inner.lock();
            if state.epoch != epoch {
                return;
            }
            state.migration = outcome;
        }

        let pending = {
            let mut state = inner.lock();
            if state.epoch != epoch {
                return;
            }
            state.mode = SyncMode::Synced;
            inner.publish_status(&state);
            std::mem::take(&mut state.buffered)
        };

        if !pending.is_empty() {
            tracing::info!(
                "Replaying {} buffered change(s) to {}",
                pending.len(),
                inner.name
            );
        }
        for change in pending {
            write_change(inner.remote.as_ref(), uid, &inner.name, change).await;
        }

        let subscription = inner
            .remote
            .subscribe(uid, &inner.name, self.subscription_callback(epoch));

        let stale = {
            let mut state = inner.lock();
            if state.epoch == epoch && state.mode == SyncMode::Synced {
                state.subscription.replace(subscription)
            } else {
                Some(subscription)
            }
        };
        drop(stale);

        tracing::info!("Collection {} synced for {}", inner.name, uid);
    }

    /// One-time upload of guest data for `uid`
    async fn migrate(&self, uid: &str, epoch: u64) -> MigrationOutcome {
        let inner = &self.inner;

        let existing = match inner.remote.fetch_all(uid, &inner.name).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::error!("Migration error for {}: {}", inner.name, e);
                return MigrationOutcome::Failed(e.to_string());
            }
        };

        if !existing.is_empty() {
            tracing::info!(
                "Remote {} already holds {} records; skipping upload",
                inner.name,
                existing.len()
            );
            return MigrationOutcome::RemoteHadData;
        }

        if !inner.is_current(epoch) {
            return MigrationOutcome::NotAttempted;
        }

        let local: Vec<T> = read_collection(inner.local.as_ref(), &inner.name, Vec::new());
        if local.is_empty() {
            return MigrationOutcome::NothingToUpload;
        }

        let documents = match to_documents(&local) {
            Ok(documents) => documents,
            Err(e) => {
                tracing::error!("Migration error for {}: {}", inner.name, e);
                return MigrationOutcome::Failed(e.to_string());
            }
        };

        match inner.remote.batch_upsert(uid, &inner.name, documents).await {
            Ok(()) => {
                tracing::info!("Uploaded {} local {} records", local.len(), inner.name);
                MigrationOutcome::Uploaded(local.len())
            }
            Err(e) => {
                tracing::error!("Migration upload failed for {}: {}", inner.name, e);
                MigrationOutcome::Failed(e.to_string())
            }
        }
    }

    fn subscription_callback(&self, epoch: u64) -> ChangeCallback {
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |documents: Vec<Value>| {
            if let Some(inner) = inner.upgrade() {
                inner.apply_remote(epoch, documents);
            }
        })
    }
}

impl<T: SyncItem> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }

    fn publish_status(&self, state: &State<T>) {
        self.status_tx.send_replace(SyncStatus {
            mode: state.mode,
            migration: state.migration.clone(),
        });
    }

    /// Switch to guest mode and republish the guest-domain local value
    fn enter_guest(&self, state: &mut State<T>) {
        state.epoch += 1;
        state.identity = None;
        state.mode = SyncMode::Guest;
        state.buffered.clear();

        let guest = Arc::new(read_collection(
            self.local.as_ref(),
            &self.name,
            self.default.clone(),
        ));
        state.value = guest.clone();
        self.value_tx.send_replace(guest);
    }

    /// Replace the published value with a remote push
    fn apply_remote(&self, epoch: u64, documents: Vec<Value>) {
        let items = from_documents::<T>(&self.name, documents);

        let mut state = self.lock();
        if state.epoch != epoch || state.mode != SyncMode::Synced {
            tracing::debug!("Ignoring stale push for {}", self.name);
            return;
        }
        if *state.value == items {
            return;
        }

        let next = Arc::new(items);
        state.value = next.clone();
        self.value_tx.send_replace(next);
    }

    fn spawn_write(&self, owner: &str, change: Change<T>) {
        let remote = self.remote.clone();
        let owner = owner.to_string();
        let name = self.name.clone();
        self.tasks.spawn(async move {
            write_change(remote.as_ref(), &owner, &name, change).await;
        });
    }
}

/// Send one change to the remote store, logging failures
async fn write_change<T: SyncItem>(
    remote: &dyn RemoteStore,
    owner: &str,
    collection: &str,
    change: Change<T>,
) {
    match change {
        Change::Upsert(item) => {
            let id = item.id().to_string();
            let document = match serde_json::to_value(&item) {
                Ok(document) => document,
                Err(e) => {
                    tracing::error!("Failed to encode {} {}: {}", collection, id, e);
                    return;
                }
            };
            match remote.upsert(owner, collection, &id, document).await {
                Ok(()) => tracing::debug!("Saved {} {} to remote", collection, id),
                Err(e) => tracing::error!("Failed to save {} {} to remote: {}", collection, id, e),
            }
        }
        Change::Remove(id) => match remote.remove(owner, collection, &id).await {
            Ok(()) => tracing::debug!("Deleted {} {} from remote", collection, id),
            Err(e) => tracing::error!("Failed to delete {} {} from remote: {}", collection, id, e),
        },
    }
}

fn to_documents<T: SyncItem>(items: &[T]) -> Result<Vec<Value>> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(Into::into))
        .collect()
}

/// Decode pushed documents, skipping any that don't fit `T`
fn from_documents<T: SyncItem>(collection: &str, documents: Vec<Value>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|document| match serde_json::from_value::<T>(document) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping malformed {} document: {}", collection, e);
                None
            }
        })
        .collect()
}
