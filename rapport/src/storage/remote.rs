//! Remote document store interface
//!
//! The cloud backend is an external collaborator. Rapport only needs a
//! per-owner document store with real-time push: documents are JSON objects
//! addressed by (owner id, collection name, document id).
//!
//! `MemoryRemote` is an in-process implementation with the same semantics,
//! used by tests and by the demo binary.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Receives the full, ordered collection on every remote change
pub type ChangeCallback = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Async document store scoped by owner and collection
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// One-shot read of a collection, newest `createdAt` first
    async fn fetch_all(&self, owner_id: &str, collection: &str) -> Result<Vec<Value>>;

    /// Push the current collection to `on_change` now and after every change.
    ///
    /// Delivery is at-least-once and may repeat identical snapshots.
    fn subscribe(&self, owner_id: &str, collection: &str, on_change: ChangeCallback)
        -> Subscription;

    /// Replace one document, stamping `updatedAt`
    async fn upsert(&self, owner_id: &str, collection: &str, id: &str, document: Value)
        -> Result<()>;

    async fn remove(&self, owner_id: &str, collection: &str, id: &str) -> Result<()>;

    /// Write many documents in one atomic call (migration only)
    async fn batch_upsert(&self, owner_id: &str, collection: &str, documents: Vec<Value>)
        -> Result<()>;

    /// Delete many documents in one atomic call
    async fn batch_remove(&self, owner_id: &str, collection: &str, ids: Vec<String>)
        -> Result<()>;
}

/// Handle for a live subscription.
///
/// Dropping the handle unsubscribes; `unsubscribe` does the same explicitly.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to release
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Order documents newest first by `createdAt`; undated documents sort last
pub fn order_by_created_desc(documents: &mut [Value]) {
    fn created_at(doc: &Value) -> Option<DateTime<Utc>> {
        doc.get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    documents.sort_by(|a, b| match (created_at(a), created_at(b)) {
        (Some(a_at), Some(b_at)) => b_at.cmp(&a_at),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

type CollectionKey = (String, String);

#[derive(Default)]
struct MemoryInner {
    documents: HashMap<CollectionKey, HashMap<String, Value>>,
    subscribers: HashMap<CollectionKey, Vec<(u64, ChangeCallback)>>,
    next_subscriber: u64,
}

/// In-process remote store with synchronous real-time push
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current documents of a collection, newest first
    pub fn documents(&self, owner_id: &str, collection: &str) -> Vec<Value> {
        let inner = self.lock();
        snapshot(&inner, &key(owner_id, collection))
    }

    /// Number of live subscriptions on a collection
    pub fn subscriber_count(&self, owner_id: &str, collection: &str) -> usize {
        self.lock()
            .subscribers
            .get(&key(owner_id, collection))
            .map_or(0, Vec::len)
    }

    /// Re-push the current snapshot to every subscriber
    pub fn redeliver(&self, owner_id: &str, collection: &str) {
        self.notify(&key(owner_id, collection));
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Deliver outside the lock so callbacks may call back into the store
    fn notify(&self, key: &CollectionKey) {
        let (documents, callbacks) = {
            let inner = self.lock();
            let callbacks: Vec<ChangeCallback> = inner
                .subscribers
                .get(key)
                .map(|subs| subs.iter().map(|(_, cb)| cb.clone()).collect())
                .unwrap_or_default();
            (snapshot(&inner, key), callbacks)
        };

        for callback in callbacks {
            callback(documents.clone());
        }
    }

    fn write(&self, key: &CollectionKey, mutate: impl FnOnce(&mut HashMap<String, Value>)) {
        {
            let mut inner = self.lock();
            mutate(inner.documents.entry(key.clone()).or_default());
        }
        self.notify(key);
    }
}

fn key(owner_id: &str, collection: &str) -> CollectionKey {
    (owner_id.to_string(), collection.to_string())
}

fn snapshot(inner: &MemoryInner, key: &CollectionKey) -> Vec<Value> {
    let mut documents: Vec<Value> = inner
        .documents
        .get(key)
        .map(|docs| docs.values().cloned().collect())
        .unwrap_or_default();
    order_by_created_desc(&mut documents);
    documents
}

/// Stamp `id` and `updatedAt` onto a document
fn stamp(id: &str, document: Value) -> Result<Value> {
    let Value::Object(mut fields) = document else {
        return Err(AppError::Remote(format!("Document {} is not an object", id)));
    };
    fields.insert("id".to_string(), Value::String(id.to_string()));
    fields.insert(
        "updatedAt".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    Ok(Value::Object(fields))
}

fn document_id(document: &Value) -> Result<String> {
    document
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Remote("Document is missing an id".to_string()))
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_all(&self, owner_id: &str, collection: &str) -> Result<Vec<Value>> {
        Ok(self.documents(owner_id, collection))
    }

    fn subscribe(
        &self,
        owner_id: &str,
        collection: &str,
        on_change: ChangeCallback,
    ) -> Subscription {
        let key = key(owner_id, collection);
        let subscriber_id = {
            let mut inner = self.lock();
            inner.next_subscriber += 1;
            let subscriber_id = inner.next_subscriber;
            inner
                .subscribers
                .entry(key.clone())
                .or_default()
                .push((subscriber_id, on_change.clone()));
            subscriber_id
        };

        tracing::debug!("Remote subscriber {} opened on {}/{}", subscriber_id, key.0, key.1);

        // Initial snapshot
        on_change(self.documents(owner_id, collection));

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut inner = inner
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if let Some(subs) = inner.subscribers.get_mut(&key) {
                    subs.retain(|(id, _)| *id != subscriber_id);
                }
            }
            tracing::debug!("Remote subscriber {} closed", subscriber_id);
        })
    }

    async fn upsert(
        &self,
        owner_id: &str,
        collection: &str,
        id: &str,
        document: Value,
    ) -> Result<()> {
        let document = stamp(id, document)?;
        self.write(&key(owner_id, collection), |docs| {
            docs.insert(id.to_string(), document);
        });
        Ok(())
    }

    async fn remove(&self, owner_id: &str, collection: &str, id: &str) -> Result<()> {
        self.write(&key(owner_id, collection), |docs| {
            docs.remove(id);
        });
        Ok(())
    }

    async fn batch_upsert(
        &self,
        owner_id: &str,
        collection: &str,
        documents: Vec<Value>,
    ) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        // Validate everything before writing anything
        let mut stamped = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document_id(&document)?;
            stamped.push((id.clone(), stamp(&id, document)?));
        }

        self.write(&key(owner_id, collection), |docs| {
            for (id, document) in stamped {
                docs.insert(id, document);
            }
        });
        Ok(())
    }

    async fn batch_remove(&self, owner_id: &str, collection: &str, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.write(&key(owner_id, collection), |docs| {
            for id in &ids {
                docs.remove(id);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, created_at: &str) -> Value {
        json!({ "id": id, "createdAt": created_at })
    }

    #[tokio::test]
    async fn test_fetch_orders_newest_first() {
        let remote = MemoryRemote::new();
        remote
            .batch_upsert(
                "u1",
                "notes",
                vec![
                    doc("old", "2024-01-01T00:00:00Z"),
                    doc("new", "2024-06-01T00:00:00Z"),
                    doc("mid", "2024-03-01T00:00:00.5Z"),
                ],
            )
            .await
            .unwrap();

        let ids: Vec<String> = remote
            .fetch_all("u1", "notes")
            .await
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap().to_string())
            .collect();

        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_upsert_stamps_updated_at() {
        let remote = MemoryRemote::new();
        remote
            .upsert("u1", "notes", "n1", doc("n1", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        let docs = remote.documents("u1", "notes");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].get("updatedAt").is_some());
    }

    #[tokio::test]
    async fn test_collections_are_scoped_by_owner() {
        let remote = MemoryRemote::new();
        remote
            .upsert("u1", "notes", "n1", doc("n1", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();

        assert!(remote.fetch_all("u2", "notes").await.unwrap().is_empty());
        assert!(remote.fetch_all("u1", "tasks").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_pushes_snapshot_and_changes() {
        let remote = MemoryRemote::new();
        let received = Arc::new(Mutex::new(Vec::<usize>::new()));

        let sink = received.clone();
        let subscription = remote.subscribe(
            "u1",
            "notes",
            Arc::new(move |docs: Vec<Value>| sink.lock().unwrap().push(docs.len())),
        );

        remote
            .upsert("u1", "notes", "n1", doc("n1", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        remote.remove("u1", "notes", "n1").await.unwrap();

        assert_eq!(*received.lock().unwrap(), vec![0, 1, 0]);

        subscription.unsubscribe();
        assert_eq!(remote.subscriber_count("u1", "notes"), 0);

        remote
            .upsert("u1", "notes", "n2", doc("n2", "2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(received.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let remote = MemoryRemote::new();
        {
            let _subscription = remote.subscribe("u1", "notes", Arc::new(|_: Vec<Value>| {}));
            assert_eq!(remote.subscriber_count("u1", "notes"), 1);
        }
        assert_eq!(remote.subscriber_count("u1", "notes"), 0);
    }

    #[tokio::test]
    async fn test_batch_upsert_rejects_documents_without_id() {
        let remote = MemoryRemote::new();
        let result = remote
            .batch_upsert(
                "u1",
                "notes",
                vec![doc("n1", "2024-01-01T00:00:00Z"), json!({ "content": "x" })],
            )
            .await;

        assert!(result.is_err());
        assert!(remote.documents("u1", "notes").is_empty());
    }

    #[tokio::test]
    async fn test_batch_remove() {
        let remote = MemoryRemote::new();
        remote
            .batch_upsert(
                "u1",
                "notes",
                vec![
                    doc("a", "2024-01-01T00:00:00Z"),
                    doc("b", "2024-01-02T00:00:00Z"),
                    doc("c", "2024-01-03T00:00:00Z"),
                ],
            )
            .await
            .unwrap();

        remote
            .batch_remove("u1", "notes", vec!["a".to_string(), "c".to_string()])
            .await
            .unwrap();

        let docs = remote.documents("u1", "notes");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], "b");
    }
}
