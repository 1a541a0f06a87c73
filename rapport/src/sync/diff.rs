//! Id-keyed set difference between two collection snapshots

use super::SyncItem;
use std::collections::{HashMap, HashSet};

/// One remote write needed to move from one snapshot to the next
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Upsert(T),
    Remove(String),
}

impl<T: SyncItem> Change<T> {
    pub fn id(&self) -> &str {
        match self {
            Self::Upsert(item) => item.id(),
            Self::Remove(id) => id,
        }
    }
}

/// Changes turning `previous` into `next`.
///
/// New or value-changed ids yield one `Upsert`, ids missing from `next`
/// yield one `Remove`, unchanged ids yield nothing. If `next` repeats an id,
/// only its first occurrence counts.
pub fn diff<T: SyncItem>(previous: &[T], next: &[T]) -> Vec<Change<T>> {
    let before: HashMap<&str, &T> = previous.iter().map(|item| (item.id(), item)).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(next.len());
    let mut changes = Vec::new();

    for item in next {
        if !seen.insert(item.id()) {
            continue;
        }
        if before.get(item.id()) != Some(&item) {
            changes.push(Change::Upsert(item.clone()));
        }
    }

    let mut removed: HashSet<&str> = HashSet::new();
    for item in previous {
        if !seen.contains(item.id()) && removed.insert(item.id()) {
            changes.push(Change::Remove(item.id().to_string()));
        }
    }

    changes
}

/// Fold `change` into a pending buffer, keeping only the latest per id
pub fn coalesce<T: SyncItem>(pending: &mut Vec<Change<T>>, change: Change<T>) {
    pending.retain(|existing| existing.id() != change.id());
    pending.push(change);
}
