//! Session and identity
//!
//! Authentication itself happens elsewhere; this module holds the result.
//! The current identity (absent for guests) is published on a watch channel
//! so synced collections can react to sign-in and sign-out.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable owner id used to scope remote collections
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }
}

/// Current identity plus the cached third-party access token
pub struct Session {
    identity: watch::Sender<Option<Identity>>,
    third_party_token: Mutex<Option<String>>,
}

impl Session {
    /// A guest session
    pub fn new() -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            identity,
            third_party_token: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn is_guest(&self) -> bool {
        self.identity.borrow().is_none()
    }

    /// Receiver notified on every identity change
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// Record a completed sign-in, with the access token granted for
    /// contacts import if the provider issued one
    pub fn sign_in(&self, identity: Identity, third_party_token: Option<String>) {
        tracing::info!("Signed in as {}", identity.uid);
        if third_party_token.is_some() {
            *self.token() = third_party_token;
        }
        self.identity.send_replace(Some(identity));
    }

    /// Sign out, clearing any cached third-party token first
    pub fn sign_out(&self) {
        self.clear_third_party_token();
        if self.identity.send_replace(None).is_some() {
            tracing::info!("Signed out");
        }
    }

    pub fn third_party_token(&self) -> Option<String> {
        self.token().clone()
    }

    pub fn clear_third_party_token(&self) {
        self.token().take();
    }

    fn token(&self) -> MutexGuard<'_, Option<String>> {
        self.third_party_token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
