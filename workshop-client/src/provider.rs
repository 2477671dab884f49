//! Provider adapters
//!
//! The identity provider, the hosted document store and the runtime
//! environment are reached only through these traits. An adapter over a
//! concrete SDK implements them; any reliance on SDK internals (for example
//! force-terminating a client) stays inside that adapter's
//! [`DocumentStore::terminate`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ProviderError;

/// `collection/document` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Parse `collection/id`. Both segments must be non-empty.
    pub fn parse(path: &str) -> Option<Self> {
        let (collection, id) = path.trim().split_once('/')?;
        if collection.is_empty() || id.is_empty() || id.contains('/') {
            return None;
        }
        Some(Self::new(collection, id))
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Snapshot of a stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: serde_json::Value,
}

/// Sync state reported by the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// Local view is in sync with the server
    InSync,
    /// Store has pending writes or lost its stream
    Pending,
}

/// Runtime network transition (browser `online` / `offline`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Online,
    Offline,
}

/// Identity provider (credential holder + token issuer)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Uid of the signed-in user, if any
    async fn current_user(&self) -> Option<String>;

    /// Fetch an id token, forcing server-side reissuance when `force_refresh`
    async fn get_token(&self, force_refresh: bool) -> Result<String, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// Hosted document store client
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn disable_network(&self) -> Result<(), ProviderError>;

    async fn enable_network(&self) -> Result<(), ProviderError>;

    /// Terminate and recreate the underlying client.
    ///
    /// Returns `Ok(false)` when the adapter cannot do this.
    async fn terminate(&self) -> Result<bool, ProviderError> {
        Ok(false)
    }

    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>, ProviderError>;

    async fn set_document(
        &self,
        path: &DocumentPath,
        data: serde_json::Value,
    ) -> Result<(), ProviderError>;

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), ProviderError>;

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, ProviderError>;

    /// Subscribe to sync state changes
    fn subscribe_sync(&self) -> broadcast::Receiver<SyncEvent>;
}

/// Runtime network status (`navigator.onLine`)
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Local key/value storage holding cached provider artifacts
pub trait LocalStorage: Send + Sync {
    fn keys(&self) -> Vec<String>;

    fn remove(&self, key: &str);
}

/// Remove every local storage key containing one of `markers`.
///
/// Returns the number of keys removed.
pub fn clear_provider_artifacts(storage: &dyn LocalStorage, markers: &[String]) -> usize {
    let mut removed = 0;
    for key in storage.keys() {
        if markers.iter().any(|m| key.contains(m.as_str())) {
            storage.remove(&key);
            removed += 1;
        }
    }
    removed
}
