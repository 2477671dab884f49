//! In-memory provider fakes
//!
//! Scriptable implementations of the provider traits for tests and demos.
//! Every store call is recorded with the (tokio) instant it happened so
//! tests can assert on ordering and settle delays.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::ProviderError;
use crate::provider::{
    Document, DocumentPath, DocumentStore, IdentityProvider, LocalStorage, NetworkStatus,
    SyncEvent,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Token long enough to pass the default length check
pub const VALID_TOKEN: &str = "eyJhbGciOiJSUzI1NiJ9.eyJzdWIiOiJ1c2VyLTEiLCJleHAiOjE3MDAwMDAwMDB9";

// ============================================================================
// Identity
// ============================================================================

/// Scriptable identity provider
#[derive(Debug)]
pub struct MockIdentity {
    user: Mutex<Option<String>>,
    token: Mutex<String>,
    token_delay: Mutex<Option<Duration>>,
    failures: Mutex<VecDeque<ProviderError>>,
    token_calls: AtomicUsize,
    forced_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl MockIdentity {
    /// Provider with `user` signed in and a valid token
    pub fn signed_in(user: &str) -> Self {
        Self {
            user: Mutex::new(Some(user.to_string())),
            token: Mutex::new(VALID_TOKEN.to_string()),
            token_delay: Mutex::new(None),
            failures: Mutex::new(VecDeque::new()),
            token_calls: AtomicUsize::new(0),
            forced_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    pub fn signed_out() -> Self {
        let identity = Self::signed_in("");
        *lock(&identity.user) = None;
        identity
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *lock(&self.token) = token.into();
    }

    /// Delay every token call by `delay`
    pub fn set_token_delay(&self, delay: Option<Duration>) {
        *lock(&self.token_delay) = delay;
    }

    /// Fail the next token call with `err`
    pub fn fail_next(&self, err: ProviderError) {
        lock(&self.failures).push_back(err);
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn forced_calls(&self) -> usize {
        self.forced_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn current_user(&self) -> Option<String> {
        lock(&self.user).clone()
    }

    async fn get_token(&self, force_refresh: bool) -> Result<String, ProviderError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if force_refresh {
            self.forced_calls.fetch_add(1, Ordering::SeqCst);
        }
        let delay = *lock(&self.token_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }
        Ok(lock(&self.token).clone())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.user) = None;
        Ok(())
    }
}

// ============================================================================
// Document store
// ============================================================================

/// Call recorded by [`MockStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Disable,
    Enable,
    Terminate,
    Get(DocumentPath),
    Set(DocumentPath),
    Delete(DocumentPath),
    List(String),
}

/// Scriptable document store
#[derive(Debug)]
pub struct MockStore {
    documents: Mutex<HashMap<DocumentPath, serde_json::Value>>,
    calls: Mutex<Vec<(Instant, StoreCall)>>,
    data_failures: Mutex<VecDeque<ProviderError>>,
    enable_failures: Mutex<VecDeque<ProviderError>>,
    network_enabled: AtomicBool,
    supports_terminate: AtomicBool,
    sync_tx: broadcast::Sender<SyncEvent>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        let (sync_tx, _) = broadcast::channel(64);
        Self {
            documents: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            data_failures: Mutex::new(VecDeque::new()),
            enable_failures: Mutex::new(VecDeque::new()),
            network_enabled: AtomicBool::new(true),
            supports_terminate: AtomicBool::new(false),
            sync_tx,
        }
    }

    pub fn insert(&self, path: DocumentPath, data: serde_json::Value) {
        lock(&self.documents).insert(path, data);
    }

    pub fn document(&self, path: &DocumentPath) -> Option<serde_json::Value> {
        lock(&self.documents).get(path).cloned()
    }

    /// Fail the next `times` data calls (get/set/delete/list) with `err`
    pub fn fail_next_data_calls(&self, err: ProviderError, times: usize) {
        let mut failures = lock(&self.data_failures);
        for _ in 0..times {
            failures.push_back(err.clone());
        }
    }

    pub fn fail_next_enable(&self, err: ProviderError) {
        lock(&self.enable_failures).push_back(err);
    }

    pub fn set_supports_terminate(&self, supported: bool) {
        self.supports_terminate.store(supported, Ordering::SeqCst);
    }

    pub fn is_network_enabled(&self) -> bool {
        self.network_enabled.load(Ordering::SeqCst)
    }

    /// Emit a sync state change to subscribers
    pub fn emit_sync(&self, event: SyncEvent) {
        let _ = self.sync_tx.send(event);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, StoreCall)> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, call: &StoreCall) -> usize {
        lock(&self.calls).iter().filter(|(_, c)| c == call).count()
    }

    fn record(&self, call: StoreCall) {
        lock(&self.calls).push((Instant::now(), call));
    }

    fn next_data_failure(&self) -> Result<(), ProviderError> {
        match lock(&self.data_failures).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn disable_network(&self) -> Result<(), ProviderError> {
        self.record(StoreCall::Disable);
        self.network_enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn enable_network(&self) -> Result<(), ProviderError> {
        self.record(StoreCall::Enable);
        if let Some(err) = lock(&self.enable_failures).pop_front() {
            return Err(err);
        }
        self.network_enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn terminate(&self) -> Result<bool, ProviderError> {
        self.record(StoreCall::Terminate);
        Ok(self.supports_terminate.load(Ordering::SeqCst))
    }

    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Document>, ProviderError> {
        self.record(StoreCall::Get(path.clone()));
        self.next_data_failure()?;
        Ok(self.document(path).map(|data| Document {
            id: path.id.clone(),
            data,
        }))
    }

    async fn set_document(
        &self,
        path: &DocumentPath,
        data: serde_json::Value,
    ) -> Result<(), ProviderError> {
        self.record(StoreCall::Set(path.clone()));
        self.next_data_failure()?;
        self.insert(path.clone(), data);
        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), ProviderError> {
        self.record(StoreCall::Delete(path.clone()));
        self.next_data_failure()?;
        lock(&self.documents).remove(path);
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, ProviderError> {
        self.record(StoreCall::List(collection.to_string()));
        self.next_data_failure()?;
        let mut docs: Vec<Document> = lock(&self.documents)
            .iter()
            .filter(|(path, _)| path.collection == collection)
            .map(|(path, data)| Document {
                id: path.id.clone(),
                data: data.clone(),
            })
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    fn subscribe_sync(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync_tx.subscribe()
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Toggleable network status
#[derive(Debug)]
pub struct MockNetwork {
    online: AtomicBool,
}

impl MockNetwork {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl NetworkStatus for MockNetwork {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// In-memory local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = keys
            .into_iter()
            .map(|k| (k.into(), String::new()))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl LocalStorage for MemoryStorage {
    fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    fn remove(&self, key: &str) {
        lock(&self.entries).remove(key);
    }
}
