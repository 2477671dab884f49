//! Connection supervisor
//!
//! Owns the connection state, the reset machinery and the process-wide
//! listeners for one store client. Create one at application startup,
//! [`start`](ConnectionSupervisor::start) it with the runtime's network
//! events and [`shutdown`](ConnectionSupervisor::shutdown) it on exit.
//!
//! # Example
//!
//! ```ignore
//! use workshop_client::{ConnectionSupervisor, ResilienceConfig};
//!
//! let supervisor = ConnectionSupervisor::builder()
//!     .identity(identity)
//!     .store(store)
//!     .network(network_status)
//!     .local_storage(storage)
//!     .config(ResilienceConfig::from_env())
//!     .build()?;
//!
//! supervisor.start(network_events)?;
//! let doc = supervisor
//!     .execute(|| async { Ok(store.get_document(&path).await?) })
//!     .await?;
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};

use shared::Record;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ResilienceConfig;
use crate::connectivity::ConnectivityProbe;
use crate::credential::CredentialRefresher;
use crate::error::{AuthError, ClientError, ClientResult};
use crate::health::HealthStatus;
use crate::listener;
use crate::provider::{DocumentStore, IdentityProvider, LocalStorage, NetworkEvent, NetworkStatus};
use crate::repository::{Repository, WorkshopRepository};
use crate::reset::{ConnectionResetter, RecoveryOutcome, ResetOutcome};
use crate::retry::with_retry;
use crate::state::{ConnectionState, ConnectionStateCell};

/// Components shared between the supervisor handle and its listener task
pub(crate) struct SupervisorCore {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) credentials: CredentialRefresher,
    pub(crate) probe: ConnectivityProbe,
    pub(crate) resetter: ConnectionResetter,
    pub(crate) state: ConnectionStateCell,
    pub(crate) config: ResilienceConfig,
}

struct ListenerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Connection supervisor handle. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    core: Arc<SupervisorCore>,
    listener: Arc<Mutex<Option<ListenerHandle>>>,
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.core.state.get())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl ConnectionSupervisor {
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::default()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Install the network and sync listeners.
    ///
    /// Listeners stay installed until [`shutdown`](Self::shutdown); calling
    /// `start` twice fails with [`ClientError::AlreadyStarted`].
    pub fn start(&self, network_events: broadcast::Receiver<NetworkEvent>) -> ClientResult<()> {
        let mut guard = self.listener.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return Err(ClientError::AlreadyStarted);
        }

        let cancel = CancellationToken::new();
        let sync_events = self.core.store.subscribe_sync();
        let task = tokio::spawn(listener::run(
            Arc::clone(&self.core),
            network_events,
            sync_events,
            cancel.clone(),
        ));

        *guard = Some(ListenerHandle { cancel, task });
        tracing::info!("Connection supervisor started");
        Ok(())
    }

    /// Remove the listeners and return the state to `Inactive`.
    ///
    /// A reset already running in the background completes on its own.
    pub async fn shutdown(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(e) = handle.task.await {
                tracing::warn!(error = %e, "Listener task ended abnormally");
            }
            tracing::info!("Connection supervisor stopped");
        }
        self.core.state.reset();
    }

    pub fn is_started(&self) -> bool {
        self.listener
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn state(&self) -> ConnectionState {
        self.core.state.get()
    }

    /// Subscribe to connection state changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.core.state.subscribe()
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.core.config
    }

    /// Shared store handle, for repositories
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.core.store)
    }

    /// Repository over the supervised store using the configured retry policy
    pub fn repository<T: Record>(&self) -> Repository<T> {
        Repository::new(self.store(), self.core.config.retry.clone())
    }

    pub fn workshops(&self) -> WorkshopRepository {
        WorkshopRepository::new(self.store(), self.core.config.retry.clone())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    pub async fn refresh_credential(&self, force: bool) -> ClientResult<String> {
        self.core.credentials.refresh_credential(force).await
    }

    pub fn is_online(&self) -> bool {
        self.core.probe.is_online()
    }

    pub async fn try_enable_network(&self) -> ClientResult<bool> {
        self.core
            .probe
            .try_enable_network(self.core.store.as_ref())
            .await
    }

    pub async fn reset_connection(&self) -> ClientResult<ResetOutcome> {
        self.core.resetter.reset_connection().await
    }

    pub async fn verify_connection(&self) -> HealthStatus {
        self.core.resetter.health().verify_connection().await
    }

    /// Read the sentinel and, if the channel looks transiently broken,
    /// recover it. Returns the final health status.
    pub async fn check_connection(&self) -> ClientResult<HealthStatus> {
        let status = self.verify_connection().await;
        if !status.is_transient_failure() {
            return Ok(status);
        }

        tracing::info!("Health check failed, resetting store connection");
        match self.recover().await? {
            RecoveryOutcome::Verified(status) => Ok(status),
            RecoveryOutcome::Skipped => Ok(status),
        }
    }

    /// Reset, verify and escalate once; drives the connection state
    pub async fn recover(&self) -> ClientResult<RecoveryOutcome> {
        self.core.resetter.recover().await
    }

    /// Run a remote read/write with the full recovery pipeline.
    ///
    /// The operation goes through the retry wrapper first. If it still
    /// fails, the error decides the next step:
    ///
    /// - auth: force a credential refresh, then one more retried run
    /// - terminal auth: sign out (if configured) and return the error
    /// - connectivity: reset and verify; if healthy, one more retried run
    /// - anything else: returned as is
    ///
    /// When recovery does not fix the problem the original error is returned.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let policy = &self.core.config.retry;
        let err = match with_retry(policy, &mut op).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if matches!(err, ClientError::Auth(AuthError::Terminal(_))) {
            self.sign_out_if_configured().await;
            return Err(err);
        }

        if matches!(err, ClientError::Auth(_)) {
            return match self.core.credentials.refresh_credential(true).await {
                Ok(_) => {
                    tracing::info!("Credential refreshed, retrying operation");
                    with_retry(policy, &mut op).await
                }
                Err(refresh_err) => {
                    tracing::warn!(error = %refresh_err, "Credential refresh failed");
                    if matches!(refresh_err, ClientError::Auth(AuthError::Terminal(_))) {
                        self.sign_out_if_configured().await;
                    }
                    Err(err)
                }
            };
        }

        if !err.is_connectivity() {
            return Err(err);
        }

        match self.recover().await {
            Ok(RecoveryOutcome::Verified(HealthStatus::Healthy)) => {
                tracing::info!("Connection recovered, retrying operation");
                with_retry(policy, &mut op).await
            }
            Ok(outcome) => {
                tracing::warn!(?outcome, "Connection not recovered");
                Err(err)
            }
            Err(reset_err) => {
                tracing::warn!(error = %reset_err, "Connection recovery failed");
                Err(err)
            }
        }
    }

    async fn sign_out_if_configured(&self) {
        if !self.core.config.sign_out_on_terminal_auth {
            return;
        }
        if let Err(e) = self.core.credentials.sign_out().await {
            tracing::warn!(error = %e, "Sign out failed");
        }
    }
}

/// Builder for [`ConnectionSupervisor`]
#[derive(Default)]
pub struct SupervisorBuilder {
    identity: Option<Arc<dyn IdentityProvider>>,
    store: Option<Arc<dyn DocumentStore>>,
    network: Option<Arc<dyn NetworkStatus>>,
    storage: Option<Arc<dyn LocalStorage>>,
    config: Option<ResilienceConfig>,
}

impl SupervisorBuilder {
    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn network(mut self, network: Arc<dyn NetworkStatus>) -> Self {
        self.network = Some(network);
        self
    }

    /// Local storage cleared during escalation (optional)
    pub fn local_storage(mut self, storage: Arc<dyn LocalStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(mut self, config: ResilienceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the supervisor
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if identity, store or network is missing.
    pub fn build(self) -> ClientResult<ConnectionSupervisor> {
        let identity = self
            .identity
            .ok_or_else(|| ClientError::Config("identity provider is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| ClientError::Config("document store is required".into()))?;
        let network = self
            .network
            .ok_or_else(|| ClientError::Config("network status is required".into()))?;
        let config = self.config.unwrap_or_default();

        let state = ConnectionStateCell::new();
        let credentials = CredentialRefresher::new(identity, &config);
        let resetter = ConnectionResetter::new(
            Arc::clone(&store),
            credentials.clone(),
            self.storage,
            state.clone(),
            &config,
        );

        Ok(ConnectionSupervisor {
            core: Arc::new(SupervisorCore {
                store,
                credentials,
                probe: ConnectivityProbe::new(network),
                resetter,
                state,
                config,
            }),
            listener: Arc::new(Mutex::new(None)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::mock::{MockIdentity, MockNetwork, MockStore, StoreCall};
    use crate::provider::DocumentPath;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn supervisor(identity: Arc<MockIdentity>, store: Arc<MockStore>) -> ConnectionSupervisor {
        ConnectionSupervisor::builder()
            .identity(identity)
            .store(store)
            .network(Arc::new(MockNetwork::new(true)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_store() {
        let err = ConnectionSupervisor::builder()
            .identity(Arc::new(MockIdentity::signed_in("u")))
            .network(Arc::new(MockNetwork::new(true)))
            .build()
            .unwrap_err();
        assert_eq!(err, ClientError::Config("document store is required".into()));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let store = Arc::new(MockStore::new());
        let sup = supervisor(Arc::new(MockIdentity::signed_in("u")), store);
        let (tx, _) = broadcast::channel(8);

        sup.start(tx.subscribe()).unwrap();
        assert!(sup.is_started());
        assert_eq!(sup.start(tx.subscribe()), Err(ClientError::AlreadyStarted));

        sup.shutdown().await;
        assert!(!sup.is_started());
        sup.start(tx.subscribe()).unwrap();
        sup.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_recovers_from_connectivity_failure() {
        let store = Arc::new(MockStore::new());
        let path = DocumentPath::new("workshops", "w1");
        store.insert(path.clone(), serde_json::json!({ "title": "Rust" }));
        // 3 failed attempts, then the sentinel read and retried reads succeed
        store.fail_next_data_calls(ProviderError::new("unavailable", "down"), 3);

        let sup = supervisor(Arc::new(MockIdentity::signed_in("u")), store.clone());
        let s = store.clone();
        let p = path.clone();
        let doc = sup
            .execute(move || {
                let s = s.clone();
                let p = p.clone();
                async move { s.get_document(&p).await.map_err(ClientError::from) }
            })
            .await
            .unwrap();

        assert!(doc.is_some());
        assert_eq!(store.count(&StoreCall::Disable), 1);
        assert_eq!(sup.state(), ConnectionState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_does_not_retry_permission_errors_after_wrapper() {
        let store = Arc::new(MockStore::new());
        store.fail_next_data_calls(ProviderError::new("permission-denied", "rules"), 10);
        let sup = supervisor(Arc::new(MockIdentity::signed_in("u")), store.clone());

        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let s = store.clone();
        let err = sup
            .execute(move || {
                let s = s.clone();
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    s.list_documents("workshops").await.map_err(ClientError::from)
                }
            })
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::Permission("rules".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.count(&StoreCall::Disable), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_refreshes_credential_on_auth_error() {
        let identity = Arc::new(MockIdentity::signed_in("u"));
        let store = Arc::new(MockStore::new());
        store.fail_next_data_calls(ProviderError::new("unauthenticated", "expired"), 3);
        let sup = supervisor(identity.clone(), store.clone());

        let s = store.clone();
        let docs = sup
            .execute(move || {
                let s = s.clone();
                async move { s.list_documents("workshops").await.map_err(ClientError::from) }
            })
            .await
            .unwrap();

        assert!(docs.is_empty());
        assert_eq!(identity.forced_calls(), 1);
        assert_eq!(store.count(&StoreCall::Disable), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_signs_out_on_terminal_auth() {
        let identity = Arc::new(MockIdentity::signed_in("u"));
        let store = Arc::new(MockStore::new());
        store.fail_next_data_calls(ProviderError::new("auth/user-disabled", "disabled"), 3);
        let sup = supervisor(identity.clone(), store.clone());

        let s = store.clone();
        let err = sup
            .execute(move || {
                let s = s.clone();
                async move { s.list_documents("workshops").await.map_err(ClientError::from) }
            })
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::Auth(AuthError::Terminal("disabled".into())));
        assert_eq!(identity.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_returns_original_error_when_recovery_fails() {
        let store = Arc::new(MockStore::new());
        // 3 attempts + 2 sentinel reads all fail
        store.fail_next_data_calls(ProviderError::new("unavailable", "down"), 5);
        let sup = supervisor(Arc::new(MockIdentity::signed_in("u")), store.clone());

        let s = store.clone();
        let err = sup
            .execute(move || {
                let s = s.clone();
                async move { s.list_documents("workshops").await.map_err(ClientError::from) }
            })
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::Connectivity("down".into()));
        assert_eq!(sup.state(), ConnectionState::Inactive);
    }
}
