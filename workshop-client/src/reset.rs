//! Connection reset
//!
//! Clears stuck store connections by cycling the network channel:
//!
//! 1. Take the reset permit (a concurrent reset makes this a no-op)
//! 2. Refresh the credential if a user is signed in
//! 3. Disable the network channel
//! 4. Wait `disable_settle` for in-flight connections to close
//! 5. Re-enable the network channel
//! 6. Wait `enable_settle`
//! 7. Refresh the credential again, now over the new channel
//!
//! Every step except re-enabling is best-effort: failures are logged and the
//! sequence continues. The permit is released on every exit path, including
//! when the future is dropped.
//!
//! [`ConnectionResetter::recover`] wraps the cycle with a health check and a
//! one-shot escalation and is the only place that moves the connection state
//! through `Resetting`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::ResilienceConfig;
use crate::credential::CredentialRefresher;
use crate::error::{ClientError, ClientResult};
use crate::health::{HealthCheck, HealthStatus};
use crate::provider::{DocumentStore, LocalStorage, clear_provider_artifacts};
use crate::state::{ConnectionState, ConnectionStateCell};

/// Outcome of [`ConnectionResetter::reset_connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The disable/enable cycle ran
    Completed,
    /// Another reset was already running
    Skipped,
}

/// Outcome of [`ConnectionResetter::recover`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Another reset was already running
    Skipped,
    /// Reset ran; final health check result
    Verified(HealthStatus),
}

/// Exclusive right to run a reset cycle. Dropping it releases the flag.
#[derive(Debug)]
pub struct ResetPermit {
    flag: Arc<AtomicBool>,
    escalated: bool,
}

impl Drop for ResetPermit {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Cycles the store's network channel and verifies the result
pub struct ConnectionResetter {
    store: Arc<dyn DocumentStore>,
    credentials: CredentialRefresher,
    health: HealthCheck,
    storage: Option<Arc<dyn LocalStorage>>,
    state: ConnectionStateCell,
    in_progress: Arc<AtomicBool>,
    disable_settle: Duration,
    enable_settle: Duration,
    artifact_markers: Vec<String>,
    terminate_on_escalation: bool,
}

impl ConnectionResetter {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        credentials: CredentialRefresher,
        storage: Option<Arc<dyn LocalStorage>>,
        state: ConnectionStateCell,
        config: &ResilienceConfig,
    ) -> Self {
        let health = HealthCheck::new(store.clone(), config.sentinel.clone());
        Self {
            store,
            credentials,
            health,
            storage,
            state,
            in_progress: Arc::new(AtomicBool::new(false)),
            disable_settle: config.disable_settle,
            enable_settle: config.enable_settle,
            artifact_markers: config.artifact_markers.clone(),
            terminate_on_escalation: config.terminate_on_escalation,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> &HealthCheck {
        &self.health
    }

    /// Take the reset permit, or `None` if a reset is running
    pub fn try_begin(&self) -> Option<ResetPermit> {
        self.in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(ResetPermit {
            flag: Arc::clone(&self.in_progress),
            escalated: false,
        })
    }

    /// Run one disable/wait/enable cycle unless another reset is running
    pub async fn reset_connection(&self) -> ClientResult<ResetOutcome> {
        let Some(permit) = self.try_begin() else {
            tracing::debug!("Connection reset already in progress, skipping");
            return Ok(ResetOutcome::Skipped);
        };
        self.run_cycle(&permit).await?;
        Ok(ResetOutcome::Completed)
    }

    /// Reset, verify with the sentinel read and escalate once if the channel
    /// still looks broken. Drives the connection state.
    pub async fn recover(&self) -> ClientResult<RecoveryOutcome> {
        let Some(mut permit) = self.try_begin() else {
            tracing::debug!("Connection reset already in progress, skipping recovery");
            return Ok(RecoveryOutcome::Skipped);
        };

        self.state.set(ConnectionState::Resetting);

        if let Err(e) = self.run_cycle(&permit).await {
            self.state.set(ConnectionState::Inactive);
            return Err(e);
        }

        let mut status = self.health.verify_connection().await;
        if status.is_transient_failure() {
            self.escalate(&mut permit).await;
            status = self.health.verify_connection().await;
        }

        match &status {
            HealthStatus::Healthy => {
                tracing::info!("Connection recovered");
                self.state.set(ConnectionState::Active);
            }
            HealthStatus::Degraded(reason) => {
                tracing::warn!(reason = %reason, "Connection still degraded after reset");
                self.state.set(ConnectionState::Inactive);
            }
        }

        Ok(RecoveryOutcome::Verified(status))
    }

    async fn run_cycle(&self, _permit: &ResetPermit) -> ClientResult<()> {
        tracing::info!(
            disable_settle_ms = self.disable_settle.as_millis() as u64,
            enable_settle_ms = self.enable_settle.as_millis() as u64,
            "Resetting store connection"
        );

        // Stale tokens are a common reason for the reset in the first place.
        let has_session = self.credentials.has_session().await;
        if has_session {
            if let Err(e) = self.credentials.refresh_credential(true).await {
                tracing::warn!(error = %e, "Credential refresh before reset failed, continuing");
            }
        }

        if let Err(e) = self.store.disable_network().await {
            tracing::warn!(error = %e, "Failed to disable network channel, continuing");
        }

        tokio::time::sleep(self.disable_settle).await;

        if let Err(e) = self.store.enable_network().await {
            tracing::error!(error = %e, "Failed to re-enable network channel");
            return Err(ClientError::Reset(format!(
                "failed to re-enable network: {}",
                e
            )));
        }

        tokio::time::sleep(self.enable_settle).await;

        if has_session {
            if let Err(e) = self.credentials.refresh_credential(true).await {
                tracing::warn!(error = %e, "Credential refresh after reset failed");
            }
        }

        tracing::info!("Store connection reset complete");
        Ok(())
    }

    /// Aggressive fallback, at most once per permit: optionally terminate the
    /// client, drop cached provider artifacts and force a new token.
    async fn escalate(&self, permit: &mut ResetPermit) {
        if permit.escalated {
            return;
        }
        permit.escalated = true;
        tracing::warn!("Escalating connection recovery");

        if self.terminate_on_escalation {
            match self.store.terminate().await {
                Ok(true) => tracing::info!("Store client terminated and recreated"),
                Ok(false) => tracing::debug!("Store adapter does not support terminate"),
                Err(e) => tracing::warn!(error = %e, "Failed to terminate store client"),
            }
        }

        if let Some(storage) = &self.storage {
            let removed = clear_provider_artifacts(storage.as_ref(), &self.artifact_markers);
            tracing::info!(removed, "Cleared cached provider artifacts");
        }

        if self.credentials.has_session().await {
            if let Err(e) = self.credentials.refresh_credential(true).await {
                tracing::warn!(error = %e, "Forced credential refresh during escalation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::health::DegradedReason;
    use crate::mock::{MemoryStorage, MockIdentity, MockStore, StoreCall};
    use crate::provider::IdentityProvider;

    struct Fixture {
        identity: Arc<MockIdentity>,
        store: Arc<MockStore>,
        storage: Arc<MemoryStorage>,
        state: ConnectionStateCell,
        resetter: Arc<ConnectionResetter>,
    }

    fn fixture(config: ResilienceConfig) -> Fixture {
        let identity = Arc::new(MockIdentity::signed_in("user-1"));
        let store = Arc::new(MockStore::new());
        let storage = Arc::new(MemoryStorage::with_keys([
            "firebase:authUser:app",
            "firestore_targets",
            "theme",
        ]));
        let state = ConnectionStateCell::new();
        let credentials = CredentialRefresher::new(identity.clone(), &config);
        let resetter = Arc::new(ConnectionResetter::new(
            store.clone(),
            credentials,
            Some(storage.clone()),
            state.clone(),
            &config,
        ));
        Fixture {
            identity,
            store,
            storage,
            state,
            resetter,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_sequence_and_settle_delays() {
        let f = fixture(ResilienceConfig::default());

        let outcome = f.resetter.reset_connection().await.unwrap();

        assert_eq!(outcome, ResetOutcome::Completed);
        let calls = f.store.timed_calls();
        assert_eq!(
            calls.iter().map(|(_, c)| c.clone()).collect::<Vec<_>>(),
            vec![StoreCall::Disable, StoreCall::Enable]
        );
        assert_eq!(calls[1].0 - calls[0].0, Duration::from_millis(3000));
        // One refresh before disabling, one after re-enabling
        assert_eq!(f.identity.forced_calls(), 2);
        assert!(!f.resetter.is_in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_without_session_skips_refresh() {
        let f = fixture(ResilienceConfig::default());
        f.identity.sign_out().await.unwrap();

        f.resetter.reset_connection().await.unwrap();

        assert_eq!(f.identity.token_calls(), 0);
        assert_eq!(f.store.count(&StoreCall::Enable), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_resets_run_one_cycle() {
        let f = fixture(ResilienceConfig::default());

        let (a, b, c) = tokio::join!(
            f.resetter.reset_connection(),
            f.resetter.reset_connection(),
            f.resetter.reset_connection(),
        );

        let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];
        assert_eq!(
            outcomes.iter().filter(|o| **o == ResetOutcome::Completed).count(),
            1
        );
        assert_eq!(f.store.count(&StoreCall::Disable), 1);
        assert_eq!(f.store.count(&StoreCall::Enable), 1);
        assert!(!f.resetter.is_in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flag_released_when_enable_fails() {
        let f = fixture(ResilienceConfig::default());
        f.store
            .fail_next_enable(ProviderError::new("internal", "channel broken"));

        let err = f.resetter.reset_connection().await.unwrap_err();

        assert!(matches!(err, ClientError::Reset(_)));
        assert!(!f.resetter.is_in_progress());
        assert_eq!(
            f.resetter.reset_connection().await.unwrap(),
            ResetOutcome::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_flag_released_when_future_is_dropped() {
        let f = fixture(ResilienceConfig::default());

        let resetter = f.resetter.clone();
        let handle = tokio::spawn(async move { resetter.reset_connection().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(f.resetter.is_in_progress());

        handle.abort();
        let _ = handle.await;
        assert!(!f.resetter.is_in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_failure_does_not_abort_reset() {
        let f = fixture(ResilienceConfig::default());
        f.identity.set_token("short");

        let outcome = f.resetter.reset_connection().await.unwrap();

        assert_eq!(outcome, ResetOutcome::Completed);
        assert_eq!(f.store.count(&StoreCall::Enable), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_marks_active_when_healthy() {
        let f = fixture(ResilienceConfig::default());
        let rx = f.state.subscribe();

        let outcome = f.resetter.recover().await.unwrap();

        assert_eq!(outcome, RecoveryOutcome::Verified(HealthStatus::Healthy));
        assert_eq!(f.state.get(), ConnectionState::Active);
        assert!(rx.has_changed().unwrap());
        // Nothing escalated: provider artifacts untouched
        assert_eq!(f.storage.keys().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_escalates_once_on_transient_failure() {
        let config = ResilienceConfig::default().with_terminate_on_escalation(true);
        let f = fixture(config);
        f.store.set_supports_terminate(true);
        f.store
            .fail_next_data_calls(ProviderError::new("unavailable", "backend down"), 1);

        let outcome = f.resetter.recover().await.unwrap();

        assert_eq!(outcome, RecoveryOutcome::Verified(HealthStatus::Healthy));
        assert_eq!(f.store.count(&StoreCall::Terminate), 1);
        assert_eq!(f.storage.keys(), vec!["theme".to_string()]);
        // before disable, after enable, escalation
        assert_eq!(f.identity.forced_calls(), 3);
        assert_eq!(f.state.get(), ConnectionState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_gives_up_after_single_escalation() {
        let f = fixture(ResilienceConfig::default());
        f.store
            .fail_next_data_calls(ProviderError::new("unknown", "client is offline"), 5);

        let outcome = f.resetter.recover().await.unwrap();

        assert_eq!(
            outcome,
            RecoveryOutcome::Verified(HealthStatus::Degraded(DegradedReason::Offline))
        );
        assert_eq!(f.store.count(&StoreCall::Get(f.resetter.health().sentinel().clone())), 2);
        assert_eq!(f.store.count(&StoreCall::Terminate), 0);
        assert_eq!(f.state.get(), ConnectionState::Inactive);
        assert!(!f.resetter.is_in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_does_not_escalate_permission_errors() {
        let f = fixture(ResilienceConfig::default());
        f.store
            .fail_next_data_calls(ProviderError::new("permission-denied", "rules"), 1);

        let outcome = f.resetter.recover().await.unwrap();

        assert_eq!(
            outcome,
            RecoveryOutcome::Verified(HealthStatus::Degraded(DegradedReason::Permission))
        );
        assert_eq!(f.storage.keys().len(), 3);
        assert_eq!(f.state.get(), ConnectionState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_skipped_while_reset_running() {
        let f = fixture(ResilienceConfig::default());
        let permit = f.resetter.try_begin().unwrap();

        assert_eq!(f.resetter.recover().await.unwrap(), RecoveryOutcome::Skipped);
        assert!(f.store.calls().is_empty());
        assert_eq!(f.state.get(), ConnectionState::Inactive);

        drop(permit);
        assert!(!f.resetter.is_in_progress());
    }
}
