//! Credential refresh
//!
//! Obtains a fresh id token from the identity provider. The provider call is
//! raced against a deadline so a stuck refresh never hangs a reset, and the
//! returned token gets a length sanity check before anyone uses it.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ResilienceConfig;
use crate::error::{AuthError, ClientError, ClientResult, FailureKind};
use crate::provider::IdentityProvider;

/// Refreshes credentials with a timeout guard
#[derive(Clone)]
pub struct CredentialRefresher {
    identity: Arc<dyn IdentityProvider>,
    timeout: Duration,
    min_token_len: usize,
}

impl std::fmt::Debug for CredentialRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRefresher")
            .field("timeout", &self.timeout)
            .field("min_token_len", &self.min_token_len)
            .finish_non_exhaustive()
    }
}

impl CredentialRefresher {
    pub fn new(identity: Arc<dyn IdentityProvider>, config: &ResilienceConfig) -> Self {
        Self {
            identity,
            timeout: config.token_timeout,
            min_token_len: config.min_token_len,
        }
    }

    /// Whether a user is signed in
    pub async fn has_session(&self) -> bool {
        self.identity.current_user().await.is_some()
    }

    /// Obtain a fresh token.
    ///
    /// `force` asks the provider to reissue the token server-side instead of
    /// returning a cached one.
    pub async fn refresh_credential(&self, force: bool) -> ClientResult<String> {
        let Some(user) = self.identity.current_user().await else {
            return Err(AuthError::NoSession.into());
        };

        let result = tokio::time::timeout(self.timeout, self.identity.get_token(force)).await;
        let token = match result {
            Err(_) => {
                tracing::warn!(
                    user = %user,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Token refresh timed out"
                );
                return Err(ClientError::Timeout(format!(
                    "Token refresh timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
            Ok(Err(e)) => {
                tracing::warn!(user = %user, error = %e, "Token refresh rejected");
                return Err(match e.kind() {
                    FailureKind::TerminalAuth => AuthError::Terminal(e.message).into(),
                    FailureKind::Auth | FailureKind::Permission | FailureKind::Generic => {
                        AuthError::Rejected(e.message).into()
                    }
                    _ => ClientError::from(e),
                });
            }
            Ok(Ok(token)) => token,
        };

        if token.len() < self.min_token_len {
            tracing::error!(
                user = %user,
                token_len = token.len(),
                "Provider returned a truncated token"
            );
            return Err(AuthError::InvalidToken.into());
        }

        tracing::debug!(user = %user, force, token_len = token.len(), "Credential refreshed");
        Ok(token)
    }

    /// Sign the current user out
    pub async fn sign_out(&self) -> ClientResult<()> {
        tracing::info!("Signing out after terminal auth failure");
        self.identity.sign_out().await.map_err(ClientError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::mock::{MockIdentity, VALID_TOKEN};

    fn refresher(identity: Arc<MockIdentity>) -> CredentialRefresher {
        CredentialRefresher::new(identity, &ResilienceConfig::default())
    }

    #[tokio::test]
    async fn test_refresh_returns_valid_token() {
        let identity = Arc::new(MockIdentity::signed_in("user-1"));
        let token = refresher(identity.clone())
            .refresh_credential(true)
            .await
            .unwrap();
        assert_eq!(token, VALID_TOKEN);
        assert_eq!(identity.forced_calls(), 1);
    }

    #[tokio::test]
    async fn test_short_token_is_rejected() {
        let identity = Arc::new(MockIdentity::signed_in("user-1"));
        identity.set_token("x".repeat(49));

        let err = refresher(identity).refresh_credential(true).await.unwrap_err();

        assert_eq!(err, ClientError::Auth(AuthError::InvalidToken));
        assert_eq!(err.to_string(), "Invalid token received during refresh");
    }

    #[tokio::test]
    async fn test_token_at_minimum_length_is_accepted() {
        let identity = Arc::new(MockIdentity::signed_in("user-1"));
        identity.set_token("x".repeat(50));
        assert!(refresher(identity).refresh_credential(false).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_session() {
        let identity = Arc::new(MockIdentity::signed_out());
        let err = refresher(identity.clone())
            .refresh_credential(true)
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Auth(AuthError::NoSession));
        assert_eq!(identity.token_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_times_out_instead_of_hanging() {
        let identity = Arc::new(MockIdentity::signed_in("user-1"));
        identity.set_token_delay(Some(Duration::from_secs(3600)));

        let started = tokio::time::Instant::now();
        let err = refresher(identity).refresh_credential(true).await.unwrap_err();

        assert!(matches!(err, ClientError::Timeout(_)));
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_provider_rejection_maps_to_auth_error() {
        let identity = Arc::new(MockIdentity::signed_in("user-1"));
        identity.fail_next(ProviderError::new("auth/user-disabled", "account disabled"));
        identity.fail_next(ProviderError::new("auth/invalid-credential", "bad"));

        let r = refresher(identity);
        let terminal = r.refresh_credential(true).await.unwrap_err();
        assert_eq!(
            terminal,
            ClientError::Auth(AuthError::Terminal("account disabled".into()))
        );

        let rejected = r.refresh_credential(true).await.unwrap_err();
        assert_eq!(rejected, ClientError::Auth(AuthError::Rejected("bad".into())));
    }

    #[tokio::test]
    async fn test_network_failure_during_refresh_is_connectivity() {
        let identity = Arc::new(MockIdentity::signed_in("user-1"));
        identity.fail_next(ProviderError::new("auth/network-request-failed", "offline"));

        let err = refresher(identity).refresh_credential(true).await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
