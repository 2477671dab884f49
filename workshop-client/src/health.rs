//! Health check
//!
//! A single read of a well-known sentinel document tells whether the store
//! channel works. Failures are classified so the caller knows whether a
//! connection reset could help.

use std::sync::Arc;

use crate::error::{FailureKind, ProviderError};
use crate::provider::{DocumentPath, DocumentStore};

/// Why a health check failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// Security rules reject the read; operator must fix the rules
    Permission,
    /// Backend unreachable or channel corrupted
    Unavailable,
    /// Client reports itself offline
    Offline,
    /// Quota exhausted
    ResourceExhausted,
    /// Anything else, with the provider message
    Generic(String),
}

impl DegradedReason {
    /// Transient reasons are eligible for a connection reset escalation
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Offline)
    }
}

impl From<&ProviderError> for DegradedReason {
    fn from(err: &ProviderError) -> Self {
        match err.kind() {
            FailureKind::Permission => Self::Permission,
            FailureKind::Unavailable => Self::Unavailable,
            FailureKind::Offline => Self::Offline,
            FailureKind::ResourceExhausted => Self::ResourceExhausted,
            _ => Self::Generic(err.to_string()),
        }
    }
}

impl std::fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permission => write!(f, "permission denied"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Offline => write!(f, "offline"),
            Self::ResourceExhausted => write!(f, "resource exhausted"),
            Self::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

/// Result of a health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(DegradedReason),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Degraded with a reason a reset may fix
    pub fn is_transient_failure(&self) -> bool {
        matches!(self, Self::Degraded(reason) if reason.is_transient())
    }
}

/// Reads the sentinel document to verify the channel
#[derive(Clone)]
pub struct HealthCheck {
    store: Arc<dyn DocumentStore>,
    sentinel: DocumentPath,
}

impl HealthCheck {
    pub fn new(store: Arc<dyn DocumentStore>, sentinel: DocumentPath) -> Self {
        Self { store, sentinel }
    }

    pub fn sentinel(&self) -> &DocumentPath {
        &self.sentinel
    }

    /// Read the sentinel once. A missing document still proves the round trip.
    pub async fn verify_connection(&self) -> HealthStatus {
        match self.store.get_document(&self.sentinel).await {
            Ok(snapshot) => {
                tracing::debug!(
                    sentinel = %self.sentinel,
                    exists = snapshot.is_some(),
                    "Health check passed"
                );
                HealthStatus::Healthy
            }
            Err(e) => {
                let reason = DegradedReason::from(&e);
                match reason {
                    DegradedReason::Permission => tracing::error!(
                        sentinel = %self.sentinel,
                        error = %e,
                        "Health check denied by security rules, check and redeploy the rules"
                    ),
                    DegradedReason::ResourceExhausted => tracing::error!(
                        sentinel = %self.sentinel,
                        error = %e,
                        "Health check hit quota limits"
                    ),
                    DegradedReason::Unavailable | DegradedReason::Offline => tracing::warn!(
                        sentinel = %self.sentinel,
                        reason = %reason,
                        "Health check failed, connection may need a reset"
                    ),
                    DegradedReason::Generic(_) => tracing::warn!(
                        sentinel = %self.sentinel,
                        error = %e,
                        "Health check failed"
                    ),
                }
                HealthStatus::Degraded(reason)
            }
        }
    }
}
