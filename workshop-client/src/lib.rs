//! Workshop Client - connection resilience for the workshop registration app
//!
//! Keeps the document store channel usable across network drops, stale
//! credentials and stuck connections:
//!
//! - [`CredentialRefresher`]: token refresh with deadline and sanity check
//! - [`ConnectionResetter`]: serialized disable/wait/enable cycle with escalation
//! - [`HealthCheck`]: sentinel read with failure classification
//! - [`with_retry`]: exponential backoff for remote reads and writes
//! - [`ConnectionSupervisor`]: owns the state and the network/sync listeners
//!
//! The identity provider, document store and environment are reached through
//! the traits in [`provider`].

pub mod config;
pub mod connectivity;
pub mod credential;
pub mod error;
pub mod health;
mod listener;
pub mod logger;
pub mod provider;
pub mod repository;
pub mod reset;
pub mod retry;
pub mod state;
pub mod supervisor;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::{ResilienceConfig, RetryPolicy};
pub use connectivity::ConnectivityProbe;
pub use credential::CredentialRefresher;
pub use error::{AuthError, ClientError, ClientResult, FailureKind, Notice, ProviderError};
pub use health::{DegradedReason, HealthCheck, HealthStatus};
pub use provider::{
    Document, DocumentPath, DocumentStore, IdentityProvider, LocalStorage, NetworkEvent,
    NetworkStatus, SyncEvent,
};
pub use repository::{Repository, WorkshopRepository};
pub use reset::{ConnectionResetter, RecoveryOutcome, ResetOutcome};
pub use retry::with_retry;
pub use state::ConnectionState;
pub use supervisor::{ConnectionSupervisor, SupervisorBuilder};

// Re-export shared records for convenience
pub use shared::{Attendance, FileMetadata, Record, User, UserRole, Workshop};
