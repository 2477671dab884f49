//! Client error types

use thiserror::Error;

/// Provider codes that mean the session itself is gone, not just the token.
const TERMINAL_AUTH_CODES: &[&str] = &[
    "user-token-expired",
    "user-disabled",
    "user-not-found",
    "invalid-user-token",
];

/// Error returned by every provider adapter (identity, document store).
///
/// `code` is the provider's own error code (e.g. `unavailable`,
/// `permission-denied`), `status` the HTTP status when the provider
/// surfaced one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Classify the failure signal
    pub fn kind(&self) -> FailureKind {
        let code = normalize_code(&self.code);

        if code == "permission-denied" || self.status == Some(403) {
            return FailureKind::Permission;
        }
        if code == "resource-exhausted" || self.status == Some(429) {
            return FailureKind::ResourceExhausted;
        }
        if TERMINAL_AUTH_CODES.contains(&code) {
            return FailureKind::TerminalAuth;
        }
        if code == "unauthenticated" || code.ends_with("token-expired") || self.status == Some(401)
        {
            return FailureKind::Auth;
        }
        if code == "not-found" || self.status == Some(404) {
            return FailureKind::NotFound;
        }
        if code == "deadline-exceeded" {
            return FailureKind::Timeout;
        }
        if contains_ignore_case(code, "offline") || contains_ignore_case(&self.message, "offline") {
            return FailureKind::Offline;
        }
        if code == "unavailable" || matches!(self.status, Some(400) | Some(502..=504)) {
            return FailureKind::Unavailable;
        }
        FailureKind::Generic
    }
}

/// Provider codes may arrive namespaced (`auth/user-disabled`).
fn normalize_code(code: &str) -> &str {
    code.rsplit('/').next().unwrap_or(code)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(needle)
}

/// Classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Credential rejected or expired, recoverable by a forced refresh
    Auth,
    /// Account expired or disabled, user must sign in again
    TerminalAuth,
    /// Security rules rejected the request
    Permission,
    /// Backend unreachable or channel corrupted
    Unavailable,
    /// Client believes it is offline
    Offline,
    /// Quota exceeded
    ResourceExhausted,
    NotFound,
    Timeout,
    Generic,
}

impl FailureKind {
    /// Connectivity failures are the only ones a connection reset can fix.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Offline)
    }
}

/// Authentication error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No user is signed in
    #[error("No signed-in user")]
    NoSession,

    /// Provider returned a truncated or corrupt token
    #[error("Invalid token received during refresh")]
    InvalidToken,

    /// Provider rejected the credential
    #[error("Credential rejected: {0}")]
    Rejected(String),

    /// Account expired or disabled
    #[error("Session ended: {0}")]
    Terminal(String),
}

impl AuthError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_) | Self::NoSession)
    }
}

/// Client error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Authentication failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Backend unreachable or client offline
    #[error("Connection unavailable: {0}")]
    Connectivity(String),

    /// Rejected by security rules
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Quota exceeded
    #[error("Quota exceeded: {0}")]
    Quota(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection reset could not restore the channel
    #[error("Connection reset failed: {0}")]
    Reset(String),

    /// Listeners were already installed
    #[error("Connection supervisor already started")]
    AlreadyStarted,

    /// Rejected by a workshop rule (full, not published)
    #[error("{0}")]
    Rule(shared::RecordError),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unclassified provider failure
    #[error("Provider error ({code}): {message}")]
    Provider { code: String, message: String },
}

impl ClientError {
    /// Transient errors are worth a manual retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connectivity(_))
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// How the error should be presented to the user
    pub fn notice(&self) -> Notice {
        match self {
            Self::Timeout(_) | Self::Connectivity(_) => Notice::Transient {
                message: "Connection problem, changes may not be saved yet.".to_string(),
                retryable: true,
            },
            Self::Auth(e) if e.is_terminal() => Notice::Persistent {
                message: "Your session has expired, please sign in again.".to_string(),
            },
            Self::Auth(_) => Notice::Transient {
                message: "Could not verify your session, please retry.".to_string(),
                retryable: true,
            },
            Self::Permission(_) => Notice::Persistent {
                message: "Access denied by security rules. Check and redeploy the rules."
                    .to_string(),
            },
            Self::Quota(_) => Notice::Persistent {
                message: "Service quota exceeded, try again later.".to_string(),
            },
            Self::Rule(shared::RecordError::WorkshopFull(_)) => Notice::Persistent {
                message: "This workshop is full.".to_string(),
            },
            Self::Rule(shared::RecordError::NotPublished(_)) => Notice::Persistent {
                message: "This workshop is not open for registration yet.".to_string(),
            },
            other => Notice::Persistent {
                message: other.to_string(),
            },
        }
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        match err.kind() {
            FailureKind::Auth => Self::Auth(AuthError::Rejected(err.message)),
            FailureKind::TerminalAuth => Self::Auth(AuthError::Terminal(err.message)),
            FailureKind::Permission => Self::Permission(err.message),
            FailureKind::Unavailable | FailureKind::Offline => Self::Connectivity(err.message),
            FailureKind::ResourceExhausted => Self::Quota(err.message),
            FailureKind::NotFound => Self::NotFound(err.message),
            FailureKind::Timeout => Self::Timeout(err.message),
            FailureKind::Generic => Self::Provider {
                code: err.code,
                message: err.message,
            },
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<shared::RecordError> for ClientError {
    fn from(err: shared::RecordError) -> Self {
        match err {
            shared::RecordError::NotRegistered { .. } => Self::NotFound(err.to_string()),
            other => Self::Rule(other),
        }
    }
}

/// User-visible presentation of an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Dismissible banner, optionally with a retry action
    Transient { message: String, retryable: bool },
    /// Error state that stays until the cause is fixed
    Persistent { message: String },
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_provider_codes() {
        let offline = "Failed to get document because the client is offline.";
        let cases = [
            ("permission-denied", "rules", FailureKind::Permission),
            ("unavailable", "backend", FailureKind::Unavailable),
            ("unknown", offline, FailureKind::Offline),
            ("resource-exhausted", "quota", FailureKind::ResourceExhausted),
            ("auth/user-disabled", "disabled", FailureKind::TerminalAuth),
            ("auth/id-token-expired", "expired", FailureKind::Auth),
            ("unauthenticated", "no token", FailureKind::Auth),
            ("not-found", "missing", FailureKind::NotFound),
            ("deadline-exceeded", "slow", FailureKind::Timeout),
            ("internal", "boom", FailureKind::Generic),
        ];
        for (code, message, kind) in cases {
            let err = ProviderError::new(code, message);
            assert_eq!(err.kind(), kind, "{err}");
        }
    }

    #[test]
    fn test_http_400_counts_as_unavailable() {
        let err = ProviderError::new("unknown", "Bad Request").with_status(400);
        assert_eq!(err.kind(), FailureKind::Unavailable);
        assert!(err.kind().is_connectivity());
    }

    #[test]
    fn test_provider_error_maps_to_client_error() {
        let err: ClientError = ProviderError::new("unavailable", "down").into();
        assert_eq!(err, ClientError::Connectivity("down".to_string()));
        assert!(err.is_transient());

        let err: ClientError = ProviderError::new("internal", "boom").into();
        assert_eq!(
            err,
            ClientError::Provider {
                code: "internal".to_string(),
                message: "boom".to_string()
            }
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_invalid_token_message() {
        let err = ClientError::from(AuthError::InvalidToken);
        assert_eq!(err.to_string(), "Invalid token received during refresh");
    }

    #[test]
    fn test_notice_for_transient_and_persistent_errors() {
        let transient = ClientError::Connectivity("offline".into()).notice();
        assert!(matches!(transient, Notice::Transient { retryable: true, .. }));

        let permission = ClientError::Permission("rules".into()).notice();
        assert!(matches!(permission, Notice::Persistent { .. }));

        let quota = ClientError::Quota("limit".into()).notice();
        assert!(matches!(quota, Notice::Persistent { .. }));

        let expired = ClientError::Auth(AuthError::Terminal("disabled".into())).notice();
        assert!(matches!(expired, Notice::Persistent { .. }));
    }

    #[test]
    fn test_rule_errors_keep_their_own_notice() {
        let full: ClientError = shared::RecordError::WorkshopFull("w1".into()).into();
        assert_eq!(full, ClientError::Rule(shared::RecordError::WorkshopFull("w1".into())));
        assert_eq!(full.to_string(), "Workshop w1 is full");
        assert!(!full.is_transient());
        assert_eq!(
            full.notice(),
            Notice::Persistent {
                message: "This workshop is full.".to_string()
            }
        );

        let draft: ClientError = shared::RecordError::NotPublished("w2".into()).into();
        assert!(matches!(
            draft.notice(),
            Notice::Persistent { ref message } if message.contains("not open")
        ));

        let missing: ClientError = shared::RecordError::NotRegistered {
            workshop_id: "w1".into(),
            user_id: "u1".into(),
        }
        .into();
        assert!(matches!(missing, ClientError::NotFound(_)));
    }
}
