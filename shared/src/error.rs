//! Error types for record-level business rules

use thiserror::Error;

/// Errors raised by domain rules on shared records
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Workshop has no seats left
    #[error("Workshop {0} is full")]
    WorkshopFull(String),

    /// User is not registered for the workshop
    #[error("User {user_id} is not registered for workshop {workshop_id}")]
    NotRegistered {
        workshop_id: String,
        user_id: String,
    },

    /// Workshop is not open for registration
    #[error("Workshop {0} is not published")]
    NotPublished(String),
}

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;
