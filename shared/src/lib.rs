//! Shared types for the workshop application
//!
//! Plain records stored in the hosted document store (users, workshops,
//! schedule items, uploaded files, attendance) plus the small helpers the
//! client crates use to name and timestamp them.

pub mod error;
pub mod models;
pub mod types;
pub mod util;

// Re-exports
pub use error::{RecordError, RecordResult};
pub use models::{Attendance, FileMetadata, Record, ScheduleItem, User, UserRole, Workshop};
pub use serde::{Deserialize, Serialize};
pub use types::Timestamp;
