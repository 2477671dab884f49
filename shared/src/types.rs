//! Common types for the shared crate

/// Timestamp type (Unix milliseconds)
pub type Timestamp = i64;

/// Collection names used by the document store
pub mod collections {
    pub const USERS: &str = "users";
    pub const WORKSHOPS: &str = "workshops";
    pub const FILES: &str = "files";
    pub const ATTENDANCE: &str = "attendance";
}
