//! Data models
//!
//! Records owned by the hosted document store. Field names are camelCase on
//! the wire so documents written by the web frontend deserialize unchanged.

pub mod attendance;
pub mod file_metadata;
pub mod schedule;
pub mod user;
pub mod workshop;

use serde::Serialize;
use serde::de::DeserializeOwned;

// Re-exports
pub use attendance::*;
pub use file_metadata::*;
pub use schedule::*;
pub use user::*;
pub use workshop::*;

/// A record stored as one document in a named collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the record lives in
    const COLLECTION: &'static str;

    /// Document id inside [`Record::COLLECTION`]
    fn id(&self) -> &str;
}
