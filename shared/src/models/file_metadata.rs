//! Uploaded file metadata (gallery and workshop material)

use serde::{Deserialize, Serialize};

use super::Record;
use crate::types::{Timestamp, collections};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Object storage path of the blob
    pub storage_path: String,
    pub uploaded_by: String,
    pub uploaded_at: Timestamp,
}

impl FileMetadata {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

impl Record for FileMetadata {
    const COLLECTION: &'static str = collections::FILES;

    fn id(&self) -> &str {
        &self.id
    }
}
