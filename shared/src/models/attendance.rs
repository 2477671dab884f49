//! Attendance Model

use serde::{Deserialize, Serialize};

use super::Record;
use crate::types::{Timestamp, collections};

/// Attendance mark for one user at one workshop.
///
/// The document id is `{workshop_id}_{user_id}` so re-marking overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: String,
    pub workshop_id: String,
    pub user_id: String,
    pub present: bool,
    pub marked_at: Timestamp,
}

impl Attendance {
    pub fn mark(workshop_id: &str, user_id: &str, present: bool) -> Self {
        Self {
            id: format!("{}_{}", workshop_id, user_id),
            workshop_id: workshop_id.to_string(),
            user_id: user_id.to_string(),
            present,
            marked_at: crate::util::now_millis(),
        }
    }
}

impl Record for Attendance {
    const COLLECTION: &'static str = collections::ATTENDANCE;

    fn id(&self) -> &str {
        &self.id
    }
}
