//! Workshop Model

use serde::{Deserialize, Serialize};

use super::{Record, ScheduleItem};
use crate::error::{RecordError, RecordResult};
use crate::types::{Timestamp, collections};

/// Workshop record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workshop {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub starts_at: Timestamp,
    /// Maximum number of attendees (0 = unlimited)
    pub capacity: u32,
    /// Registered user ids
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub schedule: Vec<ScheduleItem>,
    #[serde(default)]
    pub published: bool,
}

impl Workshop {
    pub fn new(title: impl Into<String>, starts_at: Timestamp, capacity: u32) -> Self {
        Self {
            id: crate::util::new_id(),
            title: title.into(),
            description: String::new(),
            starts_at,
            capacity,
            attendees: Vec::new(),
            schedule: Vec::new(),
            published: false,
        }
    }

    /// Remaining seats, `None` when capacity is unlimited
    pub fn seats_left(&self) -> Option<u32> {
        if self.capacity == 0 {
            return None;
        }
        Some(self.capacity.saturating_sub(self.attendees.len() as u32))
    }

    pub fn is_full(&self) -> bool {
        self.seats_left() == Some(0)
    }

    pub fn is_registered(&self, user_id: &str) -> bool {
        self.attendees.iter().any(|a| a == user_id)
    }

    /// Register a user. Registering an already registered user is a no-op.
    ///
    /// Returns `true` when the attendee list changed.
    pub fn register(&mut self, user_id: &str) -> RecordResult<bool> {
        if !self.published {
            return Err(RecordError::NotPublished(self.id.clone()));
        }
        if self.is_registered(user_id) {
            return Ok(false);
        }
        if self.is_full() {
            return Err(RecordError::WorkshopFull(self.id.clone()));
        }
        self.attendees.push(user_id.to_string());
        Ok(true)
    }

    pub fn unregister(&mut self, user_id: &str) -> RecordResult<()> {
        let before = self.attendees.len();
        self.attendees.retain(|a| a != user_id);
        if self.attendees.len() == before {
            return Err(RecordError::NotRegistered {
                workshop_id: self.id.clone(),
                user_id: user_id.to_string(),
            });
        }
        Ok(())
    }
}

impl Record for Workshop {
    const COLLECTION: &'static str = collections::WORKSHOPS;

    fn id(&self) -> &str {
        &self.id
    }
}
