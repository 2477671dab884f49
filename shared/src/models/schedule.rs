//! Schedule item of a workshop agenda

use serde::{Deserialize, Serialize};

/// One slot in a workshop's agenda
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    /// Wall-clock label shown in the agenda (e.g. "10:30")
    pub time: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}
