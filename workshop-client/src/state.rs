//! Connection state machine
//!
//! One [`ConnectionStateCell`] is owned by each supervisor. UI code observes
//! it through a `watch` subscription instead of reading a global.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Connection state shown to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not known to be connected
    #[default]
    Inactive,
    /// A connection reset is running
    Resetting,
    /// Store reported itself in sync, or a health check passed
    Active,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Resetting => "resetting",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observable holder of the current [`ConnectionState`]
#[derive(Debug, Clone)]
pub struct ConnectionStateCell {
    tx: watch::Sender<ConnectionState>,
}

impl Default for ConnectionStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Inactive);
        Self { tx }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Set the state, notifying subscribers only on change
    pub fn set(&self, state: ConnectionState) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::info!(from = %current, to = %state, "Connection state changed");
            *current = state;
            true
        });
        if !changed {
            tracing::trace!(state = %state, "Connection state unchanged");
        }
    }

    /// Return to the startup state
    pub fn reset(&self) {
        self.set(ConnectionState::Inactive);
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_inactive() {
        let cell = ConnectionStateCell::new();
        assert_eq!(cell.get(), ConnectionState::Inactive);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_only() {
        let cell = ConnectionStateCell::new();
        let mut rx = cell.subscribe();

        cell.set(ConnectionState::Inactive);
        assert!(!rx.has_changed().unwrap());

        cell.set(ConnectionState::Resetting);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Resetting);

        cell.set(ConnectionState::Active);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Active);

        cell.reset();
        assert_eq!(cell.get(), ConnectionState::Inactive);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionState::Resetting).unwrap();
        assert_eq!(json, "\"resetting\"");
        assert_eq!(ConnectionState::Active.to_string(), "active");
    }
}
