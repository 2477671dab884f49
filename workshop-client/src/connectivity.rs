//! Connectivity probe

use std::sync::Arc;

use crate::error::ClientResult;
use crate::provider::{DocumentStore, NetworkStatus};

/// Reports the runtime's online state and gates network re-enabling on it
#[derive(Clone)]
pub struct ConnectivityProbe {
    status: Arc<dyn NetworkStatus>,
}

impl ConnectivityProbe {
    pub fn new(status: Arc<dyn NetworkStatus>) -> Self {
        Self { status }
    }

    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }

    /// Enable the store's network channel only when the runtime is online.
    ///
    /// Returns whether the channel was enabled.
    pub async fn try_enable_network(&self, store: &dyn DocumentStore) -> ClientResult<bool> {
        if !self.is_online() {
            tracing::info!("Runtime reports offline, leaving network channel disabled");
            return Ok(false);
        }
        store.enable_network().await?;
        tracing::debug!("Network channel enabled");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockNetwork, MockStore, StoreCall};

    #[tokio::test]
    async fn test_offline_never_calls_enable() {
        let network = Arc::new(MockNetwork::new(false));
        let store = MockStore::new();
        let probe = ConnectivityProbe::new(network);

        assert!(!probe.is_online());
        assert!(!probe.try_enable_network(&store).await.unwrap());
        assert_eq!(store.count(&StoreCall::Enable), 0);
    }

    #[tokio::test]
    async fn test_online_enables_network() {
        let network = Arc::new(MockNetwork::new(true));
        let store = MockStore::new();
        let probe = ConnectivityProbe::new(network.clone());

        assert!(probe.try_enable_network(&store).await.unwrap());
        assert_eq!(store.count(&StoreCall::Enable), 1);

        network.set_online(false);
        assert!(!probe.try_enable_network(&store).await.unwrap());
        assert_eq!(store.count(&StoreCall::Enable), 1);
    }
}
