//! Process-wide event listeners
//!
//! One task drains network transitions and store sync notifications until
//! the supervisor is shut down.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::provider::{NetworkEvent, SyncEvent};
use crate::reset::RecoveryOutcome;
use crate::state::ConnectionState;
use crate::supervisor::SupervisorCore;

pub(crate) async fn run(
    core: Arc<SupervisorCore>,
    mut network_rx: broadcast::Receiver<NetworkEvent>,
    mut sync_rx: broadcast::Receiver<SyncEvent>,
    cancel: CancellationToken,
) {
    let mut network_open = true;
    let mut sync_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Listener cancelled");
                break;
            }
            event = network_rx.recv(), if network_open => match event {
                Ok(NetworkEvent::Online) => on_online(&core),
                Ok(NetworkEvent::Offline) => on_offline(&core).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Network listener lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Network event channel closed");
                    network_open = false;
                }
            },
            event = sync_rx.recv(), if sync_open => match event {
                Ok(SyncEvent::InSync) => core.state.set(ConnectionState::Active),
                Ok(SyncEvent::Pending) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Sync listener lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Sync event channel closed");
                    sync_open = false;
                }
            },
        }
    }
}

/// Recovery runs on its own task so the listener keeps draining events.
/// Overlapping online events are collapsed by the reset permit; the
/// running recovery re-enables the network for them.
fn on_online(core: &Arc<SupervisorCore>) {
    tracing::info!("Network online, resetting store connection");
    let core = Arc::clone(core);
    tokio::spawn(async move {
        let result = match core.resetter.recover().await {
            Ok(RecoveryOutcome::Skipped) => return,
            Ok(RecoveryOutcome::Verified(_)) => {
                core.probe.try_enable_network(core.store.as_ref()).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to restore connection after coming online");
            core.state.set(ConnectionState::Inactive);
        }
    });
}

async fn on_offline(core: &SupervisorCore) {
    tracing::info!("Network offline, disabling store network");
    if let Err(e) = core.store.disable_network().await {
        tracing::warn!(error = %e, "Failed to disable store network");
    }
}
