//! Reconnection walkthrough against the in-memory providers
//!
//! Simulates a network drop, a stuck backend and recovery, printing every
//! connection state transition.
//!
//! Run: cargo run -p workshop-client --example reconnect_demo --features mock

use std::sync::Arc;

use tokio::sync::broadcast;
use workshop_client::mock::{MemoryStorage, MockIdentity, MockNetwork, MockStore};
use workshop_client::{
    ConnectionSupervisor, DocumentPath, NetworkEvent, ProviderError, ResilienceConfig, SyncEvent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    workshop_client::logger::init_logger("info", false)?;

    let identity = Arc::new(MockIdentity::signed_in("demo-user"));
    let store = Arc::new(MockStore::new());
    let network = Arc::new(MockNetwork::new(true));
    let storage = Arc::new(MemoryStorage::with_keys([
        "firebase:authUser:demo",
        "firestore_clients",
        "theme",
    ]));

    store.insert(
        DocumentPath::new("workshops", "rust-101"),
        serde_json::json!({
            "title": "Rust 101",
            "startsAt": 1_700_000_000_000i64,
            "capacity": 20,
            "published": true,
        }),
    );

    let supervisor = ConnectionSupervisor::builder()
        .identity(identity)
        .store(store.clone())
        .network(network.clone())
        .local_storage(storage.clone())
        .config(ResilienceConfig::from_env())
        .build()?;

    let mut states = supervisor.subscribe();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            println!("  state -> {}", state);
        }
    });

    let (net_tx, net_rx) = broadcast::channel(16);
    supervisor.start(net_rx)?;

    println!("1. Backend sync completes");
    store.emit_sync(SyncEvent::InSync);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    println!("2. Network drops");
    network.set_online(false);
    net_tx.send(NetworkEvent::Offline)?;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    println!("3. Network returns, backend still failing once");
    store.fail_next_data_calls(ProviderError::new("unavailable", "backend unreachable"), 1);
    network.set_online(true);
    net_tx.send(NetworkEvent::Online)?;
    tokio::time::sleep(supervisor.config().disable_settle + supervisor.config().enable_settle * 2)
        .await;
    println!("   local storage keys left: {:?}", storage_keys(&storage));

    println!("4. Registering through the supervised pipeline");
    let workshops = supervisor.workshops();
    let workshop = supervisor
        .execute(|| workshops.register("rust-101", "demo-user"))
        .await?;
    println!(
        "   {} now has {} attendee(s)",
        workshop.title,
        workshop.attendees.len()
    );

    supervisor.shutdown().await;
    Ok(())
}

fn storage_keys(storage: &MemoryStorage) -> Vec<String> {
    use workshop_client::LocalStorage;
    storage.keys()
}
