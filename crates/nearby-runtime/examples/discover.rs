//! Two in-process devices discovering each other over the loopback radio.
//!
//! Run with:
//!
//! ```sh
//! cargo run --example discover
//! ```

use std::sync::Arc;
use std::time::Duration;

use nearby_core::photo::AssetStore;
use nearby_core::profile::{ProfileStore, StaticProfileStore, UserProfile};
use nearby_core::{event_channel, RadioAddress, RadioConfig, SessionConfig, SystemTimeSource};
use nearby_radio::{LoopbackNetwork, RadioWorker};
use nearby_runtime::scan::NullScanControl;
use nearby_runtime::{AppEvent, DiscoveryRuntime, RuntimeHandles, SessionCommand};

fn start_device(
    network: &Arc<LoopbackNetwork>,
    address: &str,
    payment_address: &str,
    name: &str,
) -> RuntimeHandles {
    let assets = std::env::temp_dir().join(format!("nearby-demo-{address}"));
    let profile_store: Arc<dyn ProfileStore> = Arc::new(StaticProfileStore::new(UserProfile {
        display_name: name.to_string(),
        photo_path: None,
    }));
    let (events_tx, events_rx) = event_channel();

    let radio = RadioWorker::spawn(
        Arc::new(network.endpoint(address)),
        payment_address,
        profile_store,
        Arc::new(AssetStore::open(assets).expect("asset dir")),
        RadioConfig::default(),
        events_tx,
    );

    let (runtime, handles) = DiscoveryRuntime::new(
        NullScanControl::default(),
        SessionConfig::default(),
        Arc::new(SystemTimeSource::new()),
        Some(radio),
        None,
        None,
        events_rx,
    );
    tokio::spawn(runtime.run());
    handles
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let network = LoopbackNetwork::new();
    let alice = start_device(&network, "aa:aa", "1AliceAddress", "Alice");
    let mut bob = start_device(&network, "bb:bb", "1BobAddress", "Bob");

    for device in [&alice, &bob] {
        device.commands.send(SessionCommand::Activate).expect("runtime alive");
        device
            .commands
            .send(SessionCommand::RadioReady(true))
            .expect("runtime alive");
    }

    // Stand in for the platform's inquiry scan: report Alice to Bob.
    tokio::time::sleep(Duration::from_millis(200)).await;
    bob.commands
        .send(SessionCommand::CandidateFound {
            name: "Alice's phone".to_string(),
            address: RadioAddress::new("aa:aa"),
        })
        .expect("runtime alive");

    loop {
        match bob.app_events.recv().await {
            Some(AppEvent::ConnectingTo { name }) => println!("connecting to {name}…"),
            Some(AppEvent::SearchingRemote) => println!("searching via server…"),
            Some(AppEvent::PeerFound(record)) => {
                println!(
                    "found peer: {} ({})",
                    record.display_name(),
                    record.payment_address()
                );
                break;
            }
            None => break,
        }
    }

    alice.commands.send(SessionCommand::Shutdown).ok();
    bob.commands.send(SessionCommand::Shutdown).ok();
}
