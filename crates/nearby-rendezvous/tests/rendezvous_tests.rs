//! Integration tests for the rendezvous worker
//!
//! The rendezvous service is mocked with wiremock; location fixes come from
//! an in-process channel source. These tests exercise the whole remote path:
//! registration, search, result decoding, rate limiting, and the best-effort
//! unregister on shutdown.

use std::sync::Arc;
use std::time::Duration;

use nearby_core::location::ChannelLocationSource;
use nearby_core::photo::AssetStore;
use nearby_core::profile::{ProfileStore, StaticProfileStore, UserProfile};
use nearby_core::{
    event_channel, DiscoveryEvent, EventReceiver, LocationFix, RendezvousConfig, Timestamp,
};
use nearby_rendezvous::RendezvousWorker;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_DEADLINE: Duration = Duration::from_secs(10);

fn test_config(server: &MockServer, window: Duration) -> RendezvousConfig {
    RendezvousConfig {
        endpoint: format!("{}/location", server.uri()),
        network: "bitcoin".to_string(),
        min_activity_interval: window,
        http_timeout: Duration::from_secs(5),
    }
}

fn fix(latitude: f64, longitude: f64) -> LocationFix {
    LocationFix {
        provider: "gps".to_string(),
        timestamp: Timestamp::new(1_000_000),
        accuracy: 25.0,
        latitude,
        longitude,
    }
}

struct Harness {
    worker: RendezvousWorker,
    events: EventReceiver,
    fixes: mpsc::UnboundedSender<LocationFix>,
    _assets: tempfile::TempDir,
}

fn spawn_worker(server: &MockServer, window: Duration, profile: Option<UserProfile>) -> Harness {
    let assets = tempfile::tempdir().unwrap();
    let profile_store: Arc<dyn ProfileStore> = match profile {
        Some(profile) => Arc::new(StaticProfileStore::new(profile)),
        None => Arc::new(StaticProfileStore::unconfigured()),
    };
    let (fixes, source) = ChannelLocationSource::new();
    let (events_tx, events) = event_channel();

    let worker = RendezvousWorker::spawn(
        test_config(server, window),
        "1AliceAddress",
        profile_store,
        Arc::new(AssetStore::open(assets.path()).unwrap()),
        Arc::new(source),
        events_tx,
    );

    Harness {
        worker,
        events,
        fixes,
        _assets: assets,
    }
}

fn alice_profile() -> UserProfile {
    UserProfile {
        display_name: "Alice".to_string(),
        photo_path: None,
    }
}

async fn next_event(events: &mut EventReceiver) -> DiscoveryEvent {
    timeout(TEST_DEADLINE, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

#[tokio::test]
async fn register_and_search_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/location"))
        .and(body_partial_json(json!({
            "address": "1AliceAddress",
            "name": "Alice",
            "email": "",
            "network": "bitcoin",
            "lat": 52.0,
            "lon": 4.0,
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/location"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [{"name": "Bob", "email": "", "address": "1BobAddress"}],
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/location"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut harness = spawn_worker(&server, Duration::from_secs(8), Some(alice_profile()));
    harness.fixes.send(fix(52.0, 4.0)).unwrap();

    assert!(matches!(
        next_event(&mut harness.events).await,
        DiscoveryEvent::Searching
    ));
    match next_event(&mut harness.events).await {
        DiscoveryEvent::PeerDiscovered(record) => {
            assert_eq!(record.payment_address(), "1BobAddress");
            assert_eq!(record.display_name(), "Bob");
            assert!(record.radio_address().is_none());
        }
        other => panic!("expected PeerDiscovered, got {other:?}"),
    }

    harness.worker.shutdown();
    timeout(TEST_DEADLINE, harness.worker.join()).await.unwrap();
}

#[tokio::test]
async fn cycles_inside_the_window_are_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let harness = spawn_worker(&server, Duration::from_secs(2), Some(alice_profile()));

    // A burst of fixes inside the window must produce exactly one outbound
    // register/search pair.
    harness.fixes.send(fix(52.0, 4.0)).unwrap();
    harness.fixes.send(fix(52.0, 4.0)).unwrap();
    harness.fixes.send(fix(52.0, 4.0)).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    harness.worker.shutdown();
    timeout(TEST_DEADLINE, harness.worker.join()).await.unwrap();
}

#[tokio::test]
async fn rescheduled_cycle_fires_after_the_window() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let harness = spawn_worker(&server, Duration::from_millis(200), Some(alice_profile()));

    // The second fix lands inside the window and must be rescheduled, not
    // dropped: two pairs total once the window has elapsed.
    harness.fixes.send(fix(52.0, 4.0)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.fixes.send(fix(52.0, 4.0)).unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    harness.worker.shutdown();
    timeout(TEST_DEADLINE, harness.worker.join()).await.unwrap();
}

#[tokio::test]
async fn failed_registration_does_not_suppress_search() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [{"name": "Bob", "email": "", "address": "1BobAddress"}],
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut harness = spawn_worker(&server, Duration::from_secs(8), Some(alice_profile()));
    harness.fixes.send(fix(52.0, 4.0)).unwrap();

    assert!(matches!(
        next_event(&mut harness.events).await,
        DiscoveryEvent::Searching
    ));
    assert!(matches!(
        next_event(&mut harness.events).await,
        DiscoveryEvent::PeerDiscovered(_)
    ));

    harness.worker.shutdown();
}

#[tokio::test]
async fn malformed_search_rows_are_skipped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [{"name": "Bob", "email": "", "address": "1BobAddress"}],
            [{"name": "NoAddress"}],
            "not even an array",
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut harness = spawn_worker(&server, Duration::from_secs(8), Some(alice_profile()));
    harness.fixes.send(fix(52.0, 4.0)).unwrap();

    assert!(matches!(
        next_event(&mut harness.events).await,
        DiscoveryEvent::Searching
    ));
    match next_event(&mut harness.events).await {
        DiscoveryEvent::PeerDiscovered(record) => {
            assert_eq!(record.payment_address(), "1BobAddress");
        }
        other => panic!("expected PeerDiscovered, got {other:?}"),
    }

    // The two malformed rows produced nothing.
    harness.worker.shutdown();
    timeout(TEST_DEADLINE, harness.worker.join()).await.unwrap();
    assert!(harness.events.try_recv().is_err());
}

#[tokio::test]
async fn missing_profile_is_fail_soft() {
    let server = MockServer::start().await;

    let harness = spawn_worker(&server, Duration::from_secs(8), None);

    // The worker exits immediately without touching the network.
    timeout(TEST_DEADLINE, harness.worker.join()).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}
