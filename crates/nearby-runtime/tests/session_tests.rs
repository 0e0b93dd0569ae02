//! Deterministic tests for the discovery session policy
//!
//! The clock is manual and the scan control records every start/stop, so
//! each property of the scheduling policy can be pinned down exactly.

use std::sync::Arc;
use std::time::Duration;

use nearby_core::types::ManualTimeSource;
use nearby_core::{DiscoveryEvent, PeerRecord, RadioAddress, SessionConfig};
use nearby_runtime::{DiscoverySession, ScanControl};

#[derive(Debug, Default)]
struct RecordingScan {
    scanning: bool,
    starts: u32,
    stops: u32,
}

impl ScanControl for RecordingScan {
    fn is_scanning(&self) -> bool {
        self.scanning
    }

    fn start_scan(&mut self) {
        self.scanning = true;
        self.starts += 1;
    }

    fn stop_scan(&mut self) {
        self.scanning = false;
        self.stops += 1;
    }
}

fn test_config() -> SessionConfig {
    SessionConfig {
        candidate_recheck_interval: Duration::from_secs(10),
        cooloff_interval: Duration::from_secs(3),
        // No jitter so cooloff expiry is exact.
        cooloff_jitter: Duration::ZERO,
    }
}

fn ready_session() -> (DiscoverySession, RecordingScan, ManualTimeSource) {
    let clock = ManualTimeSource::new(1_000_000);
    let mut session = DiscoverySession::new(test_config(), Arc::new(clock.clone()));
    let mut scan = RecordingScan::default();
    session.activate(&mut scan);
    session.set_radio_ready(true, &mut scan);
    (session, scan, clock)
}

/// Inbound records come from the codec; round-trip through it to get one
/// carrying a radio address.
fn radio_record(address: &str) -> DiscoveryEvent {
    let outbound = PeerRecord::outbound("1PeerAddress", "Peer", None);
    let frame = nearby_core::wire::encode_frame(&outbound).unwrap();
    let record =
        nearby_core::wire::decode_body(&frame[4..], Some(RadioAddress::new(address))).unwrap();
    DiscoveryEvent::PeerDiscovered(record)
}

#[test]
fn scanning_starts_once_all_conditions_hold() {
    let clock = ManualTimeSource::new(0);
    let mut session = DiscoverySession::new(test_config(), Arc::new(clock));
    let mut scan = RecordingScan::default();

    session.activate(&mut scan);
    assert_eq!(scan.starts, 0); // radio not ready yet

    session.set_radio_ready(true, &mut scan);
    assert_eq!(scan.starts, 1);
    assert!(scan.scanning);
}

#[test]
fn recomputation_is_edge_triggered() {
    let (mut session, mut scan, _clock) = ready_session();
    assert_eq!(scan.starts, 1);

    // Heartbeats while the predicate stays true must not re-issue starts.
    for _ in 0..5 {
        session.handle_event(&DiscoveryEvent::Heartbeat, &mut scan);
    }
    assert_eq!(scan.starts, 1);
    assert_eq!(scan.stops, 0);
}

#[test]
fn busy_worker_suspends_scanning() {
    let (mut session, mut scan, _clock) = ready_session();

    session.handle_event(&DiscoveryEvent::Busy, &mut scan);
    assert_eq!(scan.stops, 1);
    assert!(!scan.scanning);

    session.handle_event(&DiscoveryEvent::NotBusy, &mut scan);
    assert_eq!(scan.starts, 2);
    assert!(scan.scanning);
}

#[test]
fn heartbeat_ends_the_cooloff_window() {
    let (mut session, mut scan, clock) = ready_session();

    session.scan_finished(&mut scan);
    assert!(!scan.scanning); // cooloff suppresses scanning

    // Still inside the window: the tick changes nothing.
    clock.advance(2_999);
    session.handle_event(&DiscoveryEvent::Heartbeat, &mut scan);
    assert!(!scan.scanning);

    // Window elapsed: the next tick restarts scanning with no other signal.
    clock.advance(2);
    session.handle_event(&DiscoveryEvent::Heartbeat, &mut scan);
    assert!(scan.scanning);
    assert_eq!(scan.starts, 2);
}

#[test]
fn deactivation_stops_scanning() {
    let (mut session, mut scan, _clock) = ready_session();
    assert!(scan.scanning);

    session.deactivate(&mut scan);
    assert!(!scan.scanning);
    assert!(!session.should_scan());
}

#[test]
fn candidate_is_admitted_once_per_recheck_interval() {
    let (mut session, mut scan, clock) = ready_session();
    let address = RadioAddress::new("aa:aa");

    assert!(session.admit_candidate(&address, &mut scan));
    assert!(!session.admit_candidate(&address, &mut scan));

    clock.advance(9_999);
    assert!(!session.admit_candidate(&address, &mut scan));

    clock.advance(1);
    assert!(session.admit_candidate(&address, &mut scan));
}

#[test]
fn admission_marks_the_worker_busy_preemptively() {
    let (mut session, mut scan, _clock) = ready_session();
    assert!(scan.scanning);

    assert!(session.admit_candidate(&RadioAddress::new("aa:aa"), &mut scan));
    assert!(!session.should_scan());
    assert!(!scan.scanning);
}

#[test]
fn exchanged_peers_are_excluded_for_the_session() {
    let (mut session, mut scan, clock) = ready_session();
    let address = RadioAddress::new("aa:aa");

    session.handle_event(&radio_record("aa:aa"), &mut scan);
    assert!(!session.admit_candidate(&address, &mut scan));

    // Not even after the recheck interval.
    clock.advance(60_000);
    assert!(!session.admit_candidate(&address, &mut scan));
}

#[test]
fn rendezvous_peers_do_not_block_radio_candidates() {
    let (mut session, mut scan, _clock) = ready_session();

    // A record without a radio address (remote path) must not poison the
    // successful-peer set.
    let record = PeerRecord::outbound("1PeerAddress", "Peer", None);
    session.handle_event(&DiscoveryEvent::PeerDiscovered(record), &mut scan);

    assert!(session.admit_candidate(&RadioAddress::new("aa:aa"), &mut scan));
}
