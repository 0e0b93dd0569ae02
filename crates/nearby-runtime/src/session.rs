//! The discovery scheduling policy
//!
//! `shouldScan = active && radioReady && !workerBusy && !inCooloff`,
//! recomputed on every relevant signal and applied edge-triggered: the radio
//! only sees a start when the predicate flips to true and a stop when it
//! flips to false, never redundant calls.
//!
//! The cooloff window after each scan cycle carries random jitter so nearby
//! devices running the same app desynchronize their scan cycles instead of
//! stepping on each other forever.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use nearby_core::{DiscoveryEvent, RadioAddress, SessionConfig, TimeSource, Timestamp};
use rand::Rng;
use tracing::debug;

use crate::scan::ScanControl;

// ----------------------------------------------------------------------------
// Discovery Session
// ----------------------------------------------------------------------------

/// Coordinator state for one discovery session.
///
/// Pure policy: every method runs on the caller's (presentation) context and
/// only talks to the radio through the [`ScanControl`] passed in.
pub struct DiscoverySession {
    config: SessionConfig,
    clock: Arc<dyn TimeSource>,
    active: bool,
    radio_ready: bool,
    worker_busy: bool,
    cooloff_until: Option<Timestamp>,
    seen_candidates: HashMap<RadioAddress, Timestamp>,
    successful_peers: HashSet<RadioAddress>,
}

impl DiscoverySession {
    pub fn new(config: SessionConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            clock,
            active: false,
            radio_ready: false,
            worker_busy: false,
            cooloff_until: None,
            seen_candidates: HashMap::new(),
            successful_peers: HashSet::new(),
        }
    }

    /// The session entered the foreground
    pub fn activate(&mut self, scan: &mut dyn ScanControl) {
        self.active = true;
        self.manage(scan);
    }

    /// The session left the foreground; scanning stops unconditionally
    pub fn deactivate(&mut self, scan: &mut dyn ScanControl) {
        self.active = false;
        self.manage(scan);
    }

    /// Radio hardware became (un)available for scanning
    pub fn set_radio_ready(&mut self, ready: bool, scan: &mut dyn ScanControl) {
        self.radio_ready = ready;
        self.manage(scan);
    }

    /// Feed one worker event through the policy
    pub fn handle_event(&mut self, event: &DiscoveryEvent, scan: &mut dyn ScanControl) {
        match event {
            DiscoveryEvent::Busy => {
                self.worker_busy = true;
                self.manage(scan);
            }
            DiscoveryEvent::NotBusy => {
                self.worker_busy = false;
                self.manage(scan);
            }
            DiscoveryEvent::Heartbeat => self.manage(scan),
            DiscoveryEvent::PeerDiscovered(record) => {
                if let Some(address) = record.radio_address() {
                    self.successful_peers.insert(address.clone());
                }
            }
            DiscoveryEvent::Searching => {}
        }
    }

    /// A scan cycle completed; take a pause before the next one
    pub fn scan_finished(&mut self, scan: &mut dyn ScanControl) {
        let jitter_ms = self.config.cooloff_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ms)
        };
        let until = self
            .clock
            .now()
            .add_millis(self.config.cooloff_interval.as_millis() as u64 + jitter);

        self.cooloff_until = Some(until);
        self.manage(scan);
    }

    /// Decide whether a discovered candidate should be dialed.
    ///
    /// Rejected when the address has already been exchanged with this
    /// session, or when the last attempt is fresher than the recheck
    /// interval. Admission records the attempt and marks the worker busy
    /// preemptively — its own busy signal arrives through the queue later.
    pub fn admit_candidate(&mut self, address: &RadioAddress, scan: &mut dyn ScanControl) -> bool {
        if self.successful_peers.contains(address) {
            return false;
        }

        let now = self.clock.now();
        if let Some(last_attempt) = self.seen_candidates.get(address) {
            let recheck_ms = self.config.candidate_recheck_interval.as_millis() as u64;
            if now.millis_since(*last_attempt) < recheck_ms {
                return false;
            }
        }

        debug!(%address, "admitting candidate");
        self.seen_candidates.insert(address.clone(), now);
        self.worker_busy = true;
        self.manage(scan);
        true
    }

    /// Whether scanning should currently be running
    pub fn should_scan(&self) -> bool {
        self.active && self.radio_ready && !self.worker_busy && !self.in_cooloff()
    }

    fn in_cooloff(&self) -> bool {
        self.cooloff_until
            .is_some_and(|until| self.clock.now() < until)
    }

    /// Apply `should_scan` edge-triggered against the radio
    fn manage(&mut self, scan: &mut dyn ScanControl) {
        let should = self.should_scan();
        if should && !scan.is_scanning() {
            debug!("starting radio scan");
            scan.start_scan();
        } else if !should && scan.is_scanning() {
            debug!("stopping radio scan");
            scan.stop_scan();
        }
    }
}
