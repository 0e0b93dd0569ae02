//! The rendezvous worker
//!
//! Binds to a location-fix stream and, on each fix, registers with and
//! searches the rendezvous service — at most once per rate-limit window. A
//! cycle requested inside the window is rescheduled for when the window
//! elapses rather than dropped, so a burst of fixes still produces exactly
//! one trailing cycle.

use std::sync::Arc;

use nearby_core::location::{is_better_fix, LocationSource};
use nearby_core::photo::PhotoStore;
use nearby_core::profile::ProfileStore;
use nearby_core::{DiscoveryEvent, EventSender, LocationFix, PeerRecord, RendezvousConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::RendezvousClient;

// ----------------------------------------------------------------------------
// Worker Handle
// ----------------------------------------------------------------------------

/// Handle to a running rendezvous worker
pub struct RendezvousWorker {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RendezvousWorker {
    /// Spawn the worker.
    ///
    /// Startup is fail-soft: a missing discovery profile or an unavailable
    /// location source is logged and the worker simply does not run — no
    /// retries, no error surfaced to the caller.
    pub fn spawn(
        config: RendezvousConfig,
        payment_address: impl Into<String>,
        profile_store: Arc<dyn ProfileStore>,
        photo_store: Arc<dyn PhotoStore>,
        location_source: Arc<dyn LocationSource>,
        events: EventSender,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let payment_address = payment_address.into();

        let task = tokio::spawn(run(
            config,
            payment_address,
            profile_store,
            photo_store,
            location_source,
            events,
            stop_rx,
        ));

        Self {
            stop: stop_tx,
            task,
        }
    }

    /// Stop the fix stream, unregister best-effort, and terminate the loop.
    /// Subsequent calls are no-ops.
    pub fn shutdown(&self) {
        let _ = self.stop.send(true);
    }

    /// Wait for the worker loop to finish
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

// ----------------------------------------------------------------------------
// Worker Loop
// ----------------------------------------------------------------------------

async fn run(
    config: RendezvousConfig,
    payment_address: String,
    profile_store: Arc<dyn ProfileStore>,
    photo_store: Arc<dyn PhotoStore>,
    location_source: Arc<dyn LocationSource>,
    events: EventSender,
    mut stop: watch::Receiver<bool>,
) {
    let Some(profile) = profile_store.load() else {
        warn!("unable to look up user details for rendezvous search, worker is shutting down");
        return;
    };
    let record = PeerRecord::for_local_user(&payment_address, &profile);

    let client = match RendezvousClient::new(&config) {
        Ok(client) => client,
        Err(err) => {
            warn!(%err, "unable to build rendezvous client, worker is shutting down");
            return;
        }
    };

    let mut fixes = match location_source.subscribe().await {
        Ok(fixes) => fixes,
        Err(err) => {
            warn!(%err, "location source not available, worker is shutting down");
            return;
        }
    };

    let mut cycle = Cycle {
        client: &client,
        config: &config,
        record: &record,
        photo_store: &*photo_store,
        events: &events,
        best_fix: None,
        last_activity: None,
        retry_at: None,
    };

    loop {
        let retry_at = cycle.retry_at;
        tokio::select! {
            fix = fixes.recv() => match fix {
                Some(fix) => {
                    if is_better_fix(&fix, cycle.best_fix.as_ref()) {
                        cycle.best_fix = Some(fix);
                    }
                    cycle.register_and_search().await;
                }
                None => {
                    debug!("location fix stream ended");
                    break;
                }
            },
            _ = maybe_sleep_until(retry_at) => {
                cycle.retry_at = None;
                cycle.register_and_search().await;
            }
            _ = stop.changed() => break,
        }
    }

    // Dropping the receiver detaches from the location source; then tell the
    // service we are gone. Failure is ignored.
    drop(fixes);
    if let Err(err) = client.unregister().await {
        warn!(%err, "unable to unregister from rendezvous service");
    }
    debug!("rendezvous worker stopped");
}

/// Sleep until the given instant, or forever when there is none.
async fn maybe_sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct Cycle<'a> {
    client: &'a RendezvousClient,
    config: &'a RendezvousConfig,
    record: &'a PeerRecord,
    photo_store: &'a dyn PhotoStore,
    events: &'a EventSender,
    best_fix: Option<LocationFix>,
    last_activity: Option<Instant>,
    retry_at: Option<Instant>,
}

impl Cycle<'_> {
    /// One register/search pair, rate-limited to the configured window.
    ///
    /// Invoked again before the window elapses, the cycle reschedules itself
    /// for the remaining time instead of dropping the request. Both HTTP
    /// steps treat failure as routine: log, skip, continue on the next fix.
    async fn register_and_search(&mut self) {
        let Some(fix) = self.best_fix.clone() else {
            return;
        };

        if let Some(last) = self.last_activity {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_activity_interval {
                self.retry_at = Some(Instant::now() + (self.config.min_activity_interval - elapsed));
                return;
            }
        }

        info!("registering with rendezvous service");
        self.last_activity = Some(Instant::now());
        if let Err(err) = self.client.register(self.record, &fix).await {
            warn!(%err, "unable to register with rendezvous service");
        }

        info!("searching via rendezvous service");
        self.last_activity = Some(Instant::now());
        let _ = self.events.send(DiscoveryEvent::Searching);
        match self.client.search(self.record, &fix).await {
            Ok(records) => {
                for mut record in records {
                    record.materialize_photo(self.photo_store);
                    let _ = self.events.send(DiscoveryEvent::PeerDiscovered(record));
                }
            }
            Err(err) => warn!(%err, "unable to search rendezvous service"),
        }
    }
}
