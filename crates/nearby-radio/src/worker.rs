//! The radio discovery worker
//!
//! A long-lived background worker owning a single-consumer FIFO command
//! queue. Three loops run for the lifetime of the worker: the command loop
//! (which exclusively owns the advertising listener handle and the activity
//! gauge), the dial loop (which connects to discovered candidates), and the
//! heartbeat loop. A fourth loop, the advertise loop, is spawned per
//! become-visible command and torn down on become-invisible.
//!
//! No loop ever terminates on an I/O error; one unreachable or misbehaving
//! peer only costs its own exchange. The only way out is [`RadioWorker::shutdown`].

use std::sync::Arc;
use std::time::Duration;

use nearby_core::photo::PhotoStore;
use nearby_core::profile::ProfileStore;
use nearby_core::{
    wire, DiscoveryEvent, EventSender, PeerRecord, RadioAddress, RadioCommand, RadioConfig,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::{RadioListener, RadioTransport};
use crate::{RadioError, Result};

// ----------------------------------------------------------------------------
// Worker Handle
// ----------------------------------------------------------------------------

/// Handle to a running radio discovery worker.
///
/// All methods enqueue commands and return immediately; the queue is FIFO
/// and single-consumer. Every method is safe to call after shutdown (it
/// becomes a no-op).
pub struct RadioWorker {
    commands: mpsc::UnboundedSender<RadioCommand>,
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RadioWorker {
    /// Spawn the worker loops and return the handle.
    ///
    /// The outbound record is assembled lazily from the profile store on the
    /// first become-visible command; a device without a configured profile
    /// never advertises but can still dial candidates.
    pub fn spawn<T: RadioTransport>(
        transport: Arc<T>,
        payment_address: impl Into<String>,
        profile_store: Arc<dyn ProfileStore>,
        photo_store: Arc<dyn PhotoStore>,
        config: RadioConfig,
        events: EventSender,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (candidates_tx, candidates_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let command_loop = CommandLoop {
            transport: Arc::clone(&transport),
            payment_address: payment_address.into(),
            profile_store,
            config: config.clone(),
            events: events.clone(),
            commands_tx: commands_tx.clone(),
            candidates_tx,
            gauge: ActivityGauge::default(),
            outbound: None,
            advertiser: None,
        };

        let tasks = vec![
            tokio::spawn(command_loop.run(commands_rx, stop_rx.clone())),
            tokio::spawn(dial_loop(
                transport,
                candidates_rx,
                commands_tx.clone(),
                events.clone(),
                photo_store,
                config.clone(),
                stop_rx.clone(),
            )),
            tokio::spawn(heartbeat_loop(
                events,
                config.heartbeat_interval,
                stop_rx,
            )),
        ];

        Self {
            commands: commands_tx,
            stop: stop_tx,
            tasks,
        }
    }

    /// Start advertising. A no-op while already advertising.
    pub fn become_visible(&self) {
        let _ = self.commands.send(RadioCommand::BecomeVisible);
    }

    /// Stop advertising. A no-op while not advertising.
    pub fn become_invisible(&self) {
        let _ = self.commands.send(RadioCommand::BecomeInvisible);
    }

    /// Enqueue a dial attempt to a discovered candidate.
    ///
    /// Duplicates are not filtered here; the coordinator rate-limits before
    /// calling this.
    pub fn add_candidate(&self, address: RadioAddress) {
        let _ = self.commands.send(RadioCommand::AddCandidate(address));
    }

    /// Stop accepting, cancel in-flight work, and terminate all loops.
    /// Subsequent calls are no-ops.
    pub fn shutdown(&self) {
        let _ = self.stop.send(true);
        let _ = self.commands.send(RadioCommand::Shutdown);
    }

    /// Wait for every worker loop to finish
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

// ----------------------------------------------------------------------------
// Activity Gauge
// ----------------------------------------------------------------------------

/// Counter of concurrently in-flight exchanges.
///
/// Only zero crossings emit a signal, so overlapping exchanges produce one
/// `Busy`/`NotBusy` pair instead of one per exchange.
#[derive(Debug, Default)]
struct ActivityGauge {
    level: i32,
    busy: bool,
}

impl ActivityGauge {
    fn increment(&mut self) -> Option<DiscoveryEvent> {
        self.level += 1;
        self.check()
    }

    fn decrement(&mut self) -> Option<DiscoveryEvent> {
        self.level -= 1;
        self.check()
    }

    fn check(&mut self) -> Option<DiscoveryEvent> {
        if !self.busy && self.level > 0 {
            self.busy = true;
            Some(DiscoveryEvent::Busy)
        } else if self.busy && self.level == 0 {
            self.busy = false;
            Some(DiscoveryEvent::NotBusy)
        } else {
            None
        }
    }
}

// ----------------------------------------------------------------------------
// Command Loop
// ----------------------------------------------------------------------------

struct Advertiser {
    handle: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

struct CommandLoop<T: RadioTransport> {
    transport: Arc<T>,
    payment_address: String,
    profile_store: Arc<dyn ProfileStore>,
    config: RadioConfig,
    events: EventSender,
    commands_tx: mpsc::UnboundedSender<RadioCommand>,
    candidates_tx: mpsc::UnboundedSender<RadioAddress>,
    gauge: ActivityGauge,
    outbound: Option<PeerRecord>,
    advertiser: Option<Advertiser>,
}

impl<T: RadioTransport> CommandLoop<T> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<RadioCommand>,
        mut stop: watch::Receiver<bool>,
    ) {
        loop {
            let command = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
                _ = stop.changed() => break,
            };

            match command {
                RadioCommand::BecomeVisible => self.handle_become_visible(),
                RadioCommand::BecomeInvisible => self.cancel_advertiser(),
                RadioCommand::AddCandidate(address) => {
                    let _ = self.candidates_tx.send(address);
                }
                RadioCommand::ActivityInc => {
                    if let Some(event) = self.gauge.increment() {
                        let _ = self.events.send(event);
                    }
                }
                RadioCommand::ActivityDec => {
                    if let Some(event) = self.gauge.decrement() {
                        let _ = self.events.send(event);
                    }
                }
                RadioCommand::Shutdown => break,
            }
        }

        // Tear down advertising and wait for the loop to unwind so the
        // listening endpoint is really closed when join() returns.
        if let Some(advertiser) = self.advertiser.take() {
            let _ = advertiser.cancel.send(true);
            let _ = advertiser.handle.await;
        }
        debug!("radio worker command loop stopped");
    }

    fn handle_become_visible(&mut self) {
        if let Some(advertiser) = &self.advertiser {
            if !advertiser.handle.is_finished() {
                return; // already advertising
            }
        }
        self.cancel_advertiser();

        if self.outbound.is_none() {
            match self.profile_store.load() {
                Some(profile) => {
                    self.outbound =
                        Some(PeerRecord::for_local_user(&self.payment_address, &profile));
                }
                None => {
                    warn!("unable to look up user details for broadcasting");
                    return;
                }
            }
        }
        let Some(record) = self.outbound.clone() else {
            return;
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(advertise_loop(
            Arc::clone(&self.transport),
            record,
            self.commands_tx.clone(),
            self.config.clone(),
            cancel_rx,
        ));
        self.advertiser = Some(Advertiser {
            handle,
            cancel: cancel_tx,
        });
    }

    fn cancel_advertiser(&mut self) {
        if let Some(advertiser) = self.advertiser.take() {
            let _ = advertiser.cancel.send(true);
        }
    }
}

// ----------------------------------------------------------------------------
// Advertise Loop
// ----------------------------------------------------------------------------

/// Serve inbound exchanges until cancelled.
///
/// The listener is closed while a connection is being served, so at most one
/// exchange runs at a time; it is re-armed after every served connection and
/// after every failure. Failures back off exponentially from the initial
/// delay to the ceiling.
async fn advertise_loop<T: RadioTransport>(
    transport: Arc<T>,
    record: PeerRecord,
    commands: mpsc::UnboundedSender<RadioCommand>,
    config: RadioConfig,
    mut cancel: watch::Receiver<bool>,
) {
    let frame = match wire::encode_frame(&record) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(%err, "unable to encode outbound record, not advertising");
            return;
        }
    };

    let mut backoff = config.initial_backoff;
    loop {
        if *cancel.borrow() {
            break;
        }

        let listener = tokio::select! {
            listener = transport.listen() => listener,
            _ = cancel.changed() => break,
        };
        let mut listener = match listener {
            Ok(listener) => listener,
            Err(err) => {
                if *cancel.borrow() {
                    break;
                }
                debug!(%err, "unable to open listening endpoint");
                if !pause(&mut backoff, config.max_backoff, &mut cancel).await {
                    break;
                }
                continue;
            }
        };

        debug!("listening for inbound exchanges");
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = cancel.changed() => break,
        };
        // Stop listening while we serve this connection.
        drop(listener);

        match accepted {
            Ok((stream, peer)) => {
                backoff = config.initial_backoff;
                let _ = commands.send(RadioCommand::ActivityInc);
                serve_exchange(stream, &frame, config.exchange_timeout, &peer).await;
                let _ = commands.send(RadioCommand::ActivityDec);
            }
            Err(err) => {
                if *cancel.borrow() {
                    break;
                }
                debug!(%err, "error while listening for inbound connections");
                if !pause(&mut backoff, config.max_backoff, &mut cancel).await {
                    break;
                }
            }
        }
    }
    debug!("advertise loop stopped");
}

/// Sleep for the current backoff, then double it up to the ceiling.
/// Returns `false` when cancelled mid-sleep.
async fn pause(
    backoff: &mut Duration,
    ceiling: Duration,
    cancel: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(*backoff) => {
            *backoff = (*backoff * 2).min(ceiling);
            true
        }
        _ = cancel.changed() => false,
    }
}

/// Send the local record, then wait for the peer to close its side.
///
/// The trailing read exists to detect peer-side completion: closing our end
/// right after the write races the peer's read on some radio stacks.
async fn serve_exchange<S>(mut stream: S, frame: &[u8], limit: Duration, peer: &RadioAddress)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(%peer, "sending contact data");
    let exchange = async {
        stream.write_all(frame).await?;
        stream.flush().await?;

        let mut scratch = [0u8; 1];
        let _ = stream.read(&mut scratch).await;
        std::io::Result::Ok(())
    };

    match tokio::time::timeout(limit, exchange).await {
        Ok(Ok(())) => debug!(%peer, "served inbound exchange"),
        Ok(Err(err)) => debug!(%peer, %err, "giving up on inbound exchange"),
        Err(_) => debug!(%peer, "inbound exchange timed out"),
    }
    // Dropping the stream closes the connection on all paths.
}

// ----------------------------------------------------------------------------
// Dial Loop
// ----------------------------------------------------------------------------

/// Pull candidates one at a time and read exactly one contact frame from
/// each. Any failure is "peer unreachable, skip" — never retried, never
/// fatal to the loop.
async fn dial_loop<T: RadioTransport>(
    transport: Arc<T>,
    mut candidates: mpsc::UnboundedReceiver<RadioAddress>,
    commands: mpsc::UnboundedSender<RadioCommand>,
    events: EventSender,
    photo_store: Arc<dyn PhotoStore>,
    config: RadioConfig,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let address = tokio::select! {
            address = candidates.recv() => match address {
                Some(address) => address,
                None => break,
            },
            _ = stop.changed() => break,
        };

        debug!(%address, "attempting connection");
        let _ = commands.send(RadioCommand::ActivityInc);

        match fetch_record(&*transport, &address, config.exchange_timeout).await {
            Ok(mut record) => {
                info!(%address, name = record.display_name(), "received contact data");
                record.materialize_photo(&*photo_store);
                let _ = events.send(DiscoveryEvent::PeerDiscovered(record));
            }
            Err(err) => debug!(%address, %err, "peer unreachable, skipping"),
        }

        let _ = commands.send(RadioCommand::ActivityDec);
    }
    debug!("dial loop stopped");
}

async fn fetch_record<T: RadioTransport>(
    transport: &T,
    address: &RadioAddress,
    limit: Duration,
) -> Result<PeerRecord> {
    let exchange = async {
        let mut stream = transport.connect(address).await?;
        let record = wire::read_frame(&mut stream, Some(address.clone())).await?;
        Ok::<_, RadioError>(record)
    };

    tokio::time::timeout(limit, exchange)
        .await
        .map_err(|_| RadioError::ExchangeTimeout)?
}

// ----------------------------------------------------------------------------
// Heartbeat Loop
// ----------------------------------------------------------------------------

/// Tick once per interval for the lifetime of the worker. The coordinator
/// uses the tick to re-evaluate scanning, which is what ends a cooloff
/// window even when nothing else happens.
async fn heartbeat_loop(
    events: EventSender,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if events.send(DiscoveryEvent::Heartbeat).is_err() {
                    break;
                }
            }
            _ = stop.changed() => break,
        }
    }
    debug!("heartbeat loop stopped");
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
