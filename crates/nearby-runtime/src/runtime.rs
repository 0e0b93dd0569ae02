//! The discovery runtime
//!
//! One task plays the role of the presentation context: it pumps worker
//! events through the session policy, executes platform commands, and
//! forwards confirmed peers to the UI channel. Workers live on their own
//! tasks; this loop never blocks on I/O.

use std::sync::Arc;

use nearby_core::contacts::{AddressBook, AddressBookEntry};
use nearby_core::{DiscoveryEvent, EventReceiver, PeerRecord, RadioAddress, SessionConfig, TimeSource};
use nearby_radio::RadioWorker;
use nearby_rendezvous::RendezvousWorker;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::roster::PeerRoster;
use crate::scan::ScanControl;
use crate::session::DiscoverySession;

// ----------------------------------------------------------------------------
// Commands and App Events
// ----------------------------------------------------------------------------

/// Commands from the platform/UI layer into the runtime
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// The discovery screen entered the foreground
    Activate,
    /// The discovery screen left the foreground
    Deactivate,
    /// Radio hardware became (un)available for scanning
    RadioReady(bool),
    /// The platform's inquiry scan discovered a candidate device
    CandidateFound { name: String, address: RadioAddress },
    /// The platform's inquiry scan cycle completed
    ScanFinished,
    /// Tear the whole session down
    Shutdown,
}

/// Events delivered to the presenting UI
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A new (or refreshed) peer to show
    PeerFound(PeerRecord),
    /// The remote path is querying the rendezvous service
    SearchingRemote,
    /// A candidate dial was admitted; show "connecting to {name}"
    ConnectingTo { name: String },
}

/// Channel endpoints the platform layer keeps after starting the runtime
pub struct RuntimeHandles {
    pub commands: mpsc::UnboundedSender<SessionCommand>,
    pub app_events: mpsc::UnboundedReceiver<AppEvent>,
}

// ----------------------------------------------------------------------------
// Discovery Runtime
// ----------------------------------------------------------------------------

/// Wires the workers, the session policy, and the UI channel together
pub struct DiscoveryRuntime<S: ScanControl> {
    session: DiscoverySession,
    roster: PeerRoster,
    scan: S,
    radio: Option<RadioWorker>,
    rendezvous: Option<RendezvousWorker>,
    address_book: Option<Arc<dyn AddressBook>>,
    events: EventReceiver,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    app_events: mpsc::UnboundedSender<AppEvent>,
}

impl<S: ScanControl> DiscoveryRuntime<S> {
    /// Build the runtime around already-spawned workers.
    ///
    /// `events` must be the receiving end of the channel the workers were
    /// spawned with. A transport that is unavailable this session is simply
    /// passed as `None`.
    pub fn new(
        scan: S,
        config: SessionConfig,
        clock: Arc<dyn TimeSource>,
        radio: Option<RadioWorker>,
        rendezvous: Option<RendezvousWorker>,
        address_book: Option<Arc<dyn AddressBook>>,
        events: EventReceiver,
    ) -> (Self, RuntimeHandles) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (app_events_tx, app_events_rx) = mpsc::unbounded_channel();

        let runtime = Self {
            session: DiscoverySession::new(config, clock),
            roster: PeerRoster::new(),
            scan,
            radio,
            rendezvous,
            address_book,
            events,
            commands: commands_rx,
            app_events: app_events_tx,
        };
        let handles = RuntimeHandles {
            commands: commands_tx,
            app_events: app_events_rx,
        };
        (runtime, handles)
    }

    /// Run until shutdown, then tear the workers down
    pub async fn run(mut self) {
        info!("discovery runtime started");
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_worker_event(event),
                    None => break,
                },
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
            }
        }

        if let Some(radio) = self.radio.take() {
            radio.shutdown();
            radio.join().await;
        }
        if let Some(rendezvous) = self.rendezvous.take() {
            rendezvous.shutdown();
            rendezvous.join().await;
        }
        info!("discovery runtime stopped");
    }

    fn handle_worker_event(&mut self, event: DiscoveryEvent) {
        self.session.handle_event(&event, &mut self.scan);

        match event {
            DiscoveryEvent::Searching => {
                let _ = self.app_events.send(AppEvent::SearchingRemote);
            }
            DiscoveryEvent::PeerDiscovered(record) => {
                if self.roster.maybe_add(record.clone()) {
                    if let Some(address_book) = &self.address_book {
                        address_book.remember(AddressBookEntry {
                            payment_address: record.payment_address().to_string(),
                            label: Some(record.display_name().to_string())
                                .filter(|label| !label.is_empty()),
                            photo_uri: record.photo_uri().cloned(),
                        });
                    }
                    let _ = self.app_events.send(AppEvent::PeerFound(record));
                }
            }
            _ => {}
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Activate => {
                self.session.activate(&mut self.scan);
                if let Some(radio) = &self.radio {
                    radio.become_visible();
                }
            }
            SessionCommand::Deactivate => {
                if let Some(radio) = &self.radio {
                    radio.become_invisible();
                }
                self.session.deactivate(&mut self.scan);
            }
            SessionCommand::RadioReady(ready) => {
                self.session.set_radio_ready(ready, &mut self.scan);
            }
            SessionCommand::CandidateFound { name, address } => {
                if self.session.admit_candidate(&address, &mut self.scan) {
                    let _ = self.app_events.send(AppEvent::ConnectingTo { name });
                    if let Some(radio) = &self.radio {
                        radio.add_candidate(address);
                    }
                } else {
                    debug!(%address, "candidate not admitted");
                }
            }
            SessionCommand::ScanFinished => {
                self.session.scan_finished(&mut self.scan);
            }
            SessionCommand::Shutdown => unreachable!("handled by the run loop"),
        }
    }
}
