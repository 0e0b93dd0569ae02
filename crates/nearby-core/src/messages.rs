//! Worker commands and discovery events
//!
//! All cross-task communication in the subsystem goes through these types:
//! commands flow from the coordinator into a worker's single-consumer FIFO
//! queue, events flow from the workers up to the coordinator.

use tokio::sync::mpsc;

use crate::record::PeerRecord;
use crate::types::RadioAddress;

// ----------------------------------------------------------------------------
// Radio Worker Commands
// ----------------------------------------------------------------------------

/// Commands accepted by the radio discovery worker.
///
/// Delivered through a single-consumer queue; ordering within the queue is
/// FIFO and is the only ordering guarantee. Activity bookkeeping routes
/// through the same queue so busy/idle transitions are observed in order
/// relative to every other command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCommand {
    /// Start advertising (open the listening endpoint)
    BecomeVisible,
    /// Stop advertising (tear the listening endpoint down)
    BecomeInvisible,
    /// Dial a discovered candidate and read its record
    AddCandidate(RadioAddress),
    /// One more exchange is in flight
    ActivityInc,
    /// One exchange finished
    ActivityDec,
    /// Terminate the worker
    Shutdown,
}

// ----------------------------------------------------------------------------
// Discovery Events
// ----------------------------------------------------------------------------

/// Events emitted by the workers toward the coordinator
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// The radio worker went from idle to at least one exchange in flight
    Busy,
    /// The radio worker went from busy back to idle
    NotBusy,
    /// One-second tick from the radio worker, used to re-evaluate scanning
    Heartbeat,
    /// The rendezvous worker is about to query the remote service
    Searching,
    /// A peer record was successfully obtained over either transport
    PeerDiscovered(PeerRecord),
}

pub type EventSender = mpsc::UnboundedSender<DiscoveryEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<DiscoveryEvent>;

/// Create the event channel connecting the workers to the coordinator
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
