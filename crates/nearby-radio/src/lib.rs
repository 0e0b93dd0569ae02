//! Short-range radio discovery worker for the Nearby subsystem
//!
//! This crate owns the radio side of nearby-peer discovery: a long-lived
//! background worker that advertises the local contact record, dials
//! discovered candidates, and reports busy/idle state to the coordinator.
//!
//! ## Architecture
//!
//! - [`transport`] - The seam between the worker and the actual radio socket
//!   layer
//! - [`protocol`] - Well-known service identifier constants
//! - [`worker`] - The worker itself: command loop, advertise loop, dial loop,
//!   heartbeat
//! - [`loopback`] - In-process transport for tests, demos, and simulations
//! - `bluez` - RFCOMM transport over BlueZ (Linux only, behind the `bluez`
//!   feature since it needs the system D-Bus stack)
//!
//! The worker never touches radio sockets directly; everything goes through
//! [`RadioTransport`], so the same worker runs against real hardware and
//! against the loopback transport in tests.

mod error;
pub mod loopback;
pub mod protocol;
pub mod transport;
pub mod worker;

#[cfg(all(target_os = "linux", feature = "bluez"))]
mod bluez;

// Public API exports
pub use error::RadioError;
pub use loopback::{LoopbackNetwork, LoopbackTransport};
pub use protocol::{NEARBY_RFCOMM_CHANNEL, NEARBY_SERVICE_NAME, NEARBY_SERVICE_UUID};
pub use transport::{RadioListener, RadioTransport};
pub use worker::RadioWorker;

#[cfg(all(target_os = "linux", feature = "bluez"))]
pub use bluez::BluezTransport;

pub type Result<T> = core::result::Result<T, RadioError>;
