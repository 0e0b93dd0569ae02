//! Discovery coordinator and runtime wiring for the Nearby subsystem
//!
//! The coordinator is pure policy glue running in a single presentation
//! context: it decides when the radio should scan, rate-limits candidate
//! dials, deduplicates discovered peers, and forwards confirmed records to
//! the presenting UI. The workers do all the I/O; nothing here blocks.
//!
//! ## Architecture
//!
//! - [`scan`] - The radio scan-control surface the platform implements
//! - [`session`] - The scheduling policy: shouldScan, cooloff, candidate
//!   admission
//! - [`roster`] - Presentation-side deduplication by payment address
//! - [`runtime`] - The event loop tying workers, session, and UI together

pub mod roster;
pub mod runtime;
pub mod scan;
pub mod session;

// Public API exports
pub use roster::PeerRoster;
pub use runtime::{AppEvent, DiscoveryRuntime, RuntimeHandles, SessionCommand};
pub use scan::ScanControl;
pub use session::DiscoverySession;
