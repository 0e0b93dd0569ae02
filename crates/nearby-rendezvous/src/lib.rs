//! Rendezvous-service discovery worker for the Nearby subsystem
//!
//! The remote half of nearby-peer discovery: a background worker that binds
//! to a stream of location fixes, periodically registers the local contact
//! record and position with a fixed rendezvous endpoint, and queries it for
//! peers registered nearby.
//!
//! ## Architecture
//!
//! - [`client`] - The HTTP protocol: register, search, unregister
//! - [`worker`] - The worker loop: fix handling, rate limiting, shutdown
//!
//! Failures on this path are routine (flaky connectivity, service hiccups)
//! and are always absorbed: a failed cycle is logged and discovery continues
//! on the next location fix.

pub mod client;
pub mod worker;

// Public API exports
pub use client::RendezvousClient;
pub use worker::RendezvousWorker;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the rendezvous path
#[derive(Debug, thiserror::Error)]
pub enum RendezvousError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from rendezvous service")]
    UnexpectedStatus { status: u16 },

    #[error("unparseable response from rendezvous service: {0}")]
    BadResponse(String),

    #[error(transparent)]
    Core(#[from] nearby_core::NearbyError),
}

pub type Result<T> = core::result::Result<T, RendezvousError>;
