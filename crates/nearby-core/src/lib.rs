//! Nearby Core
//!
//! This crate provides the foundational types, codecs, and collaborator
//! interfaces for the Nearby peer discovery subsystem:
//!
//! - [`record`] - The contact record exchanged between devices
//! - [`wire`] - Length-prefixed binary frame codec for the radio transport
//! - [`json`] - JSON wire form for the rendezvous service
//! - [`photo`] - Photo scaling and the content-addressed asset store
//! - [`profile`] - The local user's persisted discovery profile
//! - [`contacts`] - Address-book lookup seam
//! - [`location`] - Location fixes and the fix-quality heuristic
//! - [`messages`] - Worker commands and discovery events
//! - [`config`] - Centralized configuration structures

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod contacts;
pub mod json;
pub mod location;
pub mod messages;
pub mod photo;
pub mod profile;
pub mod record;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{RadioConfig, RendezvousConfig, SessionConfig};
pub use location::{LocationFix, LocationSource};
pub use messages::{event_channel, DiscoveryEvent, EventReceiver, EventSender, RadioCommand};
pub use record::PeerRecord;
pub use types::{RadioAddress, SystemTimeSource, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Core error types for the Nearby subsystem
#[derive(Debug, thiserror::Error)]
pub enum NearbyError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("no discovery profile configured")]
    ProfileMissing,

    #[error("location source unavailable: {0}")]
    LocationUnavailable(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl NearbyError {
    /// Convenience constructor for frame decoding failures
    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        Self::MalformedFrame(reason.into())
    }

    /// Convenience constructor for record-level failures
    pub fn malformed_record(reason: impl Into<String>) -> Self {
        Self::MalformedRecord(reason.into())
    }
}

pub type Result<T> = core::result::Result<T, NearbyError>;
