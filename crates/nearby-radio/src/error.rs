//! Error types for the radio worker

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the radio transport and worker
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("radio hardware unavailable: {0}")]
    Unavailable(String),

    #[error("failed to open listening endpoint: {0}")]
    ListenFailed(String),

    #[error("failed to connect to peer {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    #[error("exchange timed out")]
    ExchangeTimeout,

    #[error("codec error: {0}")]
    Codec(#[from] nearby_core::NearbyError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
