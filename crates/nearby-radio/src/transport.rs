//! The seam between the radio worker and the radio socket layer
//!
//! The worker only needs three operations from the radio: open a listening
//! endpoint under the well-known service identifier, accept one inbound
//! connection, and dial a peer by address. Implementations back these with
//! real hardware ([`crate::BluezTransport`] on Linux) or with in-process
//! plumbing ([`crate::LoopbackTransport`]).

use async_trait::async_trait;
use nearby_core::RadioAddress;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::Result;

// ----------------------------------------------------------------------------
// Transport Traits
// ----------------------------------------------------------------------------

/// A bound listening endpoint.
///
/// Dropping the listener closes the endpoint and cancels any in-flight
/// accept; the worker relies on this to stop listening while serving a
/// connection and on shutdown.
#[async_trait]
pub trait RadioListener: Send {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Wait for one inbound connection, returning the stream and the
    /// dialing peer's address.
    async fn accept(&mut self) -> Result<(Self::Stream, RadioAddress)>;
}

/// A point-to-point radio socket layer
#[async_trait]
pub trait RadioTransport: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;
    type Listener: RadioListener<Stream = Self::Stream>;

    /// The local device address
    fn local_address(&self) -> RadioAddress;

    /// Open the listening endpoint under the well-known service identifier
    async fn listen(&self) -> Result<Self::Listener>;

    /// Dial a peer's exchange endpoint
    async fn connect(&self, address: &RadioAddress) -> Result<Self::Stream>;
}
