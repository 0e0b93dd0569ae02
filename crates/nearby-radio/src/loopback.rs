//! In-process radio transport for tests, demos, and simulations
//!
//! A [`LoopbackNetwork`] is a registry of listening endpoints keyed by
//! address; connecting hands the listener one end of an in-memory duplex
//! stream. Semantics mirror the real radio: at most one listener per
//! address, dialing an address nobody listens on fails, and dropping a
//! listener closes the endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nearby_core::RadioAddress;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use crate::transport::{RadioListener, RadioTransport};
use crate::{RadioError, Result};

const STREAM_BUFFER: usize = 64 * 1024;

type Incoming = (DuplexStream, RadioAddress);

// ----------------------------------------------------------------------------
// Loopback Network
// ----------------------------------------------------------------------------

/// Registry connecting loopback endpoints to each other
#[derive(Default)]
pub struct LoopbackNetwork {
    listeners: Mutex<HashMap<RadioAddress, mpsc::UnboundedSender<Incoming>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a transport bound to the given device address
    pub fn endpoint(self: &Arc<Self>, address: impl Into<String>) -> LoopbackTransport {
        LoopbackTransport {
            network: Arc::clone(self),
            address: RadioAddress::new(address),
        }
    }

    fn register(
        &self,
        address: &RadioAddress,
    ) -> Result<(mpsc::UnboundedSender<Incoming>, mpsc::UnboundedReceiver<Incoming>)> {
        let mut listeners = self.listeners.lock().expect("loopback lock poisoned");
        if listeners.contains_key(address) {
            return Err(RadioError::ListenFailed(format!(
                "{address} is already listening"
            )));
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        listeners.insert(address.clone(), sender.clone());
        Ok((sender, receiver))
    }

    fn deregister(&self, address: &RadioAddress, sender: &mpsc::UnboundedSender<Incoming>) {
        let mut listeners = self.listeners.lock().expect("loopback lock poisoned");
        if listeners
            .get(address)
            .is_some_and(|registered| registered.same_channel(sender))
        {
            listeners.remove(address);
        }
    }

    fn dial(&self, from: &RadioAddress, to: &RadioAddress) -> Result<DuplexStream> {
        let listeners = self.listeners.lock().expect("loopback lock poisoned");
        let listener = listeners.get(to).ok_or_else(|| RadioError::ConnectFailed {
            address: to.to_string(),
            reason: "peer is not listening".to_string(),
        })?;

        let (local, remote) = tokio::io::duplex(STREAM_BUFFER);
        listener
            .send((remote, from.clone()))
            .map_err(|_| RadioError::ConnectFailed {
                address: to.to_string(),
                reason: "peer stopped listening".to_string(),
            })?;
        Ok(local)
    }
}

// ----------------------------------------------------------------------------
// Transport Implementation
// ----------------------------------------------------------------------------

/// One device on a [`LoopbackNetwork`]
pub struct LoopbackTransport {
    network: Arc<LoopbackNetwork>,
    address: RadioAddress,
}

#[async_trait::async_trait]
impl RadioTransport for LoopbackTransport {
    type Stream = DuplexStream;
    type Listener = LoopbackListener;

    fn local_address(&self) -> RadioAddress {
        self.address.clone()
    }

    async fn listen(&self) -> Result<LoopbackListener> {
        let (sender, incoming) = self.network.register(&self.address)?;
        Ok(LoopbackListener {
            network: Arc::clone(&self.network),
            address: self.address.clone(),
            sender,
            incoming,
        })
    }

    async fn connect(&self, address: &RadioAddress) -> Result<DuplexStream> {
        self.network.dial(&self.address, address)
    }
}

/// Listening endpoint on a [`LoopbackNetwork`]
pub struct LoopbackListener {
    network: Arc<LoopbackNetwork>,
    address: RadioAddress,
    sender: mpsc::UnboundedSender<Incoming>,
    incoming: mpsc::UnboundedReceiver<Incoming>,
}

#[async_trait::async_trait]
impl RadioListener for LoopbackListener {
    type Stream = DuplexStream;

    async fn accept(&mut self) -> Result<(DuplexStream, RadioAddress)> {
        self.incoming
            .recv()
            .await
            .ok_or_else(|| RadioError::ListenFailed("endpoint closed".to_string()))
    }
}

impl Drop for LoopbackListener {
    fn drop(&mut self) {
        self.network.deregister(&self.address, &self.sender);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
