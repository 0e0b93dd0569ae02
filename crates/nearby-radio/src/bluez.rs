//! RFCOMM radio transport over BlueZ (Linux)
//!
//! The exchange endpoint is an RFCOMM socket on a fixed channel; the
//! well-known service UUID from [`crate::protocol`] identifies the service
//! to SDP-aware platform glue. Adapter bring-up powers the radio on when
//! needed; making the device discoverable is the platform layer's job.

use async_trait::async_trait;
use nearby_core::RadioAddress;
use tracing::info;

use crate::protocol::{NEARBY_RFCOMM_CHANNEL, NEARBY_SERVICE_NAME, NEARBY_SERVICE_UUID};
use crate::transport::{RadioListener, RadioTransport};
use crate::{RadioError, Result};

// ----------------------------------------------------------------------------
// BlueZ Transport
// ----------------------------------------------------------------------------

/// Radio transport backed by the BlueZ stack
pub struct BluezTransport {
    local: RadioAddress,
    channel: u8,
    // Keeps the SDP record alive for the lifetime of the transport.
    _profile: bluer::rfcomm::ProfileHandle,
}

impl BluezTransport {
    /// Connect to the BlueZ daemon, bring the default adapter up, and
    /// register the exchange service record.
    ///
    /// Fails with [`RadioError::Unavailable`] when no adapter is present,
    /// which callers surface once at session start to disable the radio
    /// transport entirely.
    pub async fn new() -> Result<Self> {
        let session = bluer::Session::new()
            .await
            .map_err(|err| RadioError::Unavailable(format!("BlueZ session: {err}")))?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|err| RadioError::Unavailable(format!("radio adapter: {err}")))?;

        if !adapter.is_powered().await.unwrap_or(false) {
            adapter
                .set_powered(true)
                .await
                .map_err(|err| RadioError::Unavailable(format!("powering adapter: {err}")))?;
        }

        let address = adapter
            .address()
            .await
            .map_err(|err| RadioError::Unavailable(format!("adapter address: {err}")))?;

        let profile = session
            .register_profile(bluer::rfcomm::Profile {
                uuid: NEARBY_SERVICE_UUID,
                name: Some(NEARBY_SERVICE_NAME.to_string()),
                channel: Some(NEARBY_RFCOMM_CHANNEL as u16),
                role: Some(bluer::rfcomm::Role::Server),
                require_authentication: Some(false),
                require_authorization: Some(false),
                ..Default::default()
            })
            .await
            .map_err(|err| RadioError::Unavailable(format!("service registration: {err}")))?;

        info!(%address, "radio adapter initialized");
        Ok(Self {
            local: RadioAddress::new(address.to_string()),
            channel: NEARBY_RFCOMM_CHANNEL,
            _profile: profile,
        })
    }
}

#[async_trait]
impl RadioTransport for BluezTransport {
    type Stream = bluer::rfcomm::Stream;
    type Listener = BluezListener;

    fn local_address(&self) -> RadioAddress {
        self.local.clone()
    }

    async fn listen(&self) -> Result<BluezListener> {
        let endpoint = bluer::rfcomm::SocketAddr::new(bluer::Address::any(), self.channel);
        let listener = bluer::rfcomm::Listener::bind(endpoint)
            .await
            .map_err(|err| RadioError::ListenFailed(err.to_string()))?;
        Ok(BluezListener { listener })
    }

    async fn connect(&self, address: &RadioAddress) -> Result<bluer::rfcomm::Stream> {
        let peer: bluer::Address =
            address
                .as_str()
                .parse()
                .map_err(|_| RadioError::ConnectFailed {
                    address: address.to_string(),
                    reason: "invalid device address".to_string(),
                })?;

        bluer::rfcomm::Stream::connect(bluer::rfcomm::SocketAddr::new(peer, self.channel))
            .await
            .map_err(|err| RadioError::ConnectFailed {
                address: address.to_string(),
                reason: err.to_string(),
            })
    }
}

/// Bound RFCOMM listening socket
pub struct BluezListener {
    listener: bluer::rfcomm::Listener,
}

#[async_trait]
impl RadioListener for BluezListener {
    type Stream = bluer::rfcomm::Stream;

    async fn accept(&mut self) -> Result<(bluer::rfcomm::Stream, RadioAddress)> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|err| RadioError::ListenFailed(err.to_string()))?;
        Ok((stream, RadioAddress::new(peer.addr.to_string())))
    }
}
