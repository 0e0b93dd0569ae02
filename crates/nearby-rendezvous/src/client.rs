//! The rendezvous HTTP protocol
//!
//! A fixed endpoint brokers position-based discovery:
//!
//! - `POST <endpoint>` with the contact + position body registers the local
//!   user; success is 201 Created.
//! - `PUT <endpoint>` with the same body searches; success is 200 OK and the
//!   body is a JSON array of single-element arrays, each wrapping one peer
//!   object.
//! - `DELETE <endpoint>` unregisters; success is 200 OK.
//!
//! The service correlates registration and unregistration through a session
//! cookie, so the client keeps a cookie store. Every request carries an
//! explicit deadline; the service being slow must never stall the worker
//! indefinitely.

use nearby_core::{json, LocationFix, PeerRecord, RendezvousConfig};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::{RendezvousError, Result};

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

/// HTTP client for the rendezvous service
pub struct RendezvousClient {
    http: reqwest::Client,
    endpoint: String,
    network: String,
}

impl RendezvousClient {
    /// Build a client for the configured endpoint
    pub fn new(config: &RendezvousConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            network: config.network.clone(),
        })
    }

    fn body(&self, record: &PeerRecord, fix: &LocationFix) -> serde_json::Value {
        json::registration_body(record, &self.network, fix.latitude, fix.longitude)
    }

    /// Register the local record and position
    pub async fn register(&self, record: &PeerRecord, fix: &LocationFix) -> Result<()> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&self.body(record, fix))
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(RendezvousError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }
        debug!("registered with rendezvous service");
        Ok(())
    }

    /// Query for peers registered near the given position.
    ///
    /// A malformed peer object drops that record only; the rest of the
    /// response is still used.
    pub async fn search(&self, record: &PeerRecord, fix: &LocationFix) -> Result<Vec<PeerRecord>> {
        let response = self
            .http
            .put(&self.endpoint)
            .json(&self.body(record, fix))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(RendezvousError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }

        let reply: serde_json::Value = response.json().await?;
        let rows = reply
            .as_array()
            .ok_or_else(|| RendezvousError::BadResponse("expected a JSON array".to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let Some(object) = row.as_array().and_then(|inner| inner.first()) else {
                warn!("skipping malformed search result row");
                continue;
            };
            match json::from_wire_json(object) {
                Ok(record) => records.push(record),
                Err(err) => warn!(%err, "skipping unparseable peer record"),
            }
        }

        debug!(count = records.len(), "received search results");
        Ok(records)
    }

    /// Remove the local registration. Best-effort; callers ignore failures.
    pub async fn unregister(&self) -> Result<()> {
        let response = self.http.delete(&self.endpoint).send().await?;
        if response.status() != StatusCode::OK {
            return Err(RendezvousError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
