//! Centralized Configuration Management
//!
//! Every timing constant of the subsystem lives here as a field with the
//! production value as its default, so tests can shrink intervals without
//! patching worker code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Radio Worker Configuration
// ----------------------------------------------------------------------------

/// Configuration for the radio discovery worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// First delay after a failed listen/accept cycle
    pub initial_backoff: Duration,
    /// Backoff ceiling; doubling stops here
    pub max_backoff: Duration,
    /// Hard ceiling on one socket exchange, inbound or outbound
    pub exchange_timeout: Duration,
    /// Interval between heartbeat events
    pub heartbeat_interval: Duration,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(16),
            exchange_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

// ----------------------------------------------------------------------------
// Rendezvous Worker Configuration
// ----------------------------------------------------------------------------

/// Configuration for the rendezvous worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendezvousConfig {
    /// Endpoint of the rendezvous service
    pub endpoint: String,
    /// Network tag sent with every registration
    pub network: String,
    /// Minimum spacing between register/search pairs
    pub min_activity_interval: Duration,
    /// Deadline applied to every HTTP request
    pub http_timeout: Duration,
}

impl RendezvousConfig {
    /// Configuration for a given endpoint, production intervals
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            network: "bitcoin".to_string(),
            min_activity_interval: Duration::from_secs(8),
            http_timeout: Duration::from_secs(15),
        }
    }
}

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Configuration for the discovery coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long before a failed candidate may be dialed again
    pub candidate_recheck_interval: Duration,
    /// Fixed part of the post-scan cooloff window
    pub cooloff_interval: Duration,
    /// Upper bound of the random jitter added to each cooloff window
    pub cooloff_jitter: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            candidate_recheck_interval: Duration::from_secs(10),
            cooloff_interval: Duration::from_secs(3),
            cooloff_jitter: Duration::from_secs(3),
        }
    }
}
