//! Well-known service identifier constants
//!
//! Both sides of an exchange must agree on these: the advertising side
//! registers the service under the UUID, the dialing side connects to it.

use uuid::{uuid, Uuid};

/// Service identifier the exchange endpoint is advertised under
pub const NEARBY_SERVICE_UUID: Uuid = uuid!("d85fc650-ea77-11e3-ac10-0800200c9a66");

/// Human-readable service name used when registering the endpoint
pub const NEARBY_SERVICE_NAME: &str = "Nearby Exchange Service";

/// Fixed RFCOMM channel the exchange endpoint listens on
pub const NEARBY_RFCOMM_CHANNEL: u8 = 3;
