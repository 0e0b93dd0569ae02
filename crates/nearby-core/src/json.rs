//! JSON wire form for the rendezvous service
//!
//! The rendezvous protocol predates this implementation; the object shape is
//! fixed, including the empty `email` placeholder field kept for backward
//! wire compatibility. Photos travel base64-encoded.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::record::PeerRecord;
use crate::{NearbyError, Result};

// ----------------------------------------------------------------------------
// Wire Shape
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireContact {
    name: String,
    address: String,
    #[serde(default)]
    photo: Option<String>,
}

/// Serialize a record to the rendezvous object shape
pub fn to_wire_json(record: &PeerRecord) -> Value {
    let mut object = json!({
        "name": record.display_name(),
        "email": "",
        "address": record.payment_address(),
    });
    if let Some(photo) = record.photo() {
        object["photo"] = Value::String(BASE64.encode(photo));
    }
    object
}

/// Deserialize a record from the rendezvous object shape.
///
/// A missing or invalid base64 photo payload degrades to a record without a
/// photo; missing required fields fail the whole record.
pub fn from_wire_json(value: &Value) -> Result<PeerRecord> {
    let contact: WireContact = serde_json::from_value(value.clone())
        .map_err(|err| NearbyError::malformed_record(err.to_string()))?;

    let photo = contact
        .photo
        .filter(|encoded| !encoded.is_empty())
        .and_then(|encoded| match BASE64.decode(encoded.as_bytes()) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                debug!(%err, "discarding photo with invalid base64 payload");
                None
            }
        });

    Ok(PeerRecord::inbound(None, contact.address, contact.name, photo))
}

/// Build the registration/search request body: the wire object plus the
/// network tag and the current position.
pub fn registration_body(
    record: &PeerRecord,
    network: &str,
    latitude: f64,
    longitude: f64,
) -> Value {
    let mut body = to_wire_json(record);
    body["network"] = Value::String(network.to_string());
    body["lat"] = json!(latitude);
    body["lon"] = json!(longitude);
    body
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_photo() {
        let record = PeerRecord::outbound("1AliceAddress", "Alice", Some(vec![1, 2, 3, 4]));
        let decoded = from_wire_json(&to_wire_json(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn round_trip_without_photo() {
        let record = PeerRecord::outbound("1AliceAddress", "Alice", None);
        let value = to_wire_json(&record);
        assert!(value.get("photo").is_none());
        assert_eq!(from_wire_json(&value).unwrap(), record);
    }

    #[test]
    fn email_placeholder_is_always_present() {
        let value = to_wire_json(&PeerRecord::outbound("1AliceAddress", "Alice", None));
        assert_eq!(value["email"], "");
    }

    #[test]
    fn invalid_base64_photo_degrades_to_no_photo() {
        let value = json!({
            "name": "Alice",
            "email": "",
            "address": "1AliceAddress",
            "photo": "!!! not base64 !!!",
        });
        let record = from_wire_json(&value).unwrap();
        assert_eq!(record.payment_address(), "1AliceAddress");
        assert!(record.photo().is_none());
    }

    #[test]
    fn empty_photo_string_means_no_photo() {
        let value = json!({"name": "Alice", "address": "1AliceAddress", "photo": ""});
        assert!(from_wire_json(&value).unwrap().photo().is_none());
    }

    #[test]
    fn missing_address_fails_the_record() {
        let value = json!({"name": "Alice", "email": ""});
        assert!(matches!(
            from_wire_json(&value),
            Err(NearbyError::MalformedRecord(_))
        ));
    }

    #[test]
    fn registration_body_carries_network_and_position() {
        let record = PeerRecord::outbound("1AliceAddress", "Alice", None);
        let body = registration_body(&record, "bitcoin", 52.0, 4.0);
        assert_eq!(body["network"], "bitcoin");
        assert_eq!(body["lat"], 52.0);
        assert_eq!(body["lon"], 4.0);
        assert_eq!(body["address"], "1AliceAddress");
    }
}
