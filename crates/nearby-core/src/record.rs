//! The contact record exchanged between devices
//!
//! A [`PeerRecord`] is either *outbound* (assembled from the local user's
//! discovery profile for transmission) or *inbound* (decoded from wire data
//! received over radio or from the rendezvous service). Inbound records carry
//! the peer's radio address only when they arrived over radio; that field,
//! like the locally materialized photo handle, is session-local and never
//! part of the wire form.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::photo::{self, PhotoStore};
use crate::profile::UserProfile;
use crate::types::RadioAddress;

// ----------------------------------------------------------------------------
// Peer Record
// ----------------------------------------------------------------------------

/// Identity record for one nearby peer
#[derive(Debug, Clone)]
pub struct PeerRecord {
    radio_address: Option<RadioAddress>,
    payment_address: String,
    display_name: String,
    photo: Option<Vec<u8>>,
    photo_uri: Option<PathBuf>,
}

impl PeerRecord {
    /// Assemble an outbound record from local data
    pub fn outbound(
        payment_address: impl Into<String>,
        display_name: impl Into<String>,
        photo: Option<Vec<u8>>,
    ) -> Self {
        Self {
            radio_address: None,
            payment_address: payment_address.into(),
            display_name: display_name.into(),
            photo,
            photo_uri: None,
        }
    }

    /// Construct an inbound record from decoded wire data
    pub(crate) fn inbound(
        radio_address: Option<RadioAddress>,
        payment_address: String,
        display_name: String,
        photo: Option<Vec<u8>>,
    ) -> Self {
        Self {
            radio_address,
            payment_address,
            display_name,
            photo,
            photo_uri: None,
        }
    }

    /// Assemble the local user's outbound record from the configured
    /// discovery profile.
    ///
    /// The profile photo, when configured, is loaded from disk and scaled to
    /// a reasonable size before transmission; a missing or unreadable photo
    /// file degrades to a record without a photo.
    pub fn for_local_user(payment_address: impl Into<String>, profile: &UserProfile) -> Self {
        let photo = profile.photo_path.as_ref().and_then(|path| {
            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    debug!(path = %path.display(), %err, "unable to read profile photo");
                    return None;
                }
            };
            photo::scale_to_reasonable(&bytes)
        });

        Self::outbound(payment_address, profile.display_name.clone(), photo)
    }

    /// The radio address this record was received from, when radio-sourced
    pub fn radio_address(&self) -> Option<&RadioAddress> {
        self.radio_address.as_ref()
    }

    /// The peer's payment destination
    pub fn payment_address(&self) -> &str {
        &self.payment_address
    }

    /// The peer's display name (may be empty)
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Raw photo bytes as transmitted, when present
    pub fn photo(&self) -> Option<&[u8]> {
        self.photo.as_deref()
    }

    /// Local handle to the materialized photo asset, once
    /// [`materialize_photo`](Self::materialize_photo) has run
    pub fn photo_uri(&self) -> Option<&PathBuf> {
        self.photo_uri.as_ref()
    }

    /// Whether two records carry the same identity data.
    ///
    /// Compares payment address, display name, and raw photo bytes; the
    /// session-local radio address and photo handle are ignored.
    pub fn has_same_data(&self, other: &PeerRecord) -> bool {
        self == other
    }

    /// Persist the photo, when present, to the content-addressed asset store
    /// and record a local handle for it.
    ///
    /// Bytes that do not decode to an image are silently ignored. Storing
    /// also sweeps assets no longer referenced by any live record.
    pub fn materialize_photo(&mut self, store: &dyn PhotoStore) {
        let Some(bytes) = self.photo.as_deref() else {
            return;
        };
        let Some(png) = photo::scale_to_reasonable(bytes) else {
            return;
        };

        let hash = photo::content_hash(&png);
        match store.put_or_reuse(&hash, &png) {
            Ok(uri) => {
                self.photo_uri = Some(uri);
                for stale in store.sweep_stale() {
                    debug!(path = %stale.display(), "deleted stale photo asset");
                }
            }
            Err(err) => debug!(%err, "unable to persist photo asset"),
        }
    }
}

/// Equality over the wire fields only; `radio_address` and `photo_uri` are
/// session-local and excluded.
impl PartialEq for PeerRecord {
    fn eq(&self, other: &Self) -> bool {
        self.payment_address == other.payment_address
            && self.display_name == other.display_name
            && self.photo == other.photo
    }
}

impl Eq for PeerRecord {}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::AssetStore;

    #[test]
    fn equality_ignores_session_local_fields() {
        let mut a = PeerRecord::outbound("1Axxx", "Alice", Some(vec![1, 2, 3]));
        let b = PeerRecord::inbound(
            Some(RadioAddress::new("00:11:22:33:44:55")),
            "1Axxx".to_string(),
            "Alice".to_string(),
            Some(vec![1, 2, 3]),
        );
        a.photo_uri = Some(PathBuf::from("/tmp/whatever.png"));
        assert_eq!(a, b);
        assert!(a.has_same_data(&b));
    }

    #[test]
    fn equality_compares_photo_bytes() {
        let a = PeerRecord::outbound("1Axxx", "Alice", Some(vec![1, 2, 3]));
        let b = PeerRecord::outbound("1Axxx", "Alice", Some(vec![9, 9, 9]));
        assert_ne!(a, b);
    }

    #[test]
    fn materialize_ignores_non_image_photo() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path()).unwrap();
        let mut record = PeerRecord::outbound("1Axxx", "Alice", Some(b"not an image".to_vec()));

        record.materialize_photo(&store);
        assert!(record.photo_uri().is_none());
    }

    #[test]
    fn materialize_sets_photo_uri_for_valid_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path()).unwrap();

        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]));
        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut png, image::ImageOutputFormat::Png)
            .unwrap();

        let mut record = PeerRecord::outbound("1Axxx", "Alice", Some(png.into_inner()));
        record.materialize_photo(&store);

        let uri = record.photo_uri().expect("photo asset should exist");
        assert!(uri.exists());
    }
}
