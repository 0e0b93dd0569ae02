//! Presentation-side deduplication of discovered peers
//!
//! Both transports can surface the same peer, repeatedly, within one
//! session. The roster keys entries by payment address: a record for an
//! already-shown address is dropped unless its identity data actually
//! changed, in which case the entry is refreshed in place.

use nearby_core::PeerRecord;

/// The deduplicated list of peers shown to the user
#[derive(Default)]
pub struct PeerRoster {
    entries: Vec<PeerRecord>,
}

impl PeerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record unless an identical one is already shown.
    ///
    /// Returns `true` when the roster changed (new peer, or refreshed data
    /// for a known payment address) and the record should be presented.
    pub fn maybe_add(&mut self, record: PeerRecord) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.payment_address() == record.payment_address())
        {
            Some(existing) if existing.has_same_data(&record) => false,
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                self.entries.push(record);
                true
            }
        }
    }

    /// Currently shown entries, in discovery order
    pub fn entries(&self) -> &[PeerRecord] {
        &self.entries
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
