//! Address-book lookup seam
//!
//! The wallet's address book is an external collaborator; discovery only
//! needs to look up a previously-seen identity by payment address and to
//! cache identities it has exchanged with.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

// ----------------------------------------------------------------------------
// Address Book
// ----------------------------------------------------------------------------

/// One cached address-book identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBookEntry {
    /// Payment address the entry is keyed by
    pub payment_address: String,
    /// Label the user (or a previous exchange) gave the address
    pub label: Option<String>,
    /// Local handle to a cached photo asset
    pub photo_uri: Option<PathBuf>,
}

/// Lookup and caching of known identities by payment address
pub trait AddressBook: Send + Sync {
    /// Look up a cached identity
    fn lookup(&self, payment_address: &str) -> Option<AddressBookEntry>;

    /// Cache an identity, replacing any previous entry for the same address
    fn remember(&self, entry: AddressBookEntry);
}

/// In-memory [`AddressBook`] for tests and demos
#[derive(Default)]
pub struct MemoryAddressBook {
    entries: Mutex<HashMap<String, AddressBookEntry>>,
}

impl MemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AddressBook for MemoryAddressBook {
    fn lookup(&self, payment_address: &str) -> Option<AddressBookEntry> {
        self.entries
            .lock()
            .expect("address book lock poisoned")
            .get(payment_address)
            .cloned()
    }

    fn remember(&self, entry: AddressBookEntry) {
        self.entries
            .lock()
            .expect("address book lock poisoned")
            .insert(entry.payment_address.clone(), entry);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_then_lookup() {
        let book = MemoryAddressBook::new();
        assert!(book.lookup("1AliceAddress").is_none());

        book.remember(AddressBookEntry {
            payment_address: "1AliceAddress".to_string(),
            label: Some("Alice".to_string()),
            photo_uri: None,
        });

        let entry = book.lookup("1AliceAddress").unwrap();
        assert_eq!(entry.label.as_deref(), Some("Alice"));
    }
}
