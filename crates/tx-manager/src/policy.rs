use std::collections::HashSet;

use parking_lot::RwLock;

/// Registry of destination addresses that must never receive funds.
pub trait AddressPolicy: Send + Sync {
    fn is_restricted_address(&self, address: &str) -> bool;
}

/// Policy backed by an explicit deny list, e.g. a sanctions list pushed from
/// a component updater.
#[derive(Default)]
pub struct DenyList {
    addresses: RwLock<HashSet<String>>,
}

impl DenyList {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: RwLock::new(addresses.into_iter().map(Into::into).collect()),
        }
    }

    /// Replace the whole list.
    pub fn replace<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.addresses.write() = addresses.into_iter().map(Into::into).collect();
    }
}

impl AddressPolicy for DenyList {
    fn is_restricted_address(&self, address: &str) -> bool {
        self.addresses.read().contains(address)
    }
}
