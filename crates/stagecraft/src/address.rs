//! # Addresses
//!
//! Every actor is known by an [`Address`]: a process-unique, comparable
//! identity. Addresses are handed out by an [`AddressFactory`] whose counters
//! are atomic, so address creation is safe from any thread. An address may
//! outlive the actor it names; dead-letter reports keep referring to the
//! address long after the actor has stopped.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::ActorError;

/// The id reserved for the dead-letters sink.
pub const DEAD_LETTERS_ID: i64 = 0;

/// Upper bound of the descending range reserved for root/system actors.
pub const HIGH_ROOT_ID: i64 = i64::MAX;

/// Process-unique identity of an actor.
///
/// Identity is the numeric id alone; the optional name exists purely for
/// diagnostics and never participates in equality, ordering or hashing.
#[derive(Clone, Debug)]
pub struct Address {
    id: i64,
    name: Option<Arc<str>>,
}

impl Address {
    pub(crate) fn new(id: i64, name: Option<&str>) -> Self {
        Self {
            id,
            name: name.map(Arc::from),
        }
    }

    /// The fixed address of the dead-letters sink.
    pub fn none() -> Self {
        Self::new(DEAD_LETTERS_ID, Some("dead-letters"))
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Address({}:{})", self.id, name),
            None => write!(f, "Address({})", self.id),
        }
    }
}

/// Thread-safe source of fresh addresses.
///
/// Ordinary ids ascend from 1; [`AddressFactory::with_high_id`] descends from
/// [`HIGH_ROOT_ID`], so the two ranges can never collide within the lifetime
/// of a runtime instance.
pub struct AddressFactory {
    next_id: AtomicI64,
    high_id: AtomicI64,
}

impl AddressFactory {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            high_id: AtomicI64::new(HIGH_ROOT_ID),
        }
    }

    /// Answers a fresh, anonymous address with a strictly increasing id.
    pub fn unique(&self) -> Address {
        Address::new(self.next_id.fetch_add(1, Ordering::SeqCst), None)
    }

    /// Answers a fresh address carrying the given diagnostic name.
    pub fn unique_with(&self, name: &str) -> Address {
        Address::new(self.next_id.fetch_add(1, Ordering::SeqCst), Some(name))
    }

    /// Answers a fresh address named `prefix-id`.
    pub fn unique_prefixed_with(&self, prefix: &str) -> Address {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Address::new(id, Some(&format!("{prefix}-{id}")))
    }

    /// Answers an address from the descending high range reserved for
    /// root/system actors.
    pub fn with_high_id(&self) -> Address {
        Address::new(self.high_id.fetch_sub(1, Ordering::SeqCst) - 1, None)
    }

    /// Like [`AddressFactory::with_high_id`], with a diagnostic name.
    pub fn with_high_id_named(&self, name: &str) -> Address {
        Address::new(self.high_id.fetch_sub(1, Ordering::SeqCst) - 1, Some(name))
    }

    /// Builds an address from an externally supplied id.
    pub fn from_raw(&self, id: &str, name: Option<&str>) -> Result<Address, ActorError> {
        let parsed = id
            .trim()
            .parse::<i64>()
            .map_err(|_| ActorError::InvalidAddressFormat(id.to_string()))?;
        Ok(Address::new(parsed, name))
    }

    /// The fixed dead-letters address.
    pub fn none(&self) -> Address {
        Address::none()
    }
}

impl Default for AddressFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn unique_addresses_are_pairwise_distinct() {
        let factory = AddressFactory::new();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(factory.unique().id()));
        }
    }

    #[test]
    fn high_ids_never_collide_with_unique_ids() {
        let factory = AddressFactory::new();
        let lows: HashSet<i64> = (0..100).map(|_| factory.unique().id()).collect();
        for _ in 0..100 {
            let high = factory.with_high_id();
            assert!(high.id() > HIGH_ROOT_ID - 200);
            assert!(!lows.contains(&high.id()));
        }
    }

    #[test]
    fn identity_ignores_the_name() {
        let a = Address::new(7, Some("left"));
        let b = Address::new(7, Some("right"));
        assert_eq!(a, b);
        assert_ne!(a, Address::new(8, Some("left")));
    }

    #[test]
    fn from_raw_rejects_non_numeric_ids() {
        let factory = AddressFactory::new();
        assert!(matches!(
            factory.from_raw("not-a-number", None),
            Err(ActorError::InvalidAddressFormat(_))
        ));
        let parsed = factory.from_raw("42", Some("answer")).unwrap();
        assert_eq!(parsed.id(), 42);
        assert_eq!(parsed.name(), Some("answer"));
    }

    #[test]
    fn none_is_the_dead_letters_address() {
        assert_eq!(Address::none().id(), DEAD_LETTERS_ID);
        assert_eq!(AddressFactory::new().none(), Address::none());
    }
}
