//! Boolean fields computed from live store state at load time.
//!
//! A computed field is never written by a mutation. When an entity is
//! loaded, the field's resolver probes the store with the entity's ID and
//! the field's store name.

use larder_store::{KvStore, StoreResult};

/// Contract for boolean fields resolved from store state.
pub trait ComputedBool: Default + Send + Sync + 'static {
    /// Compute the value for entity `id`, whose field is stored as `field`.
    fn resolve(store: &dyn KvStore, id: &str, field: &str) -> StoreResult<bool>;

    fn set(&mut self, value: bool);

    fn get(&self) -> bool;
}

/// `true` when the entity's ID is a member of the sorted set named after
/// the field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ZContains(pub bool);

impl ComputedBool for ZContains {
    fn resolve(store: &dyn KvStore, id: &str, field: &str) -> StoreResult<bool> {
        Ok(store.zrank(field, id)?.is_some())
    }

    fn set(&mut self, value: bool) {
        self.0 = value;
    }

    fn get(&self) -> bool {
        self.0
    }
}

impl From<ZContains> for bool {
    fn from(value: ZContains) -> Self {
        value.0
    }
}

impl PartialEq<bool> for ZContains {
    fn eq(&self, other: &bool) -> bool {
        self.0 == *other
    }
}
