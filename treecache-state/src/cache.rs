//! In-memory hierarchical cache store.

use crate::{ItemState, StateLookup};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use treecache_types::ItemId;

/// Maps item ids to their cached states.
///
/// Entries are inserted by the fetch path and evicted by whatever memory
/// policy the host runs; the reconciler only ever looks them up.
#[derive(Debug, Default)]
pub struct ItemStateCache {
    states: RwLock<HashMap<ItemId, Arc<ItemState>>>,
}

impl ItemStateCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `state` resident, replacing any previous state with the same id.
    pub fn insert(&self, state: ItemState) -> Arc<ItemState> {
        let state = Arc::new(state);
        self.write().insert(state.id(), Arc::clone(&state));
        state
    }

    /// Drops the state for `id`. Returns the evicted state, if it was resident.
    pub fn evict(&self, id: &ItemId) -> Option<Arc<ItemState>> {
        let evicted = self.write().remove(id);
        if evicted.is_some() {
            debug!(item = %id, "evicted item state");
        }
        evicted
    }

    /// Returns the resident state for `id`.
    pub fn get(&self, id: &ItemId) -> Option<Arc<ItemState>> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns the ids of all resident states.
    pub fn ids(&self) -> Vec<ItemId> {
        self.read().keys().copied().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ItemId, Arc<ItemState>>> {
        self.states.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ItemId, Arc<ItemState>>> {
        self.states.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateLookup for ItemStateCache {
    type State = ItemState;

    fn lookup(&self, id: &ItemId) -> Option<Arc<ItemState>> {
        self.get(id)
    }
}
