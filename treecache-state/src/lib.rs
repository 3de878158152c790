//! Cached item states and the hierarchical cache store.
//!
//! # Architecture
//!
//! - [`ItemState`] is the cached, possibly stale, local copy of one remote
//!   node or property. Its only mutation is [`ItemState::apply`], which folds
//!   a change event into the payload.
//! - [`ItemStateCache`] maps identities to states. Lookups are purely local:
//!   a miss means "not cached, nothing to do", never "go fetch".
//!
//! The reconciler talks to the store only through the [`StateLookup`] and
//! [`RefreshableState`] traits, so hosts can plug in their own store.

mod cache;
mod item_state;

pub use cache::ItemStateCache;
pub use item_state::{
    ChildNodeEntry, ItemPayload, ItemState, ItemStatus, NodePayload, PropertyPayload,
    DEFINITION_PROPERTIES,
};

use std::sync::Arc;
use treecache_types::{ChangeEvent, ItemId};

/// A cache entry the reconciler can refresh.
pub trait RefreshableState: Send + Sync {
    /// Identity of the item this state caches.
    fn id(&self) -> ItemId;

    /// Folds an event concerning this item, or its relation to a child, into
    /// the cached payload. Must be idempotent.
    fn apply(&self, event: &ChangeEvent);
}

/// Read-only, local lookup of resident states.
pub trait StateLookup: Send + Sync {
    type State: RefreshableState;

    /// Returns the resident state for `id`, or `None` if it is not cached.
    fn lookup(&self, id: &ItemId) -> Option<Arc<Self::State>>;
}

impl<T: StateLookup + ?Sized> StateLookup for Arc<T> {
    type State = T::State;

    fn lookup(&self, id: &ItemId) -> Option<Arc<Self::State>> {
        (**self).lookup(id)
    }
}
