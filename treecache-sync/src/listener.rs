//! Event listener - the inbound surface of the cache.
//!
//! The transport asks a listener which events it wants through
//! [`EventListener::event_filters`] and pushes every matching bundle into
//! [`EventListener::on_event`].

use crate::config::{CacheBehaviour, CacheConfig};
use crate::error::SyncResult;
use crate::reconciler::Reconciler;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use treecache_state::StateLookup;
use treecache_types::{EventKind, ItemId, WireBundle};

/// Path of the root node.
pub const ROOT_PATH: &str = "/";

/// Subscription scope understood by the transport.
///
/// The cache never inspects a filter; it only hands filters built by the
/// transport back to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Bit mask of [`EventKind`] codes.
    pub kinds: u32,
    /// Absolute path the subscription is rooted at.
    pub path: String,
    /// Whether changes below `path` are included.
    pub deep: bool,
    /// Restrict to these node ids.
    pub uuids: Option<Vec<ItemId>>,
    /// Restrict to these node types.
    pub node_types: Option<Vec<String>>,
    /// Suppress events caused by this client.
    pub no_local: bool,
}

/// Builds event filters. Implemented by the transport.
pub trait EventFilterFactory {
    /// Creates a filter, or fails if the transport cannot observe changes.
    fn create_event_filter(
        &self,
        kinds: u32,
        path: &str,
        deep: bool,
        uuids: Option<Vec<ItemId>>,
        node_types: Option<Vec<String>>,
        no_local: bool,
    ) -> SyncResult<EventFilter>;
}

/// Receiver of event bundles.
pub trait EventListener: Send + Sync {
    /// Filters describing the events this listener wants. Empty means no
    /// subscription.
    fn event_filters(&self) -> &[EventFilter];

    /// Handles one delivered bundle.
    fn on_event(&self, bundle: WireBundle) -> SyncResult<()>;
}

/// Keeps a workspace item state cache in line with the remote store.
///
/// Bundles are reconciled for local and remote changes alike, since
/// workspace operations reported as local changes can still have created
/// items the local change log does not know about.
pub struct WorkspaceListener<C: StateLookup> {
    reconciler: Reconciler<C>,
    filters: Vec<EventFilter>,
    behaviour: CacheBehaviour,
}

impl<C: StateLookup> WorkspaceListener<C> {
    /// Creates a listener for `cache`. With [`CacheBehaviour::Observation`]
    /// it subscribes to every change below the root; if the transport cannot
    /// provide that filter, the listener runs without a subscription.
    pub fn new(cache: C, config: &CacheConfig, factory: &dyn EventFilterFactory) -> Self {
        let filters = if config.cache_behaviour.observes() {
            // TODO: narrow the subscription to the subtrees actually resident
            match factory.create_event_filter(
                EventKind::ALL_TYPES,
                ROOT_PATH,
                true,
                None,
                None,
                false,
            ) {
                Ok(filter) => vec![filter],
                Err(e) => {
                    warn!(cache = %config.cache_name, error = %e, "observation unavailable, cache will not be refreshed by events");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        info!(
            cache = %config.cache_name,
            behaviour = ?config.cache_behaviour,
            filters = filters.len(),
            "workspace listener created"
        );

        Self {
            reconciler: Reconciler::new(cache, &config.cache_name),
            filters,
            behaviour: config.cache_behaviour,
        }
    }

    pub fn behaviour(&self) -> CacheBehaviour {
        self.behaviour
    }

    pub fn reconciler(&self) -> &Reconciler<C> {
        &self.reconciler
    }

    /// Returns the cache this listener refreshes.
    pub fn cache(&self) -> &C {
        self.reconciler.cache()
    }
}

impl<C: StateLookup> EventListener for WorkspaceListener<C> {
    fn event_filters(&self) -> &[EventFilter] {
        &self.filters
    }

    fn on_event(&self, bundle: WireBundle) -> SyncResult<()> {
        self.reconciler.reconcile_wire(bundle)
    }
}
