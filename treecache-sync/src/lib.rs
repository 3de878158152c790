//! Event-driven reconciliation for the treecache item state cache.
//!
//! The remote store reports its changes as ordered bundles of events. This
//! crate consumes those bundles and refreshes only the cached entries they
//! touch, leaving every other entry alone.
//!
//! ## Components
//!
//! - **Reconciler**: applies one bundle to a cache, additions first
//! - **Listener**: declares the subscription and receives bundles
//! - **Delivery**: a channel-fed task that serialises bundles into a listener
//! - **Config**: cache name, subscription mode, channel capacity
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use treecache_state::{ItemState, ItemStateCache};
//! use treecache_sync::Reconciler;
//! use treecache_types::{ChangeEvent, EventBundle, ItemId};
//!
//! let cache = Arc::new(ItemStateCache::new());
//! let root = ItemId::new();
//! cache.insert(ItemState::root(root));
//!
//! let reconciler = Reconciler::new(Arc::clone(&cache), "workspace");
//! let child = ItemId::new();
//! reconciler.reconcile(&EventBundle::new(vec![ChangeEvent::node_added(child, root, "docs")]));
//!
//! let payload = cache.get(&root).unwrap().payload();
//! assert!(payload.as_node().unwrap().has_child_node(&child));
//! assert!(cache.get(&child).is_none());
//! ```

mod config;
mod delivery;
mod error;
mod listener;
mod reconciler;

pub use config::{CacheBehaviour, CacheConfig, DEFAULT_DELIVERY_CAPACITY};
pub use delivery::{spawn_delivery, DeliveryCommand, DeliveryHandle};
pub use error::{SyncError, SyncResult};
pub use listener::{EventFilter, EventFilterFactory, EventListener, WorkspaceListener, ROOT_PATH};
pub use reconciler::Reconciler;
