//! Shared test helpers for sync tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use treecache_state::{ItemState, ItemStateCache, NodePayload, RefreshableState, StateLookup};
use treecache_sync::{EventFilter, EventFilterFactory, SyncError, SyncResult};
use treecache_types::{ChangeEvent, ItemId};

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A small resident tree: root -> folder -> (doc node, title property).
pub struct Tree {
    pub cache: Arc<ItemStateCache>,
    pub root: ItemId,
    pub folder: ItemId,
    pub doc: ItemId,
    pub title: ItemId,
}

pub fn make_tree() -> Tree {
    let cache = Arc::new(ItemStateCache::new());
    let root = ItemId::new();
    let folder = ItemId::new();
    let doc = ItemId::new();
    let title = ItemId::new();

    cache.insert(ItemState::new(
        root,
        None,
        treecache_state::ItemPayload::Node(NodePayload::new("").with_child("folder", folder)),
    ));
    cache.insert(ItemState::node(
        folder,
        root,
        NodePayload::new("folder")
            .with_child("doc", doc)
            .with_property("title", title),
    ));
    cache.insert(ItemState::node(doc, folder, NodePayload::new("doc")));
    cache.insert(ItemState::property(title, folder, "title"));

    Tree {
        cache,
        root,
        folder,
        doc,
        title,
    }
}

/// Captures every resident payload, for before/after comparisons.
pub fn snapshot(cache: &ItemStateCache) -> Vec<(ItemId, treecache_state::ItemPayload)> {
    let mut ids = cache.ids();
    ids.sort();
    ids.into_iter()
        .map(|id| (id, (*cache.get(&id).unwrap().payload()).clone()))
        .collect()
}

/// A cache entry that records every event applied to it.
pub struct RecordingState {
    id: ItemId,
    applied: Mutex<Vec<ChangeEvent>>,
}

impl RecordingState {
    pub fn applied(&self) -> Vec<ChangeEvent> {
        self.applied.lock().unwrap().clone()
    }
}

impl RefreshableState for RecordingState {
    fn id(&self) -> ItemId {
        self.id
    }

    fn apply(&self, event: &ChangeEvent) {
        self.applied.lock().unwrap().push(event.clone());
    }
}

/// A lookup over recording entries.
#[derive(Default)]
pub struct RecordingCache {
    states: Mutex<HashMap<ItemId, Arc<RecordingState>>>,
}

impl RecordingCache {
    pub fn with(ids: &[ItemId]) -> Self {
        let cache = Self::default();
        for id in ids {
            cache.insert(*id);
        }
        cache
    }

    pub fn insert(&self, id: ItemId) {
        self.states.lock().unwrap().insert(
            id,
            Arc::new(RecordingState {
                id,
                applied: Mutex::new(Vec::new()),
            }),
        );
    }

    pub fn applied(&self, id: &ItemId) -> Vec<ChangeEvent> {
        self.states
            .lock()
            .unwrap()
            .get(id)
            .map(|s| s.applied())
            .unwrap_or_default()
    }

    pub fn total_applied(&self) -> usize {
        self.states
            .lock()
            .unwrap()
            .values()
            .map(|s| s.applied().len())
            .sum()
    }
}

impl StateLookup for RecordingCache {
    type State = RecordingState;

    fn lookup(&self, id: &ItemId) -> Option<Arc<RecordingState>> {
        self.states.lock().unwrap().get(id).cloned()
    }
}

/// Filter factory of a transport that supports observation.
pub struct ObservingTransport;

impl EventFilterFactory for ObservingTransport {
    fn create_event_filter(
        &self,
        kinds: u32,
        path: &str,
        deep: bool,
        uuids: Option<Vec<ItemId>>,
        node_types: Option<Vec<String>>,
        no_local: bool,
    ) -> SyncResult<EventFilter> {
        Ok(EventFilter {
            kinds,
            path: path.to_string(),
            deep,
            uuids,
            node_types,
            no_local,
        })
    }
}

/// Filter factory of a transport without observation support.
pub struct BlindTransport;

impl EventFilterFactory for BlindTransport {
    fn create_event_filter(
        &self,
        _kinds: u32,
        _path: &str,
        _deep: bool,
        _uuids: Option<Vec<ItemId>>,
        _node_types: Option<Vec<String>>,
        _no_local: bool,
    ) -> SyncResult<EventFilter> {
        Err(SyncError::FilterUnsupported("observation not supported".to_string()))
    }
}
