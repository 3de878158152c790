//! Cached item states.
//!
//! A state holds an immutable identity (its own id and its parent's id) and a
//! payload. Every call to [`ItemState::apply`] builds the next payload from
//! the current one and swaps it in under a single write lock, so a reader
//! holding an [`Arc`] snapshot never observes a half-applied event.
//!
//! All payload updates are set-to-value or set-membership operations.
//! Applying the same event twice leaves the payload as applying it once.

use crate::RefreshableState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;
use treecache_types::{ChangeEvent, EventKind, ItemId};

/// Property names whose change alters how a node interprets its children.
pub const DEFINITION_PROPERTIES: [&str; 3] = ["jcr:primaryType", "jcr:mixinTypes", "jcr:uuid"];

/// Lifecycle status of a cached item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The cached data mirrors the remote item as last read.
    #[default]
    Existing,
    /// The remote item changed; cached data must be re-read on next access.
    Invalidated,
    /// The remote item no longer exists.
    Removed,
}

/// A child node reference held by its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildNodeEntry {
    pub name: String,
    pub id: ItemId,
}

/// Cached data of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodePayload {
    name: String,
    status: ItemStatus,
    /// Child nodes in document order. Same-name siblings are allowed.
    child_nodes: Vec<ChildNodeEntry>,
    /// Property name to property id.
    properties: BTreeMap<String, ItemId>,
    /// Child name to child ids, rebuilt from `child_nodes`.
    #[serde(skip)]
    child_index: BTreeMap<String, Vec<ItemId>>,
}

impl NodePayload {
    /// Creates an empty node payload.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Existing,
            child_nodes: Vec::new(),
            properties: BTreeMap::new(),
            child_index: BTreeMap::new(),
        }
    }

    /// Adds a child node reference (builder form, for the fetch path).
    #[must_use]
    pub fn with_child(mut self, name: impl Into<String>, id: ItemId) -> Self {
        self.add_child_node(name.into(), id);
        self
    }

    /// Adds a property reference (builder form, for the fetch path).
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, id: ItemId) -> Self {
        self.properties.insert(name.into(), id);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn child_nodes(&self) -> &[ChildNodeEntry] {
        &self.child_nodes
    }

    pub fn properties(&self) -> &BTreeMap<String, ItemId> {
        &self.properties
    }

    /// Returns true if `id` is referenced as a child node.
    pub fn has_child_node(&self, id: &ItemId) -> bool {
        self.child_nodes.iter().any(|c| c.id == *id)
    }

    /// Returns the ids of the child nodes called `name`, in document order.
    pub fn child_node_ids(&self, name: &str) -> &[ItemId] {
        self.child_index.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the id of the property called `name`.
    pub fn property_id(&self, name: &str) -> Option<ItemId> {
        self.properties.get(name).copied()
    }

    fn add_child_node(&mut self, name: String, id: ItemId) -> bool {
        if self.has_child_node(&id) {
            return false;
        }
        self.child_nodes.push(ChildNodeEntry { name, id });
        self.rebuild_index();
        true
    }

    fn remove_child_node(&mut self, id: &ItemId) -> bool {
        let before = self.child_nodes.len();
        self.child_nodes.retain(|c| c.id != *id);
        if self.child_nodes.len() == before {
            return false;
        }
        self.rebuild_index();
        true
    }

    fn set_property(&mut self, name: &str, id: ItemId) -> bool {
        if self.properties.get(name) == Some(&id) {
            return false;
        }
        self.properties.insert(name.to_string(), id);
        true
    }

    /// Drops `name` only while it still refers to `id`; a replacement added
    /// earlier in the same bundle survives the removal of its predecessor.
    fn remove_property(&mut self, name: &str, id: &ItemId) -> bool {
        if self.properties.get(name) != Some(id) {
            return false;
        }
        self.properties.remove(name);
        true
    }

    fn rebuild_index(&mut self) {
        self.child_index.clear();
        for child in &self.child_nodes {
            self.child_index
                .entry(child.name.clone())
                .or_default()
                .push(child.id);
        }
    }

    /// Folds an event in which this node is the parent.
    fn refresh_as_parent(&mut self, event: &ChangeEvent) -> bool {
        if self.status == ItemStatus::Removed {
            return false;
        }
        match event.kind {
            EventKind::NodeAdded => self.add_child_node(event.name.clone(), event.item_id),
            EventKind::NodeRemoved => self.remove_child_node(&event.item_id),
            EventKind::PropertyAdded => self.set_property(&event.name, event.item_id),
            EventKind::PropertyRemoved => self.remove_property(&event.name, &event.item_id),
            EventKind::PropertyChanged => {
                if DEFINITION_PROPERTIES.contains(&event.name.as_str())
                    && self.status != ItemStatus::Invalidated
                {
                    self.status = ItemStatus::Invalidated;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Cached data of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyPayload {
    name: String,
    status: ItemStatus,
}

impl PropertyPayload {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ItemStatus::Existing,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }
}

/// Payload of a cached item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPayload {
    Node(NodePayload),
    Property(PropertyPayload),
}

impl ItemPayload {
    pub fn status(&self) -> ItemStatus {
        match self {
            ItemPayload::Node(n) => n.status,
            ItemPayload::Property(p) => p.status,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ItemPayload::Node(n) => &n.name,
            ItemPayload::Property(p) => &p.name,
        }
    }

    pub fn as_node(&self) -> Option<&NodePayload> {
        match self {
            ItemPayload::Node(n) => Some(n),
            ItemPayload::Property(_) => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyPayload> {
        match self {
            ItemPayload::Property(p) => Some(p),
            ItemPayload::Node(_) => None,
        }
    }

    fn status_mut(&mut self) -> &mut ItemStatus {
        match self {
            ItemPayload::Node(n) => &mut n.status,
            ItemPayload::Property(p) => &mut p.status,
        }
    }

    /// Returns the payload after folding `event`, or `None` if the event
    /// leaves this item unchanged.
    fn refreshed(&self, own_id: ItemId, event: &ChangeEvent) -> Option<ItemPayload> {
        let mut next = self.clone();
        let changed = if event.item_id == own_id {
            next.refresh_as_subject(event.kind)
        } else if event.parent_id == Some(own_id) {
            match &mut next {
                ItemPayload::Node(node) => node.refresh_as_parent(event),
                ItemPayload::Property(_) => false,
            }
        } else {
            false
        };
        changed.then_some(next)
    }

    fn refresh_as_subject(&mut self, kind: EventKind) -> bool {
        let status = self.status_mut();
        let target = match (kind, *status) {
            (EventKind::NodeRemoved | EventKind::PropertyRemoved, _) => ItemStatus::Removed,
            (EventKind::PropertyChanged, ItemStatus::Removed) => return false,
            (EventKind::PropertyChanged, _) => ItemStatus::Invalidated,
            // an add never names an already cached subject
            (EventKind::NodeAdded | EventKind::PropertyAdded, _) => return false,
        };
        if *status == target {
            return false;
        }
        *status = target;
        true
    }
}

/// A cached node or property.
#[derive(Debug)]
pub struct ItemState {
    id: ItemId,
    parent_id: Option<ItemId>,
    payload: RwLock<Arc<ItemPayload>>,
}

impl ItemState {
    /// Creates a state with an explicit payload.
    pub fn new(id: ItemId, parent_id: Option<ItemId>, payload: ItemPayload) -> Self {
        Self {
            id,
            parent_id,
            payload: RwLock::new(Arc::new(payload)),
        }
    }

    /// Creates the state of the root node.
    pub fn root(id: ItemId) -> Self {
        Self::new(id, None, ItemPayload::Node(NodePayload::new("")))
    }

    /// Creates a node state.
    pub fn node(id: ItemId, parent_id: ItemId, payload: NodePayload) -> Self {
        Self::new(id, Some(parent_id), ItemPayload::Node(payload))
    }

    /// Creates a property state.
    pub fn property(id: ItemId, parent_id: ItemId, name: impl Into<String>) -> Self {
        Self::new(
            id,
            Some(parent_id),
            ItemPayload::Property(PropertyPayload::new(name)),
        )
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn parent_id(&self) -> Option<ItemId> {
        self.parent_id
    }

    /// Returns a consistent snapshot of the current payload.
    pub fn payload(&self) -> Arc<ItemPayload> {
        Arc::clone(&self.payload.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn status(&self) -> ItemStatus {
        self.payload().status()
    }

    pub fn is_node(&self) -> bool {
        matches!(*self.payload(), ItemPayload::Node(_))
    }

    /// Folds `event` into the payload. Events that do not concern this item
    /// as subject or parent are ignored.
    pub fn apply(&self, event: &ChangeEvent) {
        let mut guard = self.payload.write().unwrap_or_else(PoisonError::into_inner);
        match guard.refreshed(self.id, event) {
            Some(next) => {
                *guard = Arc::new(next);
                trace!(item = %self.id, kind = %event.kind, subject = %event.item_id, "refreshed item state");
            }
            None => {
                trace!(item = %self.id, kind = %event.kind, subject = %event.item_id, "event left item state unchanged");
            }
        }
    }
}

impl RefreshableState for ItemState {
    fn id(&self) -> ItemId {
        self.id
    }

    fn apply(&self, event: &ChangeEvent) {
        ItemState::apply(self, event);
    }
}
