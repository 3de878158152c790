//! Change events and event bundles.
//!
//! A change event reports one modification observed in the authoritative
//! store. Events arrive grouped in bundles; a bundle is the unit of atomic
//! delivery (typically one committed transaction on the remote side).
//!
//! Upstream sources describe the kind of an event with a numeric bit code.
//! [`WireEvent`] and [`WireBundle`] carry that raw form; converting them into
//! [`ChangeEvent`] / [`EventBundle`] is where unknown codes are rejected.

use crate::{Error, ItemId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of change an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A node was added below its parent.
    NodeAdded,
    /// A node was removed from its parent.
    NodeRemoved,
    /// A property was added to its parent node.
    PropertyAdded,
    /// A property was removed from its parent node.
    PropertyRemoved,
    /// The value of a property changed.
    PropertyChanged,
}

impl EventKind {
    pub const NODE_ADDED: u32 = 0x1;
    pub const NODE_REMOVED: u32 = 0x2;
    pub const PROPERTY_ADDED: u32 = 0x4;
    pub const PROPERTY_REMOVED: u32 = 0x8;
    pub const PROPERTY_CHANGED: u32 = 0x10;

    /// Mask selecting every kind, as used by subscription filters.
    pub const ALL_TYPES: u32 = Self::NODE_ADDED
        | Self::NODE_REMOVED
        | Self::PROPERTY_ADDED
        | Self::PROPERTY_REMOVED
        | Self::PROPERTY_CHANGED;

    /// Every kind, in code order.
    pub const ALL: [EventKind; 5] = [
        EventKind::NodeAdded,
        EventKind::NodeRemoved,
        EventKind::PropertyAdded,
        EventKind::PropertyRemoved,
        EventKind::PropertyChanged,
    ];

    /// Returns the wire code for this kind.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            EventKind::NodeAdded => Self::NODE_ADDED,
            EventKind::NodeRemoved => Self::NODE_REMOVED,
            EventKind::PropertyAdded => Self::PROPERTY_ADDED,
            EventKind::PropertyRemoved => Self::PROPERTY_REMOVED,
            EventKind::PropertyChanged => Self::PROPERTY_CHANGED,
        }
    }

    /// Decodes a wire code. Exactly one bit must be set, and it must be one
    /// of the five known kinds.
    pub fn from_code(code: u32) -> Result<Self, Error> {
        match code {
            Self::NODE_ADDED => Ok(EventKind::NodeAdded),
            Self::NODE_REMOVED => Ok(EventKind::NodeRemoved),
            Self::PROPERTY_ADDED => Ok(EventKind::PropertyAdded),
            Self::PROPERTY_REMOVED => Ok(EventKind::PropertyRemoved),
            Self::PROPERTY_CHANGED => Ok(EventKind::PropertyChanged),
            other => Err(Error::InvalidEventKind(other)),
        }
    }

    /// Returns true for `NodeAdded` and `PropertyAdded`.
    #[must_use]
    pub const fn is_addition(self) -> bool {
        matches!(self, EventKind::NodeAdded | EventKind::PropertyAdded)
    }

    /// Returns true for `NodeRemoved` and `PropertyRemoved`.
    #[must_use]
    pub const fn is_removal(self) -> bool {
        matches!(self, EventKind::NodeRemoved | EventKind::PropertyRemoved)
    }

    /// Returns true if the subject of this kind is a property.
    #[must_use]
    pub const fn concerns_property(self) -> bool {
        matches!(
            self,
            EventKind::PropertyAdded | EventKind::PropertyRemoved | EventKind::PropertyChanged
        )
    }
}

impl TryFrom<u32> for EventKind {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::NodeAdded => "node_added",
            EventKind::NodeRemoved => "node_removed",
            EventKind::PropertyAdded => "property_added",
            EventKind::PropertyRemoved => "property_removed",
            EventKind::PropertyChanged => "property_changed",
        };
        f.write_str(s)
    }
}

/// One change observed in the remote store.
///
/// Events are immutable. `parent_id` is the containing node at the time of
/// the change and is absent only for root-level events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The item that changed.
    pub item_id: ItemId,

    /// The node containing the item when the change happened.
    pub parent_id: Option<ItemId>,

    /// Name of the item inside its parent.
    pub name: String,

    /// What happened.
    pub kind: EventKind,
}

impl ChangeEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(
        item_id: ItemId,
        parent_id: Option<ItemId>,
        name: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            item_id,
            parent_id,
            name: name.into(),
            kind,
        }
    }

    #[must_use]
    pub fn node_added(item_id: ItemId, parent_id: ItemId, name: impl Into<String>) -> Self {
        Self::new(item_id, Some(parent_id), name, EventKind::NodeAdded)
    }

    #[must_use]
    pub fn node_removed(item_id: ItemId, parent_id: ItemId, name: impl Into<String>) -> Self {
        Self::new(item_id, Some(parent_id), name, EventKind::NodeRemoved)
    }

    #[must_use]
    pub fn property_added(item_id: ItemId, parent_id: ItemId, name: impl Into<String>) -> Self {
        Self::new(item_id, Some(parent_id), name, EventKind::PropertyAdded)
    }

    #[must_use]
    pub fn property_removed(item_id: ItemId, parent_id: ItemId, name: impl Into<String>) -> Self {
        Self::new(item_id, Some(parent_id), name, EventKind::PropertyRemoved)
    }

    #[must_use]
    pub fn property_changed(item_id: ItemId, parent_id: ItemId, name: impl Into<String>) -> Self {
        Self::new(item_id, Some(parent_id), name, EventKind::PropertyChanged)
    }

    /// Returns a copy of this event with the parent id cleared.
    #[must_use]
    pub fn without_parent(mut self) -> Self {
        self.parent_id = None;
        self
    }
}

/// An ordered group of events delivered as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBundle {
    /// The events, in delivery order.
    pub events: Vec<ChangeEvent>,

    /// Whether the bundle was caused by this client's own operations.
    #[serde(default)]
    pub is_local: bool,
}

impl EventBundle {
    /// Creates a bundle of remote events.
    #[must_use]
    pub fn new(events: Vec<ChangeEvent>) -> Self {
        Self {
            events,
            is_local: false,
        }
    }

    /// Creates an empty bundle.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Marks the bundle as local.
    #[must_use]
    pub fn local(mut self) -> Self {
        self.is_local = true;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.events.iter()
    }
}

impl FromIterator<ChangeEvent> for EventBundle {
    fn from_iter<I: IntoIterator<Item = ChangeEvent>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// An event as delivered by an upstream source, with a raw kind code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    pub item_id: ItemId,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u32,
}

impl From<&ChangeEvent> for WireEvent {
    fn from(event: &ChangeEvent) -> Self {
        Self {
            item_id: event.item_id,
            parent_id: event.parent_id,
            name: event.name.clone(),
            kind: event.kind.code(),
        }
    }
}

impl TryFrom<WireEvent> for ChangeEvent {
    type Error = Error;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: EventKind::from_code(wire.kind)?,
            item_id: wire.item_id,
            parent_id: wire.parent_id,
            name: wire.name,
        })
    }
}

/// A bundle as delivered by an upstream source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBundle {
    pub events: Vec<WireEvent>,
    #[serde(default)]
    pub is_local: bool,
}

impl WireBundle {
    /// Parses a bundle from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<&EventBundle> for WireBundle {
    fn from(bundle: &EventBundle) -> Self {
        Self {
            events: bundle.events.iter().map(WireEvent::from).collect(),
            is_local: bundle.is_local,
        }
    }
}

impl TryFrom<WireBundle> for EventBundle {
    type Error = Error;

    /// Decodes every event; a single unknown kind rejects the whole bundle.
    fn try_from(wire: WireBundle) -> Result<Self, Self::Error> {
        let events = wire
            .events
            .into_iter()
            .map(ChangeEvent::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            events,
            is_local: wire.is_local,
        })
    }
}
