//! Core type definitions for treecache.
//!
//! This crate defines the wire-independent vocabulary shared by the cache
//! store and the reconciler:
//! - Item identifiers (UUID v7)
//! - Change events and the five event kinds
//! - Event bundles, the unit of atomic delivery
//!
//! The numeric kind codes used by upstream event sources live here too, so
//! that an unknown code is rejected before a bundle ever reaches the cache.

mod event;
mod ids;

pub use event::{ChangeEvent, EventBundle, EventKind, WireBundle, WireEvent};
pub use ids::ItemId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid event type: {0}")]
    InvalidEventKind(u32),
}
