//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while receiving and reconciling event bundles.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An event carried a kind outside the known vocabulary. The bundle was
    /// rejected before any cache entry was touched.
    #[error("invalid event type: {0}")]
    InvalidEventKind(u32),

    /// Any other failure decoding upstream types.
    #[error("type error: {0}")]
    Types(treecache_types::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The transport cannot provide an event filter.
    #[error("event filter unsupported: {0}")]
    FilterUnsupported(String),

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

impl From<treecache_types::Error> for SyncError {
    fn from(err: treecache_types::Error) -> Self {
        match err {
            treecache_types::Error::InvalidEventKind(code) => SyncError::InvalidEventKind(code),
            other => SyncError::Types(other),
        }
    }
}
