//! Error types for the brook client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the transport and connect plumbing.
///
/// Session lifecycle operations never return these across the public
/// boundary: failures there are logged and converted to no-ops, and
/// callers observe state (`is_connected`) instead of catching errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The service rejected or aborted a connection attempt.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The underlying transport failed to carry a message.
    #[error("transport error: {0}")]
    Transport(String),

    /// A bounded wait elapsed before the condition was met.
    #[error("timed out after {ms}ms waiting for {condition}")]
    Timeout { ms: u64, condition: String },

    /// The transport channel closed while a message was in flight.
    #[error("channel closed")]
    ChannelClosed,
}
