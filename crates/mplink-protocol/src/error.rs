//! Error types for the sub-protocol layer.
//!
//! Every fault here is recoverable by design: a bad or unroutable message
//! is logged and dropped by the dispatch path, never allowed to abort the
//! shared dispatch stream that other feature modules depend on.

use crate::MessageTag;

/// Errors that can occur while encoding, decoding, or routing packets.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a payload into bytes).
    ///
    /// The inner `serde_json::Error` is the original error from the codec.
    /// We wrap it so callers deal with `ProtocolError` uniformly.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The payload bytes could not be turned back into a value.
    ///
    /// Covers a truncated or over-long envelope as well as decode failures
    /// inside the payload section. Policy: log and drop the one message.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// No handler or sub-serializer is registered for the received tag.
    ///
    /// Feature modules may be absent or mismatched across peers, so this
    /// is an expected condition, not a bug signal.
    #[error("no handler registered for message tag {0}")]
    UnknownTag(MessageTag),

    /// A packet type was sent before anything bound it to a tag.
    ///
    /// Outbound routing is keyed by the payload's concrete type; a type
    /// becomes sendable the moment a callback or sub-serializer is
    /// registered for it.
    #[error("packet type {0} has no registered tag")]
    UnregisteredType(String),
}
