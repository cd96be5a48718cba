//! Error types for the session extension layer.

use thiserror::Error;

/// Errors surfaced by the extension layer.
///
/// Nothing here is fatal. Dispatch-time faults (`UnknownSender`) are
/// logged and the offending message dropped; `NotFound` goes back to the
/// explicit caller; `ConsistencyFault` marks a transport ordering
/// violation that the layer absorbs and continues past.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No extended record exists for the identity — it never connected,
    /// or it already disconnected.
    #[error("no extended player for user id {0}")]
    NotFound(String),

    /// A message arrived attributed to an identity with no record. The
    /// message is dropped.
    #[error("sender {0} is not connected")]
    UnknownSender(String),

    /// The transport's event stream violated its ordering contract
    /// (duplicate connect, disconnect without connect, state change for
    /// an unknown player).
    #[error("session consistency fault: {0}")]
    ConsistencyFault(String),

    /// An encode failure bubbling up from the packet registry.
    #[error(transparent)]
    Protocol(#[from] mplink_protocol::ProtocolError),
}
