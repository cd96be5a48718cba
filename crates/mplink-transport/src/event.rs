//! Raw events delivered by the host transport.
//!
//! These are already-resolved outcomes — the transport owns retries,
//! timeouts, and cancellation. mplink only reacts.

use std::fmt;

use crate::RawPlayer;

/// Why a connection attempt did not result in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailedReason {
    Unknown,
    Timeout,
    ServerUnreachable,
    VersionMismatch,
    ServerFull,
}

impl fmt::Display for ConnectionFailedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Timeout => write!(f, "timeout"),
            Self::ServerUnreachable => write!(f, "server unreachable"),
            Self::VersionMismatch => write!(f, "version mismatch"),
            Self::ServerFull => write!(f, "server full"),
        }
    }
}

/// Why an established session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectedReason {
    Unknown,
    UserInitiated,
    Timeout,
    Kicked,
    ServerShutdown,
}

impl fmt::Display for DisconnectedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::UserInitiated => write!(f, "user initiated"),
            Self::Timeout => write!(f, "timeout"),
            Self::Kicked => write!(f, "kicked"),
            Self::ServerShutdown => write!(f, "server shutdown"),
        }
    }
}

/// One entry in the transport's raw event stream.
///
/// Session-level events (`Connected`, `ConnectionFailed`, `Disconnected`)
/// concern the local participant's link; player-level events carry the
/// transport's snapshot of the peer they concern.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The local participant's session is established.
    Connected,

    /// A connection attempt failed before a session existed.
    ConnectionFailed(ConnectionFailedReason),

    /// The established session ended.
    Disconnected(DisconnectedReason),

    /// A remote player joined the session.
    PlayerConnected(RawPlayer),

    /// A remote player left the session.
    PlayerDisconnected(RawPlayer),

    /// A player's shared state set changed.
    PlayerStateChanged(RawPlayer),
}
