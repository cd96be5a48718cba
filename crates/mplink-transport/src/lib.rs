//! The session transport collaborator surface.
//!
//! mplink does not implement a network transport — it augments one that
//! already exists (connection establishment, delivery guarantees, player
//! identity, and the synchronization clock are all the transport's job).
//! This crate defines the interface mplink consumes:
//!
//! - [`SessionTransport`] — the methods and accessors the extension layer
//!   calls on the host transport.
//! - [`TransportEvent`] — the raw connection/state event stream the
//!   transport delivers, in one ordered sequence per session.
//! - [`RawPlayer`] — the transport's own view of a connected participant.
//! - [`MemoryTransport`] — an in-memory implementation for tests and
//!   demos; real integrations adapt their host transport to the trait.

mod event;
mod memory;
mod player;

pub use event::{ConnectionFailedReason, DisconnectedReason, TransportEvent};
pub use memory::MemoryTransport;
pub use player::RawPlayer;

use std::sync::Arc;

use mplink_protocol::SubSerializer;

/// A sink for the transport's raw event stream.
///
/// `Arc` rather than `Box` so transports can snapshot their listener list
/// before invoking it — the defined mutation-during-iteration policy.
pub type EventListener = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

/// The host multiplayer session transport, as consumed by mplink.
///
/// Object-safe on purpose: integrations hand the extension layer an
/// `Arc<T>` (or `Arc<dyn SessionTransport>`) wrapping whatever their host
/// ecosystem provides.
///
/// # Delivery contract
///
/// The transport is expected to deliver events for a given identity as a
/// single ordered stream: connect before state changes, state changes
/// before disconnect. mplink tolerates violations (they are logged as
/// consistency faults, never fatal), but ordering is what keeps the
/// extended player mapping exact.
pub trait SessionTransport: Send + Sync + 'static {
    /// Registers a sink for the raw event stream.
    fn subscribe(&self, listener: EventListener);

    /// Mounts a serializer under one slot of the transport's own
    /// top-level message-type space. Everything mplink routes travels
    /// inside this single reserved tag.
    fn register_serializer(
        &self,
        top_level_tag: u8,
        serializer: Arc<dyn SubSerializer<RawPlayer>>,
    );

    /// Publishes a boolean flag into the shared player-state channel,
    /// where every peer (and the transport's own state-changed events)
    /// can observe it.
    fn set_local_player_state(&self, key: &str, active: bool);

    /// Looks up a currently-connected player by stable identity.
    fn connected_player_by_id(&self, user_id: &str) -> Option<RawPlayer>;

    /// Sends already-encoded bytes reliably to the session.
    fn send(&self, data: Vec<u8>);

    /// Sends already-encoded bytes on the unreliable channel.
    fn send_unreliable(&self, data: Vec<u8>);

    // -- Read-only accessors --------------------------------------------

    /// The local participant's handle.
    fn local_player(&self) -> RawPlayer;

    /// The participant the transport designates as authoritative for
    /// shared session state, if any.
    fn connection_owner(&self) -> Option<RawPlayer>;

    /// Whether the local participant is the connection owner.
    fn is_connection_owner(&self) -> bool {
        self.connection_owner()
            .is_some_and(|owner| owner.user_id() == self.local_player().user_id())
    }

    /// The transport's synchronized session clock, in seconds.
    fn sync_time(&self) -> f32;

    /// Whether the synchronized clock has completed its initial handshake.
    fn is_sync_time_initialized(&self) -> bool;

    /// The measured offset applied to the synchronized clock, in seconds.
    fn sync_time_delay(&self) -> f32;

    /// Number of currently-connected remote players.
    fn connected_player_count(&self) -> usize;

    /// Whether the session is established.
    fn is_connected(&self) -> bool;

    /// Whether a connection attempt is in flight.
    fn is_connecting(&self) -> bool;

    /// Convenience: connecting or already connected.
    fn is_connecting_or_connected(&self) -> bool {
        self.is_connecting() || self.is_connected()
    }

    /// Whether the local participant is spectating rather than playing.
    fn is_spectating(&self) -> bool;
}
