//! Typed message routing and extended player state over an
//! externally-owned multiplayer session transport.
//!
//! The host transport owns connections, delivery, player identity, and
//! the synchronized clock. This crate layers on top of it:
//!
//! 1. **Session shadow** — one [`ExtendedPlayer`] record per connected
//!    identity, kept in lockstep with the transport's events
//!    ([`ExtendedSessionManager`])
//! 2. **Typed routing** — tag-keyed handlers that receive decoded
//!    payloads and the resolved sender record ([`register_callback`])
//! 3. **Capability publishing** — the `modded`/`customsongs`/
//!    `enforcemods` flags peers use to discover what this client
//!    supports ([`Capabilities`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Feature modules (above)  ← register callbacks, attach extension state
//!     ↕
//! Extension layer (this crate)  ← shadows players, routes typed messages
//!     ↕
//! Host transport (below)  ← connections, delivery, identity, sync clock
//! ```
//!
//! [`register_callback`]: ExtendedSessionManager::register_callback

mod capabilities;
mod error;
mod events;
mod manager;
mod player;

pub use capabilities::{
    publish_local_capabilities, Capabilities, CapabilityPanel,
    STATE_CUSTOM_SONGS, STATE_ENFORCE_MODS, STATE_MODDED,
};
pub use error::SessionError;
pub use events::{EventHub, SubscriptionId};
pub use manager::{ExtendedSessionManager, SessionEvents, EXTENSION_PROTOCOL_TAG};
pub use player::{ExtendedPlayer, Extensions};

// The protocol and transport surfaces travel with the layer; re-export
// the types integrations touch directly.
pub use mplink_protocol::{
    Codec, JsonCodec, MessageTag, Packet, PacketSerializer, ProtocolError,
    SubSerializer,
};
pub use mplink_transport::{
    ConnectionFailedReason, DisconnectedReason, EventListener, MemoryTransport,
    RawPlayer, SessionTransport, TransportEvent,
};
