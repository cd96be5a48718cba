//! Sub-protocol routing for mplink.
//!
//! This crate defines the private message namespace that mplink nests
//! inside a host transport's top-level message space:
//!
//! - **Tags** ([`MessageTag`]) — one-byte discriminators identifying a
//!   payload kind within the sub-protocol.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how payloads are
//!   converted to/from bytes.
//! - **Serializer** ([`PacketSerializer`], [`SubSerializer`]) — the
//!   dispatch table mapping tags to typed handlers, and the composition
//!   hook that lets whole registries nest under a single tag.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding, decoding, and dispatch.
//!
//! # Architecture
//!
//! The serializer never talks to the network. The host transport hands it
//! already-delivered bytes together with the sending connection, and it
//! hands encoded bytes back for the transport to deliver. Everything above
//! (player records, session events) lives in the `mplink` crate.
//!
//! ```text
//! Transport (bytes + sender) → PacketSerializer (typed payload + sender)
//! ```

mod codec;
mod error;
mod serializer;
mod tag;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use serializer::{Packet, PacketSerializer, SubSerializer};
pub use tag::MessageTag;
