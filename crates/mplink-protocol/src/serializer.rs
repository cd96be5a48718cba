//! The typed packet serializer: a tag-keyed dispatch table.
//!
//! [`PacketSerializer`] owns three tables under one lock:
//!
//! - tag → dispatch entry (an opaque decode function plus a type-erased
//!   handler, built together at registration so the handler is only ever
//!   invoked with the concrete payload type it was registered for)
//! - payload `TypeId` → tag, so outbound messages can be routed without
//!   the caller repeating the tag
//! - an ordered list of [`SubSerializer`]s for composite envelope kinds
//!   whose payload sections are encoded by independently-registered codecs
//!
//! `PacketSerializer` implements [`SubSerializer`] itself, which is how an
//! entire registry nests as one opaque sub-protocol under a single
//! reserved slot in the host transport's message-type space.
//!
//! # Replace semantics
//!
//! Registering a handler for a tag that already has one *replaces* it —
//! last write wins. This is deliberate (it enables hot-reload/override
//! patterns), but it means two modules claiming the same tag silently
//! shadow each other rather than both receiving the message.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{de::DeserializeOwned, Serialize};

use crate::tag::{split_envelope, write_envelope};
use crate::{Codec, MessageTag, ProtocolError};

/// Marker for payload types the serializer can carry.
///
/// Blanket-implemented: any owned serde type qualifies.
pub trait Packet: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Packet for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// An independently-registered encoder/decoder for one tag's payload
/// section, generic over the sender context `P`.
///
/// Object-safe so implementations can be stored behind `Arc` and handed
/// across the transport boundary. [`PacketSerializer`] implements this
/// trait, so registries nest.
pub trait SubSerializer<P>: Send + Sync {
    /// Returns `true` if this serializer can encode the given payload type.
    fn handles(&self, type_id: TypeId) -> bool;

    /// Encodes an erased payload, appending a complete envelope to `out`.
    fn encode_packet(
        &self,
        packet: &(dyn Any + Send + Sync),
        out: &mut Vec<u8>,
    ) -> Result<(), ProtocolError>;

    /// Decodes one payload section and dispatches it for `sender`.
    fn decode_packet(
        &self,
        data: &[u8],
        sender: &P,
    ) -> Result<(), ProtocolError>;
}

// ---------------------------------------------------------------------------
// Dispatch tables
// ---------------------------------------------------------------------------

/// Decode-and-invoke closure stored per tag. Built at registration time so
/// the payload type never escapes as `dyn Any` on the inbound path.
type DispatchFn<P> =
    Arc<dyn Fn(&[u8], &P) -> Result<(), ProtocolError> + Send + Sync>;

/// Encode closure stored per payload type for outbound routing.
type EncodeFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Result<Vec<u8>, ProtocolError> + Send + Sync>;

struct Registry<P> {
    handlers: HashMap<MessageTag, DispatchFn<P>>,
    outbound: HashMap<TypeId, (MessageTag, EncodeFn)>,
    subs: Vec<(MessageTag, Arc<dyn SubSerializer<P>>)>,
}

impl<P> Registry<P> {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            outbound: HashMap::new(),
            subs: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// PacketSerializer
// ---------------------------------------------------------------------------

/// Routes tagged payloads to strongly-typed handlers.
///
/// Generic over the sender context `P` (the session layer instantiates it
/// with the transport's raw player handle) and the payload codec `C`.
///
/// All methods take `&self`; the tables live behind an `RwLock` so the
/// registry can be shared with the transport as `Arc<dyn SubSerializer>`
/// while feature modules keep registering through it. The lock is never
/// held across a handler invocation, so handlers may re-enter the
/// registry (re-register, unregister, send) without deadlocking.
pub struct PacketSerializer<P, C> {
    codec: C,
    registry: RwLock<Registry<P>>,
}

impl<P, C> PacketSerializer<P, C>
where
    P: 'static,
    C: Codec + Clone,
{
    /// Creates an empty serializer using the given codec.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            registry: RwLock::new(Registry::new()),
        }
    }

    /// Registers a typed handler for `tag`, replacing any existing one.
    ///
    /// `constructor` produces an empty payload instance that the codec
    /// fills in place — this supports payload types that deserialize into
    /// a pre-existing mutable value rather than via a return value.
    ///
    /// Registration also binds `M`'s type to `tag` for outbound routing,
    /// so [`encode`](Self::encode) works for `M` from this point on.
    pub fn register<M, F, Ctor>(&self, tag: MessageTag, handler: F, constructor: Ctor)
    where
        M: Packet,
        F: Fn(M, &P) + Send + Sync + 'static,
        Ctor: Fn() -> M + Send + Sync + 'static,
    {
        let codec = self.codec.clone();
        let dispatch: DispatchFn<P> = Arc::new(move |payload, sender| {
            let mut message = constructor();
            codec.decode_into(payload, &mut message)?;
            handler(message, sender);
            Ok(())
        });

        let codec = self.codec.clone();
        let encode: EncodeFn = Arc::new(move |packet| {
            let message = packet
                .downcast_ref::<M>()
                .expect("outbound table is keyed by TypeId");
            codec.encode(message)
        });

        let mut reg = self.write_lock();
        reg.handlers.insert(tag, dispatch);
        // A tag can only carry one payload type at a time; drop any stale
        // type binding from a previous registration under this tag.
        reg.outbound.retain(|_, (t, _)| *t != tag);
        reg.outbound.insert(TypeId::of::<M>(), (tag, encode));
    }

    /// Removes the handler for `tag` along with its outbound type binding.
    /// No-op if nothing is registered.
    pub fn unregister(&self, tag: MessageTag) {
        let mut reg = self.write_lock();
        reg.handlers.remove(&tag);
        reg.outbound.retain(|_, (t, _)| *t != tag);
    }

    /// Registers a sub-serializer for a composite envelope tag.
    ///
    /// Multiple sub-serializers may be registered concurrently, for the
    /// same tag or different ones; dispatch consults them in insertion
    /// order when no direct handler matches.
    pub fn register_sub_serializer(
        &self,
        tag: MessageTag,
        sub: Arc<dyn SubSerializer<P>>,
    ) {
        self.write_lock().subs.push((tag, sub));
    }

    /// Removes a sub-serializer by identity. No-op if it was never
    /// registered under `tag`.
    pub fn unregister_sub_serializer(
        &self,
        tag: MessageTag,
        sub: &Arc<dyn SubSerializer<P>>,
    ) {
        self.write_lock()
            .subs
            .retain(|(t, s)| *t != tag || !Arc::ptr_eq(s, sub));
    }

    /// Encodes a message into a complete envelope.
    ///
    /// The tag is resolved from `M`'s type: either a direct registration
    /// or a sub-serializer that handles it.
    ///
    /// # Errors
    /// [`ProtocolError::UnregisteredType`] if nothing binds `M` to a tag.
    pub fn encode<M: Packet>(&self, message: &M) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::new();
        self.encode_erased(message, &mut out)?;
        Ok(out)
    }

    /// Decodes an envelope and dispatches its payload for `sender`.
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedPayload`] — bad envelope or payload
    /// - [`ProtocolError::UnknownTag`] — nothing registered for the tag
    pub fn dispatch(&self, data: &[u8], sender: &P) -> Result<(), ProtocolError> {
        let (tag, payload) = split_envelope(data)?;

        // Clone the entry out and release the lock before invoking, so
        // handlers can re-enter the registry.
        let handler = self.read_lock().handlers.get(&tag).cloned();
        if let Some(handler) = handler {
            return handler(payload, sender);
        }

        let subs: Vec<Arc<dyn SubSerializer<P>>> = self
            .read_lock()
            .subs
            .iter()
            .filter(|(t, _)| *t == tag)
            .map(|(_, s)| Arc::clone(s))
            .collect();
        if subs.is_empty() {
            return Err(ProtocolError::UnknownTag(tag));
        }
        for sub in subs {
            sub.decode_packet(payload, sender)?;
        }
        Ok(())
    }

    /// Like [`dispatch`](Self::dispatch), but applies the drop policy:
    /// failures are logged and the message discarded. This is the entry
    /// point for dispatch loops that must never abort.
    pub fn receive(&self, data: &[u8], sender: &P) {
        if let Err(e) = self.dispatch(data, sender) {
            tracing::warn!(error = %e, "dropping undeliverable message");
        }
    }

    /// Number of directly-registered handlers.
    pub fn handler_count(&self) -> usize {
        self.read_lock().handlers.len()
    }

    fn encode_erased(
        &self,
        packet: &(dyn Any + Send + Sync),
        out: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let type_id = packet.type_id();

        let direct = self
            .read_lock()
            .outbound
            .get(&type_id)
            .map(|(tag, encode)| (*tag, Arc::clone(encode)));
        if let Some((tag, encode)) = direct {
            let payload = encode(packet)?;
            return write_envelope(tag, &payload, out);
        }

        let delegated = self
            .read_lock()
            .subs
            .iter()
            .find(|(_, s)| s.handles(type_id))
            .map(|(tag, s)| (*tag, Arc::clone(s)));
        if let Some((tag, sub)) = delegated {
            let mut payload = Vec::new();
            sub.encode_packet(packet, &mut payload)?;
            return write_envelope(tag, &payload, out);
        }

        Err(ProtocolError::UnregisteredType(format!("{type_id:?}")))
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Registry<P>> {
        self.registry.read().expect("packet registry lock poisoned")
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Registry<P>> {
        self.registry.write().expect("packet registry lock poisoned")
    }
}

impl<P, C> SubSerializer<P> for PacketSerializer<P, C>
where
    P: 'static,
    C: Codec + Clone,
{
    fn handles(&self, type_id: TypeId) -> bool {
        let reg = self.read_lock();
        reg.outbound.contains_key(&type_id)
            || reg.subs.iter().any(|(_, s)| s.handles(type_id))
    }

    fn encode_packet(
        &self,
        packet: &(dyn Any + Send + Sync),
        out: &mut Vec<u8>,
    ) -> Result<(), ProtocolError> {
        self.encode_erased(packet, out)
    }

    fn decode_packet(
        &self,
        data: &[u8],
        sender: &P,
    ) -> Result<(), ProtocolError> {
        self.dispatch(data, sender)
    }
}

// =========================================================================
// Tests
// =========================================================================
