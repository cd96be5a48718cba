//! The session shadow: extended records and typed routing over the
//! host transport.
//!
//! [`ExtendedSessionManager`] is the central piece of the layer. It is
//! responsible for:
//!
//! - mirroring the transport's connected-player set as [`ExtendedPlayer`]
//!   records (one per identity, created on connect, removed on disconnect)
//! - mounting the typed packet registry under the layer's reserved slot
//!   in the transport's top-level message-type space
//! - resolving message senders to extended records before handlers run
//! - publishing the local capability flags once at startup
//! - forwarding the connection owner's capability flags to the UI panel
//!
//! # Concurrency note
//!
//! The transport delivers events as one ordered stream, but nothing here
//! assumes a single thread: the player map and subscriber lists sit
//! behind `RwLock`, and no lock is ever held across a callback
//! invocation. Handlers may look players up, send, and re-register from
//! inside any event.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use mplink_protocol::{
    JsonCodec, MessageTag, Packet, PacketSerializer, SubSerializer,
};
use mplink_transport::{
    ConnectionFailedReason, DisconnectedReason, RawPlayer, SessionTransport,
    TransportEvent,
};

use crate::capabilities::{
    publish_local_capabilities, Capabilities, CapabilityPanel,
    STATE_CUSTOM_SONGS, STATE_ENFORCE_MODS,
};
use crate::events::EventHub;
use crate::{ExtendedPlayer, SessionError};

/// The slot the layer claims in the transport's top-level message-type
/// space. Every typed message travels nested inside this single tag.
pub const EXTENSION_PROTOCOL_TAG: u8 = 4;

/// The extended-level event surface.
///
/// Connection events are re-published from the transport; player events
/// carry the resolved [`ExtendedPlayer`] record instead of the raw
/// handle. All hubs share the emission semantics of [`EventHub`].
#[derive(Default)]
pub struct SessionEvents {
    /// The local session is established.
    pub connected: EventHub<()>,
    /// A connection attempt failed.
    pub connection_failed: EventHub<ConnectionFailedReason>,
    /// The established session ended.
    pub disconnected: EventHub<DisconnectedReason>,
    /// A player's record was created.
    pub player_joined: EventHub<ExtendedPlayer>,
    /// A player is leaving; the record is still resolvable while
    /// subscribers run and is removed after they return.
    pub player_left: EventHub<ExtendedPlayer>,
    /// A player's shared state set changed. Fires for the local
    /// participant too.
    pub player_state_changed: EventHub<ExtendedPlayer>,
}

/// Shadows the host transport's session with extended player records
/// and a typed message registry.
pub struct ExtendedSessionManager<T: SessionTransport> {
    transport: Arc<T>,
    capabilities: Capabilities,
    /// The local participant's record. Never in `players` — the map
    /// tracks remote identities only, matching the transport's events.
    local: ExtendedPlayer,
    players: Arc<RwLock<HashMap<String, ExtendedPlayer>>>,
    serializer: Arc<PacketSerializer<RawPlayer, JsonCodec>>,
    panel: RwLock<Option<Arc<dyn CapabilityPanel>>>,
    events: SessionEvents,
}

impl<T: SessionTransport> ExtendedSessionManager<T> {
    /// Creates a manager over the given transport.
    ///
    /// Returns an `Arc` because [`initialize`](Self::initialize) hands
    /// the transport a weak self-reference; nothing is subscribed or
    /// published until `initialize` is called.
    pub fn new(transport: Arc<T>, capabilities: Capabilities) -> Arc<Self> {
        let local = ExtendedPlayer::new(transport.local_player());
        Arc::new(Self {
            transport,
            capabilities,
            local,
            players: Arc::new(RwLock::new(HashMap::new())),
            serializer: Arc::new(PacketSerializer::new(JsonCodec)),
            panel: RwLock::new(None),
            events: SessionEvents::default(),
        })
    }

    /// Wires the manager into the transport: subscribes to the event
    /// stream, mounts the packet registry under
    /// [`EXTENSION_PROTOCOL_TAG`], and publishes the local capability
    /// flags. Call exactly once, before any traffic flows.
    ///
    /// The subscription holds only a weak reference, so dropping every
    /// strong handle shuts the manager down even though the transport
    /// outlives it.
    pub fn initialize(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.transport.subscribe(Arc::new(move |event| {
            if let Some(manager) = weak.upgrade() {
                manager.handle_event(event);
            }
        }));

        self.transport.register_serializer(
            EXTENSION_PROTOCOL_TAG,
            Arc::clone(&self.serializer) as Arc<dyn SubSerializer<RawPlayer>>,
        );

        publish_local_capabilities(self.transport.as_ref(), &self.capabilities);
        tracing::info!(
            tag = EXTENSION_PROTOCOL_TAG,
            "extension layer initialized"
        );
    }

    /// Sets the UI collaborator that mirrors the connection owner's
    /// capability flags. Replaces any previous panel.
    pub fn set_capability_panel(&self, panel: Arc<dyn CapabilityPanel>) {
        *self.panel.write().expect("panel lock poisoned") = Some(panel);
    }

    /// The extended-level event surface.
    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    // -- Player lookup ----------------------------------------------------

    /// Resolves a raw handle to its extended record.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the identity never connected or
    /// already disconnected.
    pub fn get_extended_player(
        &self,
        raw: &RawPlayer,
    ) -> Result<ExtendedPlayer, SessionError> {
        self.get_extended_player_by_id(raw.user_id())
    }

    /// Resolves a stable identity to its extended record. The local
    /// participant resolves too.
    pub fn get_extended_player_by_id(
        &self,
        user_id: &str,
    ) -> Result<ExtendedPlayer, SessionError> {
        if user_id == self.local.user_id() {
            return Ok(self.local.clone());
        }
        self.read_players()
            .get(user_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(user_id.to_string()))
    }

    /// Number of remote extended records currently held.
    pub fn extended_player_count(&self) -> usize {
        self.read_players().len()
    }

    // -- Typed message routing --------------------------------------------

    /// Registers a typed handler for `tag`, replacing any existing one.
    ///
    /// The handler receives the sender's [`ExtendedPlayer`] record, not
    /// the raw handle: the wrapper resolves the sender first, and drops
    /// the message (logged, never propagated) if no record exists.
    pub fn register_callback<M, F, Ctor>(
        &self,
        tag: MessageTag,
        handler: F,
        constructor: Ctor,
    ) where
        M: Packet,
        F: Fn(M, &ExtendedPlayer) + Send + Sync + 'static,
        Ctor: Fn() -> M + Send + Sync + 'static,
    {
        let players = Arc::clone(&self.players);
        let local = self.local.clone();
        self.serializer.register(
            tag,
            move |message: M, sender: &RawPlayer| {
                let record = if sender.user_id() == local.user_id() {
                    Some(local.clone())
                } else {
                    players
                        .read()
                        .expect("player map lock poisoned")
                        .get(sender.user_id())
                        .cloned()
                };
                match record {
                    Some(player) => handler(message, &player),
                    None => tracing::warn!(
                        error = %SessionError::UnknownSender(
                            sender.user_id().to_string()
                        ),
                        %tag,
                        "dropping message from unknown sender"
                    ),
                }
            },
            constructor,
        );
    }

    /// Removes the handler for `tag`. No-op if nothing is registered.
    pub fn unregister_callback(&self, tag: MessageTag) {
        self.serializer.unregister(tag);
    }

    /// Registers a sub-serializer under `tag` within the layer's
    /// sub-protocol.
    pub fn register_sub_serializer(
        &self,
        tag: MessageTag,
        sub: Arc<dyn SubSerializer<RawPlayer>>,
    ) {
        self.serializer.register_sub_serializer(tag, sub);
    }

    /// Removes a sub-serializer by identity. No-op if absent.
    pub fn unregister_sub_serializer(
        &self,
        tag: MessageTag,
        sub: &Arc<dyn SubSerializer<RawPlayer>>,
    ) {
        self.serializer.unregister_sub_serializer(tag, sub);
    }

    /// Encodes a registered message and sends it reliably.
    ///
    /// # Errors
    /// [`SessionError::Protocol`] if `M` was never registered or the
    /// payload fails to encode.
    pub fn send<M: Packet>(&self, message: &M) -> Result<(), SessionError> {
        let bytes = self.serializer.encode(message)?;
        self.transport.send(bytes);
        Ok(())
    }

    /// Encodes a registered message and sends it on the unreliable
    /// channel.
    pub fn send_unreliable<M: Packet>(
        &self,
        message: &M,
    ) -> Result<(), SessionError> {
        let bytes = self.serializer.encode(message)?;
        self.transport.send_unreliable(bytes);
        Ok(())
    }

    // -- Transport pass-throughs ------------------------------------------

    /// The local participant's extended record.
    pub fn local_player(&self) -> ExtendedPlayer {
        self.local.clone()
    }

    /// The connection owner's raw handle, if any.
    pub fn connection_owner(&self) -> Option<RawPlayer> {
        self.transport.connection_owner()
    }

    /// Whether the local participant owns the connection.
    pub fn is_connection_owner(&self) -> bool {
        self.transport.is_connection_owner()
    }

    /// The transport's synchronized session clock, in seconds.
    pub fn sync_time(&self) -> f32 {
        self.transport.sync_time()
    }

    /// Whether the synchronized clock has completed its handshake.
    pub fn is_sync_time_initialized(&self) -> bool {
        self.transport.is_sync_time_initialized()
    }

    /// The measured offset applied to the synchronized clock.
    pub fn sync_time_delay(&self) -> f32 {
        self.transport.sync_time_delay()
    }

    /// Number of players the transport reports as connected.
    pub fn connected_player_count(&self) -> usize {
        self.transport.connected_player_count()
    }

    /// Whether the session is established.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Whether a connection attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        self.transport.is_connecting()
    }

    /// Connecting or already connected.
    pub fn is_connecting_or_connected(&self) -> bool {
        self.transport.is_connecting_or_connected()
    }

    /// Whether the local participant is spectating.
    pub fn is_spectating(&self) -> bool {
        self.transport.is_spectating()
    }

    /// Publishes a flag into the shared player-state channel.
    pub fn set_local_player_state(&self, key: &str, active: bool) {
        self.transport.set_local_player_state(key, active);
    }

    /// Looks up a connected player's raw handle by identity.
    pub fn player_by_id(&self, user_id: &str) -> Option<RawPlayer> {
        self.transport.connected_player_by_id(user_id)
    }

    // -- Event handling -----------------------------------------------------

    fn handle_event(&self, event: &TransportEvent) {
        match event {
            TransportEvent::Connected => {
                tracing::info!("session connected");
                self.events.connected.emit(&());
            }
            TransportEvent::ConnectionFailed(reason) => {
                tracing::warn!(%reason, "connection failed");
                self.events.connection_failed.emit(reason);
            }
            TransportEvent::Disconnected(reason) => {
                self.handle_disconnected(*reason);
            }
            TransportEvent::PlayerConnected(raw) => {
                self.handle_player_connected(raw);
            }
            TransportEvent::PlayerDisconnected(raw) => {
                self.handle_player_disconnected(raw);
            }
            TransportEvent::PlayerStateChanged(raw) => {
                self.handle_player_state_changed(raw);
            }
        }
    }

    fn handle_player_connected(&self, raw: &RawPlayer) {
        let player = ExtendedPlayer::new(raw.clone());
        let previous = self
            .write_players()
            .insert(raw.user_id().to_string(), player.clone());

        if previous.is_some() {
            // Ordering violation from the transport. The fresh record
            // wins; anything a feature attached to the old one is gone.
            tracing::error!(
                error = %SessionError::ConsistencyFault(format!(
                    "duplicate player-connected for {}, replacing record",
                    raw.user_id()
                )),
                "transport event stream violated ordering"
            );
        }

        tracing::info!(user_id = %raw.user_id(), "player joined");
        self.events.player_joined.emit(&player);
    }

    fn handle_player_disconnected(&self, raw: &RawPlayer) {
        let player = self.read_players().get(raw.user_id()).cloned();
        let Some(player) = player else {
            tracing::error!(
                error = %SessionError::ConsistencyFault(format!(
                    "player-disconnected for unknown identity {}",
                    raw.user_id()
                )),
                "transport event stream violated ordering"
            );
            return;
        };

        // Subscribers run while the record is still resolvable; the map
        // entry goes away only after they return.
        self.events.player_left.emit(&player);
        self.write_players().remove(raw.user_id());
        tracing::info!(user_id = %raw.user_id(), "player left");
    }

    fn handle_player_state_changed(&self, raw: &RawPlayer) {
        let is_local = raw.user_id() == self.local.user_id();

        // The connection owner's flags define the session's policy;
        // mirror them into the UI. Local changes are our own publishes.
        if !is_local && raw.is_connection_owner() {
            let panel = self
                .panel
                .read()
                .expect("panel lock poisoned")
                .clone();
            if let Some(panel) = panel {
                panel.set_custom_songs(raw.has_state(STATE_CUSTOM_SONGS));
                panel.set_enforce_mods(raw.has_state(STATE_ENFORCE_MODS));
            }
        }

        let record = if is_local {
            Some(self.local.clone())
        } else {
            self.read_players().get(raw.user_id()).cloned()
        };
        match record {
            Some(player) => {
                player.update_raw(raw.clone());
                self.events.player_state_changed.emit(&player);
            }
            None => tracing::error!(
                error = %SessionError::ConsistencyFault(format!(
                    "state change for unknown identity {}",
                    raw.user_id()
                )),
                "transport event stream violated ordering"
            ),
        }
    }

    fn handle_disconnected(&self, reason: DisconnectedReason) {
        tracing::info!(%reason, "session disconnected");

        // The session is gone, so every remote record goes with it.
        // Each one still gets its player-left round first.
        let remaining: Vec<ExtendedPlayer> =
            self.read_players().values().cloned().collect();
        for player in remaining {
            self.events.player_left.emit(&player);
            self.write_players().remove(player.user_id());
        }

        self.events.disconnected.emit(&reason);
    }

    fn read_players(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, ExtendedPlayer>> {
        self.players.read().expect("player map lock poisoned")
    }

    fn write_players(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ExtendedPlayer>> {
        self.players.write().expect("player map lock poisoned")
    }
}

// =========================================================================
// Tests
// =========================================================================
