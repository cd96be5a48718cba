//! An in-memory [`SessionTransport`] for tests and demos.
//!
//! `MemoryTransport` plays the host transport's role without any network:
//! tests fire raw events through it, deliver pre-encoded bytes to the
//! registered serializer, and inspect what the layer published or sent.
//!
//! # Locking
//!
//! All state sits behind one mutex, but callbacks are *never* invoked
//! while it is held — listener and serializer handles are snapshotted
//! first. Subscribers routinely re-enter the transport (looking up
//! players, sending replies) from inside their callbacks.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use mplink_protocol::SubSerializer;

use crate::{EventListener, RawPlayer, SessionTransport, TransportEvent};

#[derive(Default)]
struct Inner {
    listeners: Vec<EventListener>,
    serializers: HashMap<u8, Arc<dyn SubSerializer<RawPlayer>>>,
    local_state: BTreeMap<String, bool>,
    players: HashMap<String, RawPlayer>,
    connected: bool,
    connecting: bool,
    spectating: bool,
    sync_time: f32,
    sync_time_initialized: bool,
    sync_time_delay: f32,
    sent_reliable: Vec<Vec<u8>>,
    sent_unreliable: Vec<Vec<u8>>,
}

/// In-memory stand-in for a host session transport.
pub struct MemoryTransport {
    local_player: RawPlayer,
    inner: Mutex<Inner>,
}

impl MemoryTransport {
    /// Creates a transport whose local participant is `local_player`.
    pub fn new(local_player: RawPlayer) -> Self {
        Self {
            local_player,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Delivers a raw event to every subscriber, in subscription order.
    ///
    /// Player-level events also update the transport's own player table,
    /// mirroring how a real transport tracks its peers.
    pub fn fire(&self, event: TransportEvent) {
        let listeners: Vec<EventListener> = {
            let mut inner = self.lock();
            match &event {
                TransportEvent::Connected => {
                    inner.connecting = false;
                    inner.connected = true;
                }
                TransportEvent::ConnectionFailed(_) => {
                    inner.connecting = false;
                }
                TransportEvent::Disconnected(_) => {
                    inner.connected = false;
                    inner.players.clear();
                }
                TransportEvent::PlayerConnected(player)
                | TransportEvent::PlayerStateChanged(player) => {
                    inner
                        .players
                        .insert(player.user_id().to_string(), player.clone());
                }
                TransportEvent::PlayerDisconnected(player) => {
                    inner.players.remove(player.user_id());
                }
            }
            inner.listeners.clone()
        };
        // Lock released: listeners may re-enter the transport.
        for listener in listeners {
            listener(&event);
        }
    }

    /// Routes already-encoded bytes through the serializer mounted under
    /// `top_level_tag`, as if they had arrived from `sender`.
    ///
    /// Dispatch failures are logged and the message dropped — one bad
    /// message must never stall the shared dispatch stream.
    pub fn deliver(&self, top_level_tag: u8, data: &[u8], sender: &RawPlayer) {
        let serializer = self.lock().serializers.get(&top_level_tag).cloned();
        match serializer {
            Some(serializer) => {
                if let Err(e) = serializer.decode_packet(data, sender) {
                    tracing::warn!(
                        top_level_tag,
                        sender = %sender.user_id(),
                        error = %e,
                        "dropping undeliverable message"
                    );
                }
            }
            None => {
                tracing::warn!(
                    top_level_tag,
                    "no serializer mounted for top-level tag, dropping message"
                );
            }
        }
    }

    /// Returns the published value for a local state key, if any.
    pub fn local_state(&self, key: &str) -> Option<bool> {
        self.lock().local_state.get(key).copied()
    }

    /// Whether a serializer is mounted under the given top-level tag.
    pub fn has_serializer(&self, top_level_tag: u8) -> bool {
        self.lock().serializers.contains_key(&top_level_tag)
    }

    /// Bytes sent reliably so far, oldest first.
    pub fn sent_reliable(&self) -> Vec<Vec<u8>> {
        self.lock().sent_reliable.clone()
    }

    /// Bytes sent unreliably so far, oldest first.
    pub fn sent_unreliable(&self) -> Vec<Vec<u8>> {
        self.lock().sent_unreliable.clone()
    }

    /// Sets the synchronized clock the accessors report.
    pub fn set_sync_time(&self, time: f32, delay: f32) {
        let mut inner = self.lock();
        inner.sync_time = time;
        inner.sync_time_delay = delay;
        inner.sync_time_initialized = true;
    }

    /// Marks the local participant as spectating.
    pub fn set_spectating(&self, spectating: bool) {
        self.lock().spectating = spectating;
    }

    /// Marks a connection attempt as in flight.
    pub fn set_connecting(&self, connecting: bool) {
        self.lock().connecting = connecting;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory transport lock poisoned")
    }
}

impl SessionTransport for MemoryTransport {
    fn subscribe(&self, listener: EventListener) {
        self.lock().listeners.push(listener);
    }

    fn register_serializer(
        &self,
        top_level_tag: u8,
        serializer: Arc<dyn SubSerializer<RawPlayer>>,
    ) {
        self.lock().serializers.insert(top_level_tag, serializer);
    }

    fn set_local_player_state(&self, key: &str, active: bool) {
        self.lock().local_state.insert(key.to_string(), active);
    }

    fn connected_player_by_id(&self, user_id: &str) -> Option<RawPlayer> {
        self.lock().players.get(user_id).cloned()
    }

    fn send(&self, data: Vec<u8>) {
        self.lock().sent_reliable.push(data);
    }

    fn send_unreliable(&self, data: Vec<u8>) {
        self.lock().sent_unreliable.push(data);
    }

    fn local_player(&self) -> RawPlayer {
        self.local_player.clone()
    }

    fn connection_owner(&self) -> Option<RawPlayer> {
        if self.local_player.is_connection_owner() {
            return Some(self.local_player.clone());
        }
        self.lock()
            .players
            .values()
            .find(|p| p.is_connection_owner())
            .cloned()
    }

    fn sync_time(&self) -> f32 {
        self.lock().sync_time
    }

    fn is_sync_time_initialized(&self) -> bool {
        self.lock().sync_time_initialized
    }

    fn sync_time_delay(&self) -> f32 {
        self.lock().sync_time_delay
    }

    fn connected_player_count(&self) -> usize {
        self.lock().players.len()
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn is_connecting(&self) -> bool {
        self.lock().connecting
    }

    fn is_spectating(&self) -> bool {
        self.lock().spectating
    }
}
