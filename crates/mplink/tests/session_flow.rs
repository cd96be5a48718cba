//! End-to-end flows through the extension layer over a memory transport:
//! connect, route, state changes, and teardown, exercised the way a real
//! integration drives the layer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use mplink::{
    Capabilities, ExtendedPlayer, ExtendedSessionManager, MemoryTransport,
    MessageTag, RawPlayer, SessionError, TransportEvent, EXTENSION_PROTOCOL_TAG,
    STATE_CUSTOM_SONGS, STATE_ENFORCE_MODS, STATE_MODDED,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct ChatMessage {
    text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct BeatUpdate {
    beat: u64,
    accuracy: f32,
}

const CHAT: MessageTag = MessageTag(0);
const BEAT: MessageTag = MessageTag(1);

fn setup() -> (
    Arc<MemoryTransport>,
    Arc<ExtendedSessionManager<MemoryTransport>>,
) {
    let transport = Arc::new(MemoryTransport::new(RawPlayer::new("local")));
    let manager =
        ExtendedSessionManager::new(Arc::clone(&transport), Capabilities::default());
    manager.initialize();
    (transport, manager)
}

/// Round-trips one message through the layer's own encode path, as if a
/// peer had sent it.
fn loopback<M: mplink::Packet>(
    transport: &MemoryTransport,
    manager: &ExtendedSessionManager<MemoryTransport>,
    message: &M,
    from: &RawPlayer,
) {
    manager.send(message).expect("message type must be registered");
    let bytes = transport
        .sent_reliable()
        .pop()
        .expect("send must reach the transport");
    transport.deliver(EXTENSION_PROTOCOL_TAG, &bytes, from);
}

#[test]
fn connect_then_dispatch_resolves_sender_record() {
    let (transport, manager) = setup();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s2 = Arc::clone(&seen);
    manager.register_callback(
        CHAT,
        move |msg: ChatMessage, sender: &ExtendedPlayer| {
            s2.lock()
                .unwrap()
                .push((msg.text, sender.user_id().to_string()));
        },
        ChatMessage::default,
    );

    let alice = RawPlayer::new("alice");
    transport.fire(TransportEvent::PlayerConnected(alice.clone()));
    loopback(
        &transport,
        &manager,
        &ChatMessage {
            text: "hello".into(),
        },
        &alice,
    );

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("hello".to_string(), "alice".to_string())]
    );
}

#[test]
fn disconnected_player_is_not_found() {
    let (transport, manager) = setup();
    let bob = RawPlayer::new("bob");

    transport.fire(TransportEvent::PlayerConnected(bob.clone()));
    assert!(manager.get_extended_player(&bob).is_ok());

    transport.fire(TransportEvent::PlayerDisconnected(bob.clone()));
    assert!(matches!(
        manager.get_extended_player(&bob),
        Err(SessionError::NotFound(id)) if id == "bob"
    ));
}

#[test]
fn initialize_advertises_modded_client() {
    let (transport, _manager) = setup();
    assert_eq!(transport.local_state(STATE_MODDED), Some(true));
    assert_eq!(transport.local_state(STATE_CUSTOM_SONGS), Some(true));
    assert_eq!(transport.local_state(STATE_ENFORCE_MODS), Some(false));
}

#[test]
fn mapping_tracks_connected_set_across_events() {
    let (transport, manager) = setup();

    for id in ["alice", "bob", "carol"] {
        transport.fire(TransportEvent::PlayerConnected(RawPlayer::new(id)));
    }
    assert_eq!(manager.extended_player_count(), 3);

    transport.fire(TransportEvent::PlayerDisconnected(RawPlayer::new("bob")));
    assert_eq!(manager.extended_player_count(), 2);
    assert!(manager.get_extended_player_by_id("alice").is_ok());
    assert!(manager.get_extended_player_by_id("bob").is_err());
    assert!(manager.get_extended_player_by_id("carol").is_ok());
}

#[test]
fn extension_state_survives_between_messages() {
    let (transport, manager) = setup();

    #[derive(Debug, Clone, PartialEq)]
    struct BeatCount(u64);

    let m2 = Arc::clone(&manager);
    manager.register_callback(
        BEAT,
        move |msg: BeatUpdate, sender: &ExtendedPlayer| {
            // Feature modules accumulate state on the sender's record.
            let count = sender
                .extensions()
                .get::<BeatCount>()
                .unwrap_or(BeatCount(0));
            sender.extensions().insert(BeatCount(count.0 + msg.beat));
            // Re-entrant lookup from inside a handler must work.
            assert!(m2.get_extended_player_by_id(sender.user_id()).is_ok());
        },
        BeatUpdate::default,
    );

    let alice = RawPlayer::new("alice");
    transport.fire(TransportEvent::PlayerConnected(alice.clone()));
    loopback(
        &transport,
        &manager,
        &BeatUpdate {
            beat: 2,
            accuracy: 0.9,
        },
        &alice,
    );
    loopback(
        &transport,
        &manager,
        &BeatUpdate {
            beat: 3,
            accuracy: 0.8,
        },
        &alice,
    );

    let record = manager.get_extended_player_by_id("alice").unwrap();
    assert_eq!(record.extensions().get::<BeatCount>(), Some(BeatCount(5)));
}

#[test]
fn garbage_bytes_leave_mapping_unchanged() {
    let (transport, manager) = setup();
    transport.fire(TransportEvent::PlayerConnected(RawPlayer::new("alice")));

    let alice = RawPlayer::new("alice");
    // Truncated envelope, unknown inner tag, and unmounted top-level tag.
    transport.deliver(EXTENSION_PROTOCOL_TAG, &[0x01], &alice);
    transport.deliver(EXTENSION_PROTOCOL_TAG, &[9, 2, 0, 0, 0, 1, 2], &alice);
    transport.deliver(200, &[1, 2, 3], &alice);

    assert_eq!(manager.extended_player_count(), 1);
    assert!(manager.get_extended_player_by_id("alice").is_ok());
}

#[test]
fn two_message_types_route_to_their_own_handlers() {
    let (transport, manager) = setup();
    let chats = Arc::new(AtomicUsize::new(0));
    let beats = Arc::new(AtomicUsize::new(0));

    let c2 = Arc::clone(&chats);
    manager.register_callback(
        CHAT,
        move |_: ChatMessage, _: &ExtendedPlayer| {
            c2.fetch_add(1, Ordering::SeqCst);
        },
        ChatMessage::default,
    );
    let b2 = Arc::clone(&beats);
    manager.register_callback(
        BEAT,
        move |_: BeatUpdate, _: &ExtendedPlayer| {
            b2.fetch_add(1, Ordering::SeqCst);
        },
        BeatUpdate::default,
    );

    let alice = RawPlayer::new("alice");
    transport.fire(TransportEvent::PlayerConnected(alice.clone()));
    loopback(
        &transport,
        &manager,
        &BeatUpdate {
            beat: 1,
            accuracy: 1.0,
        },
        &alice,
    );
    loopback(
        &transport,
        &manager,
        &ChatMessage { text: "gg".into() },
        &alice,
    );

    assert_eq!(chats.load(Ordering::SeqCst), 1);
    assert_eq!(beats.load(Ordering::SeqCst), 1);
}

#[test]
fn full_session_lifecycle() {
    let (transport, manager) = setup();

    let log = Arc::new(Mutex::new(Vec::new()));

    let l = Arc::clone(&log);
    manager.events().connected.subscribe(move |_| {
        l.lock().unwrap().push("connected".into());
    });
    let l = Arc::clone(&log);
    manager.events().player_joined.subscribe(move |p| {
        l.lock().unwrap().push(format!("joined:{}", p.user_id()));
    });
    let l = Arc::clone(&log);
    manager.events().player_left.subscribe(move |p| {
        l.lock().unwrap().push(format!("left:{}", p.user_id()));
    });
    let l = Arc::clone(&log);
    manager.events().disconnected.subscribe(move |reason| {
        l.lock().unwrap().push(format!("disconnected:{reason}"));
    });

    transport.fire(TransportEvent::Connected);
    transport.fire(TransportEvent::PlayerConnected(RawPlayer::new("alice")));
    transport.fire(TransportEvent::PlayerDisconnected(RawPlayer::new("alice")));
    transport.fire(TransportEvent::Disconnected(
        mplink::DisconnectedReason::UserInitiated,
    ));

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "connected",
            "joined:alice",
            "left:alice",
            "disconnected:user initiated",
        ]
    );
    assert_eq!(manager.extended_player_count(), 0);
}
