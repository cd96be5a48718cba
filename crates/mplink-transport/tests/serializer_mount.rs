//! The transport boundary in one piece: a typed packet registry mounted
//! under a top-level tag, receiving bytes attributed to a raw player.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use mplink_protocol::{JsonCodec, MessageTag, PacketSerializer, SubSerializer};
use mplink_transport::{MemoryTransport, RawPlayer, SessionTransport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct Hello {
    from: String,
}

const HELLO: MessageTag = MessageTag(0);
const MOUNT: u8 = 4;

#[test]
fn mounted_registry_receives_delivered_bytes() {
    let transport = MemoryTransport::new(RawPlayer::new("local"));
    let registry = Arc::new(PacketSerializer::<RawPlayer, _>::new(JsonCodec));

    let seen = Arc::new(Mutex::new(None));
    let s2 = Arc::clone(&seen);
    registry.register(
        HELLO,
        move |msg: Hello, sender: &RawPlayer| {
            *s2.lock().unwrap() = Some((msg, sender.user_id().to_string()));
        },
        Hello::default,
    );
    transport.register_serializer(
        MOUNT,
        Arc::clone(&registry) as Arc<dyn SubSerializer<RawPlayer>>,
    );
    assert!(transport.has_serializer(MOUNT));

    let bytes = registry
        .encode(&Hello {
            from: "alice".into(),
        })
        .unwrap();
    transport.deliver(MOUNT, &bytes, &RawPlayer::new("alice"));

    let (msg, sender) = seen.lock().unwrap().take().unwrap();
    assert_eq!(msg.from, "alice");
    assert_eq!(sender, "alice");
}

#[test]
fn undecodable_bytes_are_dropped_not_propagated() {
    let transport = MemoryTransport::new(RawPlayer::new("local"));
    let registry = Arc::new(PacketSerializer::<RawPlayer, _>::new(JsonCodec));

    let calls = Arc::new(AtomicUsize::new(0));
    let c2 = Arc::clone(&calls);
    registry.register(
        HELLO,
        move |_: Hello, _: &RawPlayer| {
            c2.fetch_add(1, Ordering::SeqCst);
        },
        Hello::default,
    );
    transport.register_serializer(
        MOUNT,
        Arc::clone(&registry) as Arc<dyn SubSerializer<RawPlayer>>,
    );

    // Garbage at every level of the envelope; deliver never panics and
    // never reaches the handler.
    transport.deliver(MOUNT, &[], &RawPlayer::new("alice"));
    transport.deliver(MOUNT, &[0xFF; 2], &RawPlayer::new("alice"));
    transport.deliver(99, &[1, 2, 3], &RawPlayer::new("alice"));

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
