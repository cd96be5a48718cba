//! Lobby echo demo.
//!
//! Drives the extension layer over an in-memory transport: two players
//! join, one sends chat messages, and the local client echoes each one
//! back with the sender's name attached. Run with `RUST_LOG=debug` to
//! watch the layer's own logging.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use mplink::{
    Capabilities, CapabilityPanel, ExtendedPlayer, ExtendedSessionManager,
    MessageTag, EXTENSION_PROTOCOL_TAG,
};
use mplink_transport::{
    MemoryTransport, RawPlayer, SessionTransport, TransportEvent,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct ChatMessage {
    text: String,
}

const CHAT: MessageTag = MessageTag(0);

/// Prints capability changes instead of rendering a lobby screen.
struct ConsolePanel;

impl CapabilityPanel for ConsolePanel {
    fn set_custom_songs(&self, enabled: bool) {
        println!("[panel] custom songs: {enabled}");
    }
    fn set_enforce_mods(&self, enabled: bool) {
        println!("[panel] enforce mods: {enabled}");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let transport = Arc::new(MemoryTransport::new(RawPlayer::new("local")));
    let manager =
        ExtendedSessionManager::new(Arc::clone(&transport), Capabilities::default());
    manager.initialize();
    manager.set_capability_panel(Arc::new(ConsolePanel));

    manager.events().player_joined.subscribe(|player| {
        println!("[lobby] {} joined", player.user_id());
    });
    manager.events().player_left.subscribe(|player| {
        println!("[lobby] {} left", player.user_id());
    });

    // Echo every chat message back through the layer.
    let echo_manager = Arc::clone(&manager);
    manager.register_callback(
        CHAT,
        move |msg: ChatMessage, sender: &ExtendedPlayer| {
            println!("[chat] {}: {}", sender.user_id(), msg.text);
            if sender.user_id() != "local" {
                let reply = ChatMessage {
                    text: format!("echo to {}: {}", sender.user_id(), msg.text),
                };
                if let Err(e) = echo_manager.send(&reply) {
                    tracing::warn!(error = %e, "echo failed");
                }
            }
        },
        ChatMessage::default,
    );

    // Simulate a session: the host connects, then a friend joins.
    transport.fire(TransportEvent::Connected);
    let host = RawPlayer::new("host").with_connection_owner(true);
    transport.fire(TransportEvent::PlayerConnected(host.clone()));
    transport.fire(TransportEvent::PlayerStateChanged(
        host.clone().with_state("customsongs"),
    ));
    let alice = RawPlayer::new("alice");
    transport.fire(TransportEvent::PlayerConnected(alice.clone()));

    // Alice sends a message; the demo encodes it through the layer's own
    // registry, exactly as a remote modded client would.
    manager
        .send(&ChatMessage {
            text: "anyone up for a custom map?".into(),
        })
        .expect("chat type is registered");
    let bytes = transport
        .sent_reliable()
        .pop()
        .expect("send reaches the transport");
    transport.deliver(EXTENSION_PROTOCOL_TAG, &bytes, &alice);

    // The echo reply is on the wire now; loop it back from ourselves.
    let reply = transport
        .sent_reliable()
        .pop()
        .expect("echo reaches the transport");
    transport.deliver(EXTENSION_PROTOCOL_TAG, &reply, &transport.local_player());

    transport.fire(TransportEvent::PlayerDisconnected(alice));
    println!(
        "[lobby] {} extended record(s) remaining",
        manager.extended_player_count()
    );
}
