//! Local capability flags and the UI collaborator surface.
//!
//! Peers discover what a modded client supports through the transport's
//! shared player-state channel: a client that runs this layer always
//! advertises `modded`, plus two configurable flags. When the
//! *connection owner* changes those flags, the layer forwards them to a
//! [`CapabilityPanel`] so a lobby UI can reflect the session's policy.

use serde::{Deserialize, Serialize};

use mplink_transport::SessionTransport;

/// State key advertised by every client running the extension layer.
pub const STATE_MODDED: &str = "modded";
/// State key: custom content is allowed in this session.
pub const STATE_CUSTOM_SONGS: &str = "customsongs";
/// State key: the session requires all participants to run the layer.
pub const STATE_ENFORCE_MODS: &str = "enforcemods";

/// The locally-configured capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Advertise support for custom content.
    pub custom_songs: bool,
    /// Advertise that unmodded participants should be rejected.
    pub enforce_mods: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            custom_songs: true,
            enforce_mods: false,
        }
    }
}

/// Publishes the local capability flags through the transport's shared
/// player-state channel.
///
/// `modded` is always set — its presence is what marks this client as
/// running the layer at all.
pub fn publish_local_capabilities<T: SessionTransport + ?Sized>(
    transport: &T,
    caps: &Capabilities,
) {
    transport.set_local_player_state(STATE_MODDED, true);
    transport.set_local_player_state(STATE_CUSTOM_SONGS, caps.custom_songs);
    transport.set_local_player_state(STATE_ENFORCE_MODS, caps.enforce_mods);
    tracing::info!(
        custom_songs = caps.custom_songs,
        enforce_mods = caps.enforce_mods,
        "local capabilities published"
    );
}

/// The UI collaborator that mirrors the connection owner's capability
/// flags. The layer never renders anything itself.
pub trait CapabilityPanel: Send + Sync {
    /// The connection owner's custom-content flag changed.
    fn set_custom_songs(&self, enabled: bool);
    /// The connection owner's mod-enforcement flag changed.
    fn set_enforce_mods(&self, enabled: bool);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mplink_transport::{MemoryTransport, RawPlayer};

    #[test]
    fn test_default_allows_custom_songs_without_enforcement() {
        let caps = Capabilities::default();
        assert!(caps.custom_songs);
        assert!(!caps.enforce_mods);
    }

    #[test]
    fn test_publish_sets_all_three_flags() {
        let transport = MemoryTransport::new(RawPlayer::new("local"));
        let caps = Capabilities {
            custom_songs: false,
            enforce_mods: true,
        };

        publish_local_capabilities(&transport, &caps);

        assert_eq!(transport.local_state(STATE_MODDED), Some(true));
        assert_eq!(transport.local_state(STATE_CUSTOM_SONGS), Some(false));
        assert_eq!(transport.local_state(STATE_ENFORCE_MODS), Some(true));
    }

    #[test]
    fn test_capabilities_deserialize_with_missing_fields() {
        let caps: Capabilities = serde_json::from_str("{}").unwrap();
        assert_eq!(caps, Capabilities::default());

        let caps: Capabilities =
            serde_json::from_str(r#"{"enforce_mods":true}"#).unwrap();
        assert!(caps.custom_songs);
        assert!(caps.enforce_mods);
    }
}
