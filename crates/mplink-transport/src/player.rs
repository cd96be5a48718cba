//! The transport's view of a connected participant.

use std::collections::BTreeSet;

/// A snapshot of a connected player as the transport sees it.
///
/// This is the *raw* handle — identity, the connection-owner flag, and
/// the shared state set every peer publishes into. The extension layer
/// wraps it in its own record; feature modules should rarely touch a
/// `RawPlayer` directly.
///
/// Cloneable value type: transports hand out snapshots, not references
/// into their connection tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlayer {
    user_id: String,
    connection_owner: bool,
    states: BTreeSet<String>,
}

impl RawPlayer {
    /// Creates a handle for the given stable identity.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            connection_owner: false,
            states: BTreeSet::new(),
        }
    }

    /// Marks this player as the connection owner.
    pub fn with_connection_owner(mut self, owner: bool) -> Self {
        self.connection_owner = owner;
        self
    }

    /// Adds an entry to the player's shared state set.
    pub fn with_state(mut self, key: impl Into<String>) -> Self {
        self.states.insert(key.into());
        self
    }

    /// The stable connection identity.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Whether the transport designates this player as authoritative for
    /// shared session state.
    pub fn is_connection_owner(&self) -> bool {
        self.connection_owner
    }

    /// Whether the player has published the given state flag.
    pub fn has_state(&self, key: &str) -> bool {
        self.states.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_has_no_states() {
        let player = RawPlayer::new("alice");
        assert_eq!(player.user_id(), "alice");
        assert!(!player.is_connection_owner());
        assert!(!player.has_state("modded"));
    }

    #[test]
    fn test_with_state_is_queryable() {
        let player = RawPlayer::new("alice")
            .with_state("modded")
            .with_state("customsongs");
        assert!(player.has_state("modded"));
        assert!(player.has_state("customsongs"));
        assert!(!player.has_state("enforcemods"));
    }

    #[test]
    fn test_with_connection_owner_sets_flag() {
        let owner = RawPlayer::new("host").with_connection_owner(true);
        assert!(owner.is_connection_owner());
    }
}
