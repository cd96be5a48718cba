//! The extended player record.
//!
//! For every currently-connected identity the session shadow keeps
//! exactly one [`ExtendedPlayer`]. It pairs the transport's raw handle
//! with an opaque per-feature extension store, so feature modules can
//! attach their own state to a player without the session layer knowing
//! the types involved.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use mplink_transport::RawPlayer;

/// A `TypeId`-keyed any-map for per-player feature state.
///
/// Interior mutability on purpose: records are handed out as shared
/// clones, and feature modules attach state from inside event handlers
/// where no `&mut` access exists.
#[derive(Default)]
pub struct Extensions {
    map: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Extensions {
    /// Attaches a value, replacing any previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
        self.write().insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a copy of the attached value of type `T`, if any.
    ///
    /// Returning a clone rather than a reference keeps the internal lock
    /// out of caller hands; feature state that needs shared mutation
    /// should store an `Arc` (cloning one is cheap).
    pub fn get<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.read()
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    /// Removes and returns the attached value of type `T`, if any.
    pub fn remove<T: Send + Sync + 'static>(&self) -> Option<T> {
        self.write()
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Whether a value of type `T` is attached.
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.read().contains_key(&TypeId::of::<T>())
    }

    fn read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<TypeId, Box<dyn Any + Send + Sync>>> {
        self.map.read().expect("extension store lock poisoned")
    }

    fn write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<TypeId, Box<dyn Any + Send + Sync>>> {
        self.map.write().expect("extension store lock poisoned")
    }
}

struct Inner {
    user_id: String,
    /// Refreshed on every state-changed event while the record lives.
    raw: RwLock<RawPlayer>,
    extensions: Extensions,
}

/// One connected identity, as the extension layer sees it.
///
/// Cheap to clone — all clones share the same record. Callbacks receive
/// a clone that stays valid for the callback's duration even if the
/// player disconnects concurrently.
#[derive(Clone)]
pub struct ExtendedPlayer {
    inner: Arc<Inner>,
}

impl ExtendedPlayer {
    /// Creates a record from the transport's handle.
    pub fn new(raw: RawPlayer) -> Self {
        Self {
            inner: Arc::new(Inner {
                user_id: raw.user_id().to_string(),
                raw: RwLock::new(raw),
                extensions: Extensions::default(),
            }),
        }
    }

    /// The stable connection identity.
    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    /// The latest raw snapshot from the transport.
    pub fn raw(&self) -> RawPlayer {
        self.read_raw().clone()
    }

    /// Whether the transport designates this player as authoritative for
    /// shared session state.
    pub fn is_connection_owner(&self) -> bool {
        self.read_raw().is_connection_owner()
    }

    /// Whether the player currently publishes the given state flag.
    pub fn has_state(&self, key: &str) -> bool {
        self.read_raw().has_state(key)
    }

    /// The per-feature extension store.
    pub fn extensions(&self) -> &Extensions {
        &self.inner.extensions
    }

    /// Whether two handles refer to the same record.
    pub fn same_record(&self, other: &ExtendedPlayer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn update_raw(&self, raw: RawPlayer) {
        *self
            .inner
            .raw
            .write()
            .expect("player snapshot lock poisoned") = raw;
    }

    fn read_raw(&self) -> std::sync::RwLockReadGuard<'_, RawPlayer> {
        self.inner.raw.read().expect("player snapshot lock poisoned")
    }
}

impl fmt::Debug for ExtendedPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPlayer")
            .field("user_id", &self.inner.user_id)
            .field("raw", &*self.read_raw())
            .finish_non_exhaustive()
    }
}
