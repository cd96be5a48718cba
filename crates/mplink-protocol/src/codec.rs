//! Codec trait and implementations for payload serialization.
//!
//! The sub-protocol adapts to whatever serialization convention the host
//! ecosystem already uses — it never invents a wire format of its own.
//! The [`Codec`] trait is the seam: the serializer works against it, and
//! implementations can be swapped without touching dispatch logic.
//!
//! [`JsonCodec`] is the default (human-readable, easy to debug across
//! peers running different module sets). A binary codec can be added
//! later behind its own feature flag without changing any other code.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts payload values to bytes and back.
///
/// `Send + Sync + 'static` because the codec is captured inside dispatch
/// closures that live as long as the registry and may be invoked from
/// whatever thread the transport delivers on.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedPayload`] if the bytes are
    /// malformed, incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Deserializes bytes into a pre-existing instance.
    ///
    /// Registration supplies a constructor for an empty payload precisely
    /// so codecs can fill one in place. The default implementation
    /// replaces the instance wholesale, which is all a self-describing
    /// format like JSON needs; positional codecs can override this to
    /// read field-by-field into `slot`.
    fn decode_into<T: DeserializeOwned>(
        &self,
        data: &[u8],
        slot: &mut T,
    ) -> Result<(), ProtocolError> {
        *slot = self.decode(data)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature flag (enabled by default).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
    }
}
