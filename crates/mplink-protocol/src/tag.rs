//! Message tags and the sub-protocol envelope.
//!
//! A [`MessageTag`] identifies a payload kind *within mplink's private
//! namespace*. The whole namespace hangs off a single reserved slot in the
//! host transport's own message-type space, so tags here can never collide
//! with the transport's built-in messages — or with each other, as long as
//! feature modules coordinate their one-byte values.
//!
//! The envelope is deliberately minimal: the transport already provides
//! framing, ordering, and delivery, so all we add is
//!
//! ```text
//! ┌──────────┬────────────────┬───────────────┐
//! │ tag: u8  │ len: u32 (LE)  │ payload bytes │
//! └──────────┴────────────────┴───────────────┘
//! ```

use std::fmt;

use crate::ProtocolError;

/// One-byte discriminator for a payload kind in the sub-protocol.
///
/// A newtype rather than a bare `u8` so a tag can't be confused with the
/// host transport's top-level message types, which live in a different
/// namespace entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageTag(pub u8);

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Size of the envelope header: tag byte plus payload length.
const HEADER_LEN: usize = 1 + 4;

/// Appends a complete envelope (header + payload) to `out`.
pub(crate) fn write_envelope(
    tag: MessageTag,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), ProtocolError> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!(
            "payload length {} exceeds envelope limit",
            payload.len()
        ))
    })?;
    out.reserve(HEADER_LEN + payload.len());
    out.push(tag.0);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

/// Splits an envelope into its tag and payload section.
///
/// The declared length must match the remaining bytes exactly — trailing
/// garbage after a payload means the sender and receiver disagree about
/// the wire format, which we surface rather than silently ignore.
pub(crate) fn split_envelope(
    data: &[u8],
) -> Result<(MessageTag, &[u8]), ProtocolError> {
    if data.len() < HEADER_LEN {
        return Err(ProtocolError::MalformedPayload(format!(
            "truncated envelope: {} bytes, need at least {HEADER_LEN}",
            data.len()
        )));
    }
    let tag = MessageTag(data[0]);
    // The slice is exactly 4 bytes by construction.
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&data[1..HEADER_LEN]);
    let declared = u32::from_le_bytes(len_bytes) as usize;

    let payload = &data[HEADER_LEN..];
    if declared != payload.len() {
        return Err(ProtocolError::MalformedPayload(format!(
            "declared payload length {declared} does not match actual {}",
            payload.len()
        )));
    }
    Ok((tag, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_tag_display_is_plain_number() {
        assert_eq!(MessageTag(7).to_string(), "7");
    }

    #[test]
    fn test_message_tag_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(MessageTag(0), "player-update");
        map.insert(MessageTag(1), "beatmap-preview");
        assert_eq!(map[&MessageTag(0)], "player-update");
    }

    #[test]
    fn test_envelope_round_trip() {
        let mut buf = Vec::new();
        write_envelope(MessageTag(3), b"hello", &mut buf).unwrap();

        let (tag, payload) = split_envelope(&buf).unwrap();
        assert_eq!(tag, MessageTag(3));
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn test_envelope_round_trip_empty_payload() {
        let mut buf = Vec::new();
        write_envelope(MessageTag(0), b"", &mut buf).unwrap();

        let (tag, payload) = split_envelope(&buf).unwrap();
        assert_eq!(tag, MessageTag(0));
        assert!(payload.is_empty());
    }

    #[test]
    fn test_split_truncated_header_returns_malformed() {
        let result = split_envelope(&[1, 0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_split_length_mismatch_returns_malformed() {
        let mut buf = Vec::new();
        write_envelope(MessageTag(1), b"abc", &mut buf).unwrap();
        // Append trailing garbage — declared length no longer matches.
        buf.push(0xFF);

        let result = split_envelope(&buf);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_split_declared_longer_than_payload_returns_malformed() {
        // Header claims 10 payload bytes, but only 2 follow.
        let mut buf = vec![5u8];
        buf.extend_from_slice(&10u32.to_le_bytes());
        buf.extend_from_slice(b"ab");

        let result = split_envelope(&buf);
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedPayload(_))
        ));
    }
}
