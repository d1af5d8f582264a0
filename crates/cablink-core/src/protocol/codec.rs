//! Binary codec for envelopes and category bodies.
//!
//! Wire format:
//! ```text
//! [version:1][kind:1][category:2][request_id:4][body_len:4][body:N]
//! ```
//! Total header size: 12 bytes. All multi-byte integers are big-endian.
//!
//! The header is hand-encoded so a stream reader can find frame boundaries
//! without knowing any category.  Bodies are `bincode` encodings of the
//! category message enums in [`crate::protocol::messages`]; only the owning
//! category ever decodes them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::protocol::envelope::{CategoryId, Envelope, MessageKind};

/// Current framing version byte.
pub const FRAME_VERSION: u8 = 0x01;

/// Total size of the envelope header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Errors that can occur during envelope or body encoding/decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The kind byte in the header is not a recognized value.
    #[error("unknown message kind: 0x{0:02X}")]
    UnknownMessageKind(u8),

    /// The framing version in the header is not supported.
    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    /// The declared body length does not match the data available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// A body was required but the envelope carried none.
    #[error("empty body for category {0}")]
    EmptyBody(CategoryId),

    /// The body could not be parsed as the category's message family.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Envelope framing ──────────────────────────────────────────────────────────

/// Encodes an [`Envelope`] into a byte vector including the 12-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the body is larger than the
/// 32-bit length field can describe.
///
/// # Examples
///
/// ```rust
/// use cablink_core::protocol::{decode_envelope, encode_envelope, CategoryId, Envelope};
///
/// let env = Envelope::event(CategoryId::WINDOW_CONTROL, vec![0xAA]);
/// let bytes = encode_envelope(&env).unwrap();
/// let (decoded, consumed) = decode_envelope(&bytes).unwrap();
/// assert_eq!(decoded, env);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
    let body_len = u32::try_from(envelope.body.len()).map_err(|_| {
        ProtocolError::MalformedPayload(format!("body too large: {} bytes", envelope.body.len()))
    })?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + envelope.body.len());
    buf.push(FRAME_VERSION);
    buf.push(envelope.kind as u8);
    buf.extend_from_slice(&envelope.category.0.to_be_bytes());
    buf.extend_from_slice(&envelope.request_id.to_be_bytes());
    buf.extend_from_slice(&body_len.to_be_bytes());
    buf.extend_from_slice(&envelope.body);
    Ok(buf)
}

/// Decodes one [`Envelope`] from the beginning of `bytes`.
///
/// Returns the envelope and the total number of bytes consumed (header +
/// body), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] or
/// [`ProtocolError::PayloadLengthMismatch`] when more bytes are needed, and
/// the other variants when the header is invalid.
pub fn decode_envelope(bytes: &[u8]) -> Result<(Envelope, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != FRAME_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let kind =
        MessageKind::try_from(bytes[1]).map_err(|_| ProtocolError::UnknownMessageKind(bytes[1]))?;
    let category = CategoryId(u16::from_be_bytes([bytes[2], bytes[3]]));
    let request_id = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let body_len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

    let total_needed = HEADER_SIZE + body_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: body_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let envelope = Envelope {
        category,
        kind,
        request_id,
        body: bytes[HEADER_SIZE..total_needed].to_vec(),
    };
    Ok((envelope, total_needed))
}

/// Returns `true` if `err` only means "wait for more bytes".
///
/// Stream readers use this to tell a partial frame from a corrupt one.
pub fn is_incomplete(err: &ProtocolError) -> bool {
    matches!(
        err,
        ProtocolError::InsufficientData { .. } | ProtocolError::PayloadLengthMismatch { .. }
    )
}

// ── Body serialization ────────────────────────────────────────────────────────

/// Serializes a category message into an envelope body.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if serialization fails.
pub fn encode_body<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(message).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}

/// Deserializes an envelope body into the category's message family.
///
/// # Errors
///
/// Returns [`ProtocolError::EmptyBody`] when `body` is empty and
/// [`ProtocolError::MalformedPayload`] when it does not parse as `T`.
pub fn decode_body<T: DeserializeOwned>(
    category: CategoryId,
    body: &[u8],
) -> Result<T, ProtocolError> {
    if body.is_empty() {
        return Err(ProtocolError::EmptyBody(category));
    }
    bincode::deserialize(body).map_err(|e| {
        debug!("{} byte body on {category} did not decode: {e}", body.len());
        ProtocolError::MalformedPayload(format!("{category}: {e}"))
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
