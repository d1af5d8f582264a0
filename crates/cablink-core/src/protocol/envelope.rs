//! The wire-level unit exchanged with the hardware/services manager.
//!
//! Every message on the shared connection is an [`Envelope`]: the category it
//! belongs to, whether it is a request, a response, or an event, the request id
//! that pairs a response with its request, and an opaque body.  The body is
//! only interpreted by the category that owns it (see
//! [`crate::protocol::codec::decode_body`]).

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Category identifiers ──────────────────────────────────────────────────────

/// Identifies one message namespace multiplexed over the connection.
///
/// Categories are an open set (the manager may know dozens the client never
/// asks for), so this is a newtype over the wire value rather than an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub u16);

impl CategoryId {
    /// Handshake and shutdown notices.  Always attached, never negotiated.
    pub const CONNECTION: CategoryId = CategoryId(0);
    /// Device and group ownership.
    pub const RESOURCE_MANAGEMENT: CategoryId = CategoryId(1);
    /// Button panel registration and button input.
    pub const BUTTON_PANEL: CategoryId = CategoryId(2);
    /// Window visibility.
    pub const WINDOW_CONTROL: CategoryId = CategoryId(3);

    /// Human-readable name for the well-known categories, used in logs.
    pub fn name(&self) -> &'static str {
        match *self {
            CategoryId::CONNECTION => "Connection",
            CategoryId::RESOURCE_MANAGEMENT => "ResourceManagement",
            CategoryId::BUTTON_PANEL => "ButtonPanel",
            CategoryId::WINDOW_CONTROL => "WindowControl",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

// ── Message kind ──────────────────────────────────────────────────────────────

/// Direction/role of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    Request = 0x01,
    Response = 0x02,
    Event = 0x03,
}

impl TryFrom<u8> for MessageKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageKind::Request),
            0x02 => Ok(MessageKind::Response),
            0x03 => Ok(MessageKind::Event),
            _ => Err(()),
        }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// One framed message: `{category, kind, request_id, body}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Category namespace that owns the body.
    pub category: CategoryId,
    /// Request, response, or event.
    pub kind: MessageKind,
    /// Pairs a response with its request.  Events carry 0.
    pub request_id: u32,
    /// Opaque, category-encoded body.
    pub body: Vec<u8>,
}

impl Envelope {
    /// Builds a request envelope.
    pub fn request(category: CategoryId, request_id: u32, body: Vec<u8>) -> Self {
        Self {
            category,
            kind: MessageKind::Request,
            request_id,
            body,
        }
    }

    /// Builds a response envelope answering `request_id`.
    pub fn response(category: CategoryId, request_id: u32, body: Vec<u8>) -> Self {
        Self {
            category,
            kind: MessageKind::Response,
            request_id,
            body,
        }
    }

    /// Builds an event envelope.
    pub fn event(category: CategoryId, body: Vec<u8>) -> Self {
        Self {
            category,
            kind: MessageKind::Event,
            request_id: 0,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_try_from_rejects_unknown_byte() {
        assert_eq!(MessageKind::try_from(0x02), Ok(MessageKind::Response));
        assert!(MessageKind::try_from(0x7F).is_err());
    }

    #[test]
    fn test_event_envelope_carries_zero_request_id() {
        // Arrange / Act
        let env = Envelope::event(CategoryId::WINDOW_CONTROL, vec![1, 2, 3]);

        // Assert
        assert_eq!(env.kind, MessageKind::Event);
        assert_eq!(env.request_id, 0);
    }

    #[test]
    fn test_category_id_display_includes_name_and_value() {
        assert_eq!(CategoryId::BUTTON_PANEL.to_string(), "ButtonPanel(2)");
        assert_eq!(CategoryId(900).to_string(), "Unknown(900)");
    }
}
