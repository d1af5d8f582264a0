//! The category framework.
//!
//! A *category* is one versioned message namespace on the shared connection.
//! Every concrete category (resource management, button panel, ...)
//! implements [`Category`] so the connection can route inbound envelopes to it,
//! and owns a [`CategoryLink`] through which it sends requests and blocks for
//! their responses.
//!
//! ```text
//! host thread                        transport thread
//! ───────────                        ────────────────
//! category.acquire_device()
//!   link.request(req)
//!     slot.outstanding = id
//!     transport.send(envelope) ───►  manager
//!     wait on slot  ◄─────────────── deliver(response)
//!                                      category.handle_response()
//!                                        slot.reply = body; notify
//!   decode + match reply variant
//! ```
//!
//! Per category this is a small state machine:
//! `Idle → AwaitingResponse → (Fulfilled | Faulted) → Idle`.
//!
//! Sub-modules:
//!
//! - **`link`** – `CategoryLink`, the single pending-response slot.
//! - **`buffer`** – `EventBuffer`, the producer/consumer buffer drained with a
//!   try-lock on the host tick.
//! - **`subscribers`** – `Subscribers`, the observer list behind every typed
//!   notification.
//! - **`policy`** – `ErrorPolicy`, per-category suppression of resource codes,
//!   and `ResourceError` for the codes it escalates.

pub mod buffer;
pub mod link;
pub mod policy;
pub mod subscribers;

pub use buffer::EventBuffer;
pub use link::{CategoryLink, PendingReply};
pub use policy::{ErrorPolicy, ResourceError, Screened};
pub use subscribers::{SubscriptionId, Subscribers};

use cablink_core::protocol::messages::MessageName;
use cablink_core::{CategoryDescriptor, CategoryId, ProtocolError};
use thiserror::Error;

use crate::fault::LinkFault;
use crate::transport::TransportError;

/// Errors raised by category dispatch and by blocking requests.
#[derive(Debug, Error, PartialEq)]
pub enum CategoryError {
    /// Empty or malformed body.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The category defines no events, or got one it cannot handle.
    #[error("{0} has no handler for the received event")]
    UnhandledEvent(CategoryId),

    /// The category does not accept manager-originated requests.
    #[error("{0} does not accept requests from the manager")]
    UnhandledRequest(CategoryId),

    /// The response variant does not answer the request that was sent.
    #[error("{category}: expected {expected} reply, got {actual}")]
    UnexpectedReplyType {
        category: CategoryId,
        expected: &'static str,
        actual: &'static str,
    },

    /// A second request was issued before the first one's response was taken.
    #[error("{0} already has a request in flight")]
    RequestInFlight(CategoryId),

    /// The category was not installed by the handshake (or has been torn down).
    #[error("{0} is not installed")]
    NotInstalled(CategoryId),

    /// A response arrived that no request is waiting for.
    #[error("{category}: no request {request_id} outstanding")]
    UnsolicitedResponse {
        category: CategoryId,
        request_id: u32,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Fault(#[from] LinkFault),
}

impl CategoryError {
    /// Builds an [`UnexpectedReplyType`](Self::UnexpectedReplyType) from the
    /// reply that did arrive.
    pub fn unexpected_reply(
        category: CategoryId,
        expected: &'static str,
        actual: &impl MessageName,
    ) -> Self {
        CategoryError::UnexpectedReplyType {
            category,
            expected,
            actual: actual.variant_name(),
        }
    }
}

/// A versioned handler unit for one message namespace.
///
/// The default method bodies implement the common cases: no events, no
/// manager-originated requests, and responses stored into the link's slot.
pub trait Category: Send + Sync {
    /// `(id, major, minor)` this category asks for in the handshake.
    fn descriptor(&self) -> CategoryDescriptor;

    /// The category's request/response channel.
    fn link(&self) -> &CategoryLink;

    /// Handles an event body pushed by the manager.
    ///
    /// # Errors
    ///
    /// [`CategoryError::Protocol`] for a body that is not one of the
    /// category's events, [`CategoryError::UnhandledEvent`] when the category
    /// has no events at all.
    fn handle_event(&self, _body: &[u8]) -> Result<(), CategoryError> {
        Err(CategoryError::UnhandledEvent(self.descriptor().id))
    }

    /// Handles a request originated by the manager.
    ///
    /// # Errors
    ///
    /// [`CategoryError::UnhandledRequest`] unless overridden.
    fn handle_request(&self, _body: &[u8], _request_id: u32) -> Result<(), CategoryError> {
        Err(CategoryError::UnhandledRequest(self.descriptor().id))
    }

    /// Stores a response into the pending slot and wakes the waiter.
    ///
    /// # Errors
    ///
    /// [`CategoryError::UnsolicitedResponse`] if nothing is waiting for it.
    fn handle_response(&self, request_id: u32, body: &[u8]) -> Result<(), CategoryError> {
        self.link().store_response(request_id, body)
    }

    /// Host-tick hook: drain buffered events to local handlers.
    fn update(&self) {}

    /// Drops all per-connection state.  Called on disconnect.
    fn reset(&self) {}
}
