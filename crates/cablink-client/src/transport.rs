//! The transport contract.
//!
//! The physical connection (socket, framing) is an external collaborator.
//! The framework only needs to hand it envelopes ([`Transport`]) and to be
//! handed envelopes and faults back ([`InboundSink`]).  A production TCP
//! implementation lives in `infrastructure::network`; tests use
//! `infrastructure::testing::ScriptedManager` or a `mockall` mock.

use cablink_core::Envelope;
use thiserror::Error;

use crate::fault::LinkFault;

/// Errors raised synchronously by [`Transport::send`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has been closed or its writer has stopped.
    #[error("transport is closed")]
    Closed,
    /// The envelope could not be framed.
    #[error("failed to frame envelope: {0}")]
    Encode(String),
    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),
}

/// Outbound half of the shared channel.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Queues `envelope` for delivery to the manager.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the transport cannot accept it.
    fn send(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Stops the transport.  Idempotent.
    fn close(&self);
}

/// Inbound half: where the transport's receive thread delivers.
pub trait InboundSink: Send + Sync {
    /// Routes one envelope received from the manager.
    fn deliver(&self, envelope: Envelope);

    /// Reports that the receive path has failed.
    fn fault(&self, fault: LinkFault);
}
