//! Connection handshake: one INIT round trip that decides which categories
//! this connection may use.
//!
//! # States
//!
//! ```text
//! Idle ──► Initializing ──► AwaitingInitResponse ──┬──► Installed
//!                                                  ├──► VersionMismatch
//!                                                  ├──► ConnectFailed
//!                                                  ├──► ShutdownReceived
//!                                                  └──► Faulted
//! ```
//!
//! # Negotiation rule
//!
//! For every category the manager echoes back, the requested category with
//! the same id is accepted iff the majors are equal and the manager's minor is
//! at least the requested minor.  One incompatible echo fails the whole
//! handshake, and nothing is installed: every echo is validated before any
//! category is accepted.  Requested categories the manager does not echo are
//! simply absent from the result ("unsupported on this target").

use std::sync::Arc;

use cablink_core::protocol::{ClientType, ConnectionErrorCode, InitRequest};
use cablink_core::{negotiate, CategoryDescriptor, CategoryId, VersionMismatch};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::categories::ConnectionCategory;
use crate::category::{Category, CategoryError};
use crate::fault::LinkFault;
use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Initializing,
    AwaitingInitResponse,
    Installed,
    VersionMismatch,
    ConnectFailed,
    ShutdownReceived,
    /// The transport failed, or the request could not be sent.
    Faulted,
}

#[derive(Debug, Error, PartialEq)]
pub enum HandshakeError {
    /// The manager answered with a non-success code.
    #[error("manager refused the connection ({code:?}): {description}")]
    ConnectFailed {
        code: ConnectionErrorCode,
        description: String,
    },

    #[error(transparent)]
    VersionMismatch(#[from] VersionMismatch),

    /// A shutdown notice arrived before the INIT response.
    #[error("manager shut down during the handshake: {0}")]
    ShutdownReceived(String),

    /// The transport could not be opened.
    #[error("could not open transport: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Category(#[from] CategoryError),
}

/// Validates the manager's echo against what was requested.
///
/// Returns the ids to install, in echo order.
///
/// # Errors
///
/// The first [`VersionMismatch`] found; in that case nothing is accepted.
pub fn negotiate_categories(
    requested: &[CategoryDescriptor],
    echoed: &[CategoryDescriptor],
) -> Result<Vec<CategoryId>, VersionMismatch> {
    let mut accepted: Vec<CategoryId> = Vec::with_capacity(echoed.len());
    for offered in echoed {
        let Some(wanted) = requested.iter().find(|r| r.id == offered.id) else {
            debug!("manager echoed {offered}, which was not requested");
            continue;
        };
        negotiate(wanted, offered)?;
        if !accepted.contains(&offered.id) {
            accepted.push(offered.id);
        }
    }
    Ok(accepted)
}

/// Drives one handshake over an attached [`ConnectionCategory`].
pub struct Handshake<'a> {
    connection: &'a ConnectionCategory,
    state: HandshakeState,
}

impl<'a> Handshake<'a> {
    pub fn new(connection: &'a ConnectionCategory) -> Self {
        Self {
            connection,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Sends INIT for `candidates`, blocks for the response, and returns the
    /// candidates that may be installed.
    ///
    /// Installing them (attaching their links) is left to the caller so that
    /// this step cannot fail half-way.
    ///
    /// # Errors
    ///
    /// See [`HandshakeError`]; the final state names the outcome.
    pub fn run(
        &mut self,
        client_token: Uuid,
        client_type: ClientType,
        candidates: &[Arc<dyn Category>],
    ) -> Result<Vec<Arc<dyn Category>>, HandshakeError> {
        self.state = HandshakeState::Initializing;
        let requested: Vec<CategoryDescriptor> = candidates.iter().map(|c| c.descriptor()).collect();
        info!(
            "handshake: requesting {} categories as {client_type:?}",
            requested.len()
        );

        self.state = HandshakeState::AwaitingInitResponse;
        let response = self
            .connection
            .init(InitRequest {
                client_token,
                client_type,
                categories: requested.clone(),
            })
            .map_err(|e| self.fail_on(e))?;

        if response.error_code != ConnectionErrorCode::Success {
            self.state = HandshakeState::ConnectFailed;
            warn!(
                "handshake refused: {:?} ({})",
                response.error_code, response.description
            );
            return Err(HandshakeError::ConnectFailed {
                code: response.error_code,
                description: response.description,
            });
        }

        let accepted = negotiate_categories(&requested, &response.categories).map_err(|e| {
            self.state = HandshakeState::VersionMismatch;
            warn!("handshake aborted: {e}");
            e
        })?;

        for descriptor in &requested {
            if !accepted.contains(&descriptor.id) {
                info!("{} not offered by the manager; left uninstalled", descriptor.id);
            }
        }

        self.state = HandshakeState::Installed;
        Ok(candidates
            .iter()
            .filter(|c| accepted.contains(&c.descriptor().id))
            .cloned()
            .collect())
    }

    fn fail_on(&mut self, error: CategoryError) -> HandshakeError {
        match error {
            CategoryError::Fault(LinkFault::RemoteShutdown(description)) => {
                self.state = HandshakeState::ShutdownReceived;
                HandshakeError::ShutdownReceived(description)
            }
            other => {
                self.state = HandshakeState::Faulted;
                HandshakeError::Category(other)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cablink_core::CategoryVersion;

    const A: CategoryId = CategoryId(40);
    const B: CategoryId = CategoryId(41);

    #[test]
    fn test_one_mismatch_rejects_every_category() {
        // Arrange – A v1.2 / B v2.0 requested, manager has A v1.3 / B v1.9
        let requested = [
            CategoryDescriptor::new(A, 1, 2),
            CategoryDescriptor::new(B, 2, 0),
        ];
        let echoed = [
            CategoryDescriptor::new(A, 1, 3),
            CategoryDescriptor::new(B, 1, 9),
        ];

        // Act
        let result = negotiate_categories(&requested, &echoed);

        // Assert
        assert_eq!(
            result,
            Err(VersionMismatch {
                category: B,
                requested: CategoryVersion::new(2, 0),
                offered: CategoryVersion::new(1, 9),
            })
        );
    }

    #[test]
    fn test_categories_not_echoed_are_not_accepted() {
        let requested = [
            CategoryDescriptor::new(A, 1, 0),
            CategoryDescriptor::new(B, 1, 0),
        ];
        let echoed = [CategoryDescriptor::new(B, 1, 4)];

        assert_eq!(negotiate_categories(&requested, &echoed), Ok(vec![B]));
    }

    #[test]
    fn test_unrequested_echo_is_ignored() {
        let requested = [CategoryDescriptor::new(A, 1, 0)];
        let echoed = [
            CategoryDescriptor::new(B, 7, 0),
            CategoryDescriptor::new(A, 1, 0),
        ];

        assert_eq!(negotiate_categories(&requested, &echoed), Ok(vec![A]));
    }

    #[test]
    fn test_new_handshake_is_idle() {
        let connection = ConnectionCategory::new();
        assert_eq!(Handshake::new(&connection).state(), HandshakeState::Idle);
    }
}
