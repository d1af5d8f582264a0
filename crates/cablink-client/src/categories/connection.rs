//! Category 0: the handshake and the shutdown notice.

use cablink_core::protocol::{
    decode_body, ConnectionEvent, ConnectionRequest, ConnectionResponse, InitRequest,
    InitResponse, ShutdownNotice,
};
use cablink_core::{CategoryDescriptor, CategoryId};
use tracing::info;

use crate::category::{Category, CategoryError, CategoryLink};
use crate::fault::LinkFault;

pub struct ConnectionCategory {
    link: CategoryLink,
}

impl Default for ConnectionCategory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionCategory {
    pub fn new() -> Self {
        Self {
            link: CategoryLink::new(CategoryId::CONNECTION),
        }
    }

    /// Sends the INIT request and blocks for the manager's verdict.
    ///
    /// # Errors
    ///
    /// Any [`CategoryError`] from the link; a shutdown notice received while
    /// waiting surfaces as `Fault(RemoteShutdown)`.
    pub fn init(&self, request: InitRequest) -> Result<InitResponse, CategoryError> {
        match self.link.request(&ConnectionRequest::Init(request))? {
            ConnectionResponse::Init(response) => Ok(response),
        }
    }

    /// Fire-and-forget shutdown notice.  No response is awaited.
    ///
    /// # Errors
    ///
    /// Encode or transport errors; callers tearing down log and continue.
    pub fn send_shutdown(&self, description: &str) -> Result<(), CategoryError> {
        self.link.send_event(&ConnectionEvent::Shutdown(ShutdownNotice {
            description: description.to_string(),
        }))
    }
}

impl Category for ConnectionCategory {
    fn descriptor(&self) -> CategoryDescriptor {
        CategoryDescriptor::new(CategoryId::CONNECTION, 1, 0)
    }

    fn link(&self) -> &CategoryLink {
        &self.link
    }

    fn handle_event(&self, body: &[u8]) -> Result<(), CategoryError> {
        match decode_body(CategoryId::CONNECTION, body)? {
            ConnectionEvent::Shutdown(notice) => {
                info!("manager shutdown notice: {}", notice.description);
                self.link
                    .raise_fault(LinkFault::RemoteShutdown(notice.description));
            }
        }
        Ok(())
    }
}
