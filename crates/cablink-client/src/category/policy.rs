//! Per-category suppression of resource error codes.
//!
//! Some manager error codes are business noise for one category and real
//! failures for another: releasing a device the client no longer owns is
//! harmless during teardown, while failing to register a panel the client
//! believes it owns is not.  Each category therefore carries its own
//! [`ErrorPolicy`], loaded from configuration, instead of one global rule.

use cablink_core::protocol::ResourceErrorCode;
use cablink_core::CategoryId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::CategoryError;

/// A resource operation that did not succeed.
#[derive(Debug, Error, PartialEq)]
pub enum ResourceError {
    /// The manager refused with a code the category's policy escalates.
    /// Code and description are passed through verbatim.
    #[error("{category} refused with {code:?}: {description}")]
    Remote {
        category: CategoryId,
        code: ResourceErrorCode,
        description: String,
    },

    #[error(transparent)]
    Category(#[from] CategoryError),
}

/// How [`ErrorPolicy::screen`] classified a result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screened {
    Success,
    /// A failure the policy converts to a non-throwing result.
    Suppressed(ResourceErrorCode),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorPolicy {
    /// Codes converted to a non-throwing result instead of an error.
    #[serde(default)]
    pub suppressed: Vec<ResourceErrorCode>,
}

impl ErrorPolicy {
    pub fn suppressing(codes: &[ResourceErrorCode]) -> Self {
        Self {
            suppressed: codes.to_vec(),
        }
    }

    /// Default for resource management: not owning a resource is benign.
    pub fn resource_management_default() -> Self {
        Self::suppressing(&[ResourceErrorCode::ClientDoesNotOwnResource])
    }

    /// Default for the button panel: ownership races and driver hiccups are
    /// expected while a panel is being acquired or released.
    pub fn button_panel_default() -> Self {
        Self::suppressing(&[
            ResourceErrorCode::ClientDoesNotOwnResource,
            ResourceErrorCode::DriverBusy,
        ])
    }

    pub fn suppresses(&self, code: ResourceErrorCode) -> bool {
        self.suppressed.contains(&code)
    }

    /// Classifies a reply code: `Success`, suppressed, or escalated.
    ///
    /// `Queued` is not special-cased here; callers that treat it as an
    /// outcome check for it first.
    ///
    /// # Errors
    ///
    /// [`ResourceError::Remote`] for any failure code not in `suppressed`.
    pub fn screen(
        &self,
        category: CategoryId,
        code: ResourceErrorCode,
        description: &str,
    ) -> Result<Screened, ResourceError> {
        if code == ResourceErrorCode::Success {
            return Ok(Screened::Success);
        }
        if self.suppresses(code) {
            debug!("{category}: suppressed {code:?} ({description})");
            return Ok(Screened::Suppressed(code));
        }
        Err(ResourceError::Remote {
            category,
            code,
            description: description.to_string(),
        })
    }
}
