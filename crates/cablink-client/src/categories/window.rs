//! Category 3: presentation window visibility.

use cablink_core::protocol::{decode_body, WindowEvent, WindowRequest, WindowResponse};
use cablink_core::{CategoryDescriptor, CategoryId, PlatformTarget};
use tracing::debug;

use crate::category::{Category, CategoryError, CategoryLink, Subscribers};

pub struct WindowCategory {
    link: CategoryLink,
    target: PlatformTarget,
    events: Subscribers<WindowEvent>,
}

impl WindowCategory {
    pub fn new(target: PlatformTarget) -> Self {
        Self {
            link: CategoryLink::new(CategoryId::WINDOW_CONTROL),
            target,
            events: Subscribers::new(),
        }
    }

    pub fn minor_version(target: PlatformTarget) -> u16 {
        match target {
            PlatformTarget::Legacy => 0,
            PlatformTarget::Standard | PlatformTarget::Extended => 1,
        }
    }

    pub fn events(&self) -> &Subscribers<WindowEvent> {
        &self.events
    }

    /// Asks the manager whether the presentation window is currently shown.
    pub fn get_visibility(&self) -> Result<bool, CategoryError> {
        match self.link.request(&WindowRequest::GetVisibility)? {
            WindowResponse::Visibility { visible } => Ok(visible),
        }
    }
}

impl Category for WindowCategory {
    fn descriptor(&self) -> CategoryDescriptor {
        CategoryDescriptor::new(
            CategoryId::WINDOW_CONTROL,
            1,
            Self::minor_version(self.target),
        )
    }

    fn link(&self) -> &CategoryLink {
        &self.link
    }

    fn handle_event(&self, body: &[u8]) -> Result<(), CategoryError> {
        let event: WindowEvent = decode_body(self.link.id(), body)?;
        if self.events.publish(&event) == 0 {
            debug!("window event with no subscriber: {event:?}");
        }
        Ok(())
    }
}
