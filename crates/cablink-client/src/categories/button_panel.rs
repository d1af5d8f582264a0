//! Category 2: panel registration and live button input.
//!
//! Button events are buffered on the receive thread and handed to
//! subscribers on the host tick ([`Category::update`]), so game code sees
//! input on its own thread.

use cablink_core::protocol::{
    decode_body, ButtonPanelEvent, ButtonPanelRequest, ButtonPanelResponse, ResourceReply,
};
use cablink_core::{CategoryDescriptor, CategoryId};
use tracing::{debug, info};

use crate::category::{
    Category, CategoryError, CategoryLink, ErrorPolicy, EventBuffer, ResourceError, Screened,
    Subscribers,
};

pub struct ButtonPanelCategory {
    link: CategoryLink,
    policy: ErrorPolicy,
    pending: EventBuffer<ButtonPanelEvent>,
    events: Subscribers<ButtonPanelEvent>,
}

impl ButtonPanelCategory {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            link: CategoryLink::new(CategoryId::BUTTON_PANEL),
            policy,
            pending: EventBuffer::new(),
            events: Subscribers::new(),
        }
    }

    /// Button presses and releases, delivered on the host tick.
    pub fn events(&self) -> &Subscribers<ButtonPanelEvent> {
        &self.events
    }

    /// Starts live input from `panel_id`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::Remote`] for a code this category's policy escalates.
    pub fn register_panel(&self, panel_id: u32) -> Result<Screened, ResourceError> {
        let request = ButtonPanelRequest::RegisterPanel { panel_id };
        let reply = match self.link.request(&request)? {
            ButtonPanelResponse::RegisterPanel(reply) => reply,
            other => return Err(self.unexpected("RegisterPanel", &other)),
        };
        let verdict = self.screen(&reply)?;
        info!("panel {panel_id} registered ({verdict:?})");
        Ok(verdict)
    }

    /// Stops live input from `panel_id`.
    ///
    /// # Errors
    ///
    /// [`ResourceError::Remote`] for a code this category's policy escalates.
    pub fn unregister_panel(&self, panel_id: u32) -> Result<Screened, ResourceError> {
        let request = ButtonPanelRequest::UnregisterPanel { panel_id };
        let reply = match self.link.request(&request)? {
            ButtonPanelResponse::UnregisterPanel(reply) => reply,
            other => return Err(self.unexpected("UnregisterPanel", &other)),
        };
        let verdict = self.screen(&reply)?;
        info!("panel {panel_id} unregistered ({verdict:?})");
        Ok(verdict)
    }

    fn unexpected(&self, expected: &'static str, actual: &ButtonPanelResponse) -> ResourceError {
        CategoryError::unexpected_reply(self.link.id(), expected, actual).into()
    }

    fn screen(&self, reply: &ResourceReply) -> Result<Screened, ResourceError> {
        self.policy
            .screen(self.link.id(), reply.code, &reply.description)
    }
}

impl Category for ButtonPanelCategory {
    fn descriptor(&self) -> CategoryDescriptor {
        CategoryDescriptor::new(CategoryId::BUTTON_PANEL, 1, 1)
    }

    fn link(&self) -> &CategoryLink {
        &self.link
    }

    fn handle_event(&self, body: &[u8]) -> Result<(), CategoryError> {
        let event: ButtonPanelEvent = decode_body(self.link.id(), body)?;
        self.pending.push(event);
        Ok(())
    }

    fn update(&self) {
        let Some(events) = self.pending.try_drain() else {
            return;
        };
        for event in &events {
            if self.events.publish(event) == 0 {
                debug!("button event with no subscriber: {event:?}");
            }
        }
    }

    fn reset(&self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cablink_core::protocol::encode_body;
    use std::sync::{Arc, Mutex};

    fn pressed(button_id: u16) -> ButtonPanelEvent {
        ButtonPanelEvent::ButtonPressed {
            panel_id: 7,
            button_id,
        }
    }

    #[test]
    fn test_events_wait_for_update() {
        // Arrange
        let category = ButtonPanelCategory::new(ErrorPolicy::button_panel_default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        category
            .events()
            .subscribe(move |e: &ButtonPanelEvent| sink.lock().unwrap().push(*e));

        // Act
        for button in [1, 2] {
            category
                .handle_event(&encode_body(&pressed(button)).unwrap())
                .expect("handled");
        }
        let before_tick = seen.lock().unwrap().len();
        category.update();

        // Assert
        assert_eq!(before_tick, 0, "nothing is delivered on the receive thread");
        assert_eq!(*seen.lock().unwrap(), vec![pressed(1), pressed(2)]);
    }

    #[test]
    fn test_reset_discards_buffered_events() {
        let category = ButtonPanelCategory::new(ErrorPolicy::default());
        category
            .handle_event(&encode_body(&pressed(3)).unwrap())
            .expect("handled");

        category.reset();

        let reached = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&reached);
        category
            .events()
            .subscribe(move |_: &ButtonPanelEvent| *counter.lock().unwrap() += 1);
        category.update();
        assert_eq!(*reached.lock().unwrap(), 0);
    }

    #[test]
    fn test_wrong_family_body_is_protocol_error() {
        let category = ButtonPanelCategory::new(ErrorPolicy::default());
        let result = category.handle_event(&[0xff, 0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(CategoryError::Protocol(_))));
    }
}
