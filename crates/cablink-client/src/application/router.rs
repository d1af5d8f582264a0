//! Router: the transport's inbound sink for one connection.
//!
//! Routes each envelope to the installed category with the same id, by
//! message kind.  Dispatch errors are logged and stay local to that message;
//! they never tear the connection down.  Transport faults go to the
//! connection's [`FaultMonitor`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cablink_core::{CategoryId, Envelope, MessageKind};
use tracing::{trace, warn};

use crate::category::Category;
use crate::fault::{FaultMonitor, LinkFault};
use crate::transport::InboundSink;

type CategoryMap = HashMap<CategoryId, Arc<dyn Category>>;

pub struct Router {
    monitor: Arc<FaultMonitor>,
    categories: RwLock<CategoryMap>,
}

impl Router {
    pub fn new(monitor: Arc<FaultMonitor>) -> Self {
        Self {
            monitor,
            categories: RwLock::new(HashMap::new()),
        }
    }

    pub fn monitor(&self) -> &Arc<FaultMonitor> {
        &self.monitor
    }

    /// Makes `category` reachable by inbound envelopes.
    pub fn install(&self, category: Arc<dyn Category>) {
        let id = category.descriptor().id;
        self.write().insert(id, category);
    }

    pub fn is_installed(&self, id: CategoryId) -> bool {
        self.read().contains_key(&id)
    }

    /// Installed categories, ordered by id.
    pub fn installed(&self) -> Vec<Arc<dyn Category>> {
        let mut categories: Vec<Arc<dyn Category>> = self.read().values().cloned().collect();
        categories.sort_by_key(|c| c.descriptor().id);
        categories
    }

    /// Uninstalls everything and returns what was installed.
    pub fn clear(&self) -> Vec<Arc<dyn Category>> {
        self.write().drain().map(|(_, c)| c).collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, CategoryMap> {
        self.categories.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CategoryMap> {
        self.categories.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InboundSink for Router {
    fn deliver(&self, envelope: Envelope) {
        // Clone out of the lock; handlers may block briefly on their own locks.
        let category = self.read().get(&envelope.category).cloned();
        let Some(category) = category else {
            warn!(
                "dropping {:?} for {}: category not installed",
                envelope.kind, envelope.category
            );
            return;
        };

        trace!(
            "{:?} #{} for {} ({} bytes)",
            envelope.kind,
            envelope.request_id,
            envelope.category,
            envelope.body.len()
        );
        let result = match envelope.kind {
            MessageKind::Event => category.handle_event(&envelope.body),
            MessageKind::Request => category.handle_request(&envelope.body, envelope.request_id),
            MessageKind::Response => category.handle_response(envelope.request_id, &envelope.body),
        };
        if let Err(e) = result {
            warn!("{} {:?} dropped: {e}", envelope.category, envelope.kind);
        }
    }

    fn fault(&self, fault: LinkFault) {
        self.monitor.raise(fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::WindowCategory;
    use crate::transport::MockTransport;
    use cablink_core::protocol::{encode_body, WindowEvent};
    use cablink_core::PlatformTarget;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_reaches_installed_category_only() {
        // Arrange
        let router = Router::new(FaultMonitor::new());
        let window = Arc::new(WindowCategory::new(PlatformTarget::Standard));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        window.events().subscribe(move |_: &WindowEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let body = encode_body(&WindowEvent::VisibilityChanged { visible: true }).unwrap();

        // Act
        router.deliver(Envelope::event(CategoryId::WINDOW_CONTROL, body.clone()));
        router.install(Arc::clone(&window) as Arc<dyn Category>);
        router.deliver(Envelope::event(CategoryId::WINDOW_CONTROL, body));

        // Assert
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_response_wakes_only_its_own_category() {
        // Arrange
        let monitor = FaultMonitor::new();
        let router = Router::new(Arc::clone(&monitor));
        let window = Arc::new(WindowCategory::new(PlatformTarget::Standard));
        let mut transport = MockTransport::new();
        transport.expect_send().returning(|_| Ok(()));
        window.link().attach(Arc::new(transport), Arc::clone(&monitor));
        router.install(Arc::clone(&window) as Arc<dyn Category>);
        let pending = window
            .link()
            .send_request::<_, cablink_core::protocol::WindowResponse>(
                &cablink_core::protocol::WindowRequest::GetVisibility,
            )
            .expect("send");

        // Act – a response for another category id with the same request id
        router.deliver(Envelope::response(
            CategoryId::BUTTON_PANEL,
            pending.request_id(),
            vec![0],
        ));

        // Assert
        assert!(window.link().has_outstanding_request());
        drop(pending);
    }

    #[test]
    fn test_fault_is_raised_on_monitor() {
        let monitor = FaultMonitor::new();
        let router = Router::new(Arc::clone(&monitor));

        router.fault(LinkFault::Transport("eof".to_string()));

        assert!(monitor.is_faulted());
    }
}
