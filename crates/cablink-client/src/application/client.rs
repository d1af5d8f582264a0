//! CabinetClient: the orchestrator the host talks to.
//!
//! # Wiring
//!
//! ```text
//!  transport thread                         host thread
//!  ────────────────                         ───────────
//!  Router ─► ResourceCategory ─┐
//!        ─► WindowCategory ────┼─► EventAggregator ──update()──► Reactor
//!        ─► ButtonPanelCategory (buffered)                         │
//!                               └────────── update() ──► button    ├─► ResourceManager::reconcile
//!                                                       subscribers└─► PanelAutomaton ─► register / unregister
//! ```
//!
//! # Connection lifecycle
//!
//! `connect_with` resets all local state, opens the transport, runs the
//! handshake and installs the accepted categories.  `disconnect` stops event
//! intake, releases every held device on the manager, clears local state,
//! sends the shutdown notice and closes the transport.  Nothing survives a
//! reconnect.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cablink_core::protocol::{ClientType, ResourceEvent, WindowEvent};
use cablink_core::{
    CategoryDescriptor, CategoryId, DeviceKey, DeviceRef, DeviceType, PlatformTarget,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::aggregator::{EventAggregator, HostEvent, HostEventKind};
use super::handshake::{Handshake, HandshakeError};
use super::panel::{PanelAutomaton, PanelCommand, PanelState};
use super::resources::ResourceManager;
use super::router::Router;
use crate::categories::{
    ButtonPanelCategory, ConnectionCategory, ResourceCategory, WindowCategory,
};
use crate::category::{Category, ErrorPolicy, SubscriptionId, Subscribers};
use crate::fault::{lock, FaultMonitor, LinkFault};
use crate::transport::{InboundSink, Transport, TransportError};

/// Everything that parameterizes a client, independent of where it came from.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub client_token: Uuid,
    pub client_type: ClientType,
    pub platform_target: PlatformTarget,
    pub resource_policy: ErrorPolicy,
    pub button_panel_policy: ErrorPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_token: Uuid::new_v4(),
            client_type: ClientType::default(),
            platform_target: PlatformTarget::default(),
            resource_policy: ErrorPolicy::resource_management_default(),
            button_panel_policy: ErrorPolicy::button_panel_default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Fault(#[from] LinkFault),
}

/// Host-tick reactions to aggregated events.
struct Reactor {
    resources: Arc<ResourceManager>,
    panels: Mutex<PanelAutomaton>,
    button_panel: Arc<ButtonPanelCategory>,
    installed: Subscribers<CategoryDescriptor>,
}

impl Reactor {
    fn on_event(&self, event: &HostEvent) {
        match event {
            HostEvent::Resource(resource_event) => {
                self.resources.reconcile(resource_event);
                let commands = self.panel_transition(resource_event);
                self.issue(commands);
            }
            HostEvent::Window(window_event) => {
                let commands = lock(&self.panels).on_visibility(window_event.any_visible());
                self.issue(commands);
            }
            HostEvent::CategoryInstalled(descriptor) => {
                self.installed.publish(descriptor);
            }
        }
    }

    fn panel_transition(&self, event: &ResourceEvent) -> Vec<PanelCommand> {
        let mut panels = lock(&self.panels);
        match event {
            ResourceEvent::DeviceAcquired { device, groups } if groups.is_empty() => {
                match panel_id(device) {
                    Some(id) => panels.on_device_acquired(id),
                    None => Vec::new(),
                }
            }
            ResourceEvent::DeviceReleased { device, groups } if groups.is_empty() => {
                match panel_id(device) {
                    Some(id) => panels.on_device_released(id),
                    None => Vec::new(),
                }
            }
            ResourceEvent::DeviceRemoved { device } => {
                if let Some(id) = panel_id(device) {
                    panels.on_device_removed(id);
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn issue(&self, commands: Vec<PanelCommand>) {
        if commands.is_empty() {
            return;
        }
        if !self.button_panel.link().is_attached() {
            debug!("button panel not installed; skipping {commands:?}");
            return;
        }
        for command in commands {
            let result = match command {
                PanelCommand::Register(id) => self.button_panel.register_panel(id),
                PanelCommand::Unregister(id) => self.button_panel.unregister_panel(id),
            };
            if let Err(e) = result {
                error!("{command:?} failed: {e}");
            }
        }
    }
}

fn panel_id(device: &DeviceRef) -> Option<u32> {
    let key = DeviceKey::from(*device);
    (key.device_type == DeviceType::ButtonPanel).then_some(key.device_id)
}

struct Session {
    transport: Arc<dyn Transport>,
    router: Arc<Router>,
}

pub struct CabinetClient {
    options: ClientOptions,
    connection: Arc<ConnectionCategory>,
    resource_category: Arc<ResourceCategory>,
    button_panel: Arc<ButtonPanelCategory>,
    window: Arc<WindowCategory>,
    aggregator: Arc<EventAggregator>,
    reactor: Arc<Reactor>,
    session: Mutex<Option<Session>>,
}

impl CabinetClient {
    pub fn new(options: ClientOptions) -> Self {
        let connection = Arc::new(ConnectionCategory::new());
        let resource_category = Arc::new(ResourceCategory::new(options.platform_target));
        let button_panel = Arc::new(ButtonPanelCategory::new(
            options.button_panel_policy.clone(),
        ));
        let window = Arc::new(WindowCategory::new(options.platform_target));
        let aggregator = Arc::new(EventAggregator::new());

        let queue = Arc::clone(&aggregator);
        resource_category.events().subscribe(move |event: &ResourceEvent| {
            queue.enqueue(HostEvent::Resource(event.clone()));
        });
        let queue = Arc::clone(&aggregator);
        window.events().subscribe(move |event: &WindowEvent| {
            queue.enqueue(HostEvent::Window(event.clone()));
        });

        let reactor = Arc::new(Reactor {
            resources: Arc::new(ResourceManager::new(
                Arc::clone(&resource_category),
                options.resource_policy.clone(),
            )),
            panels: Mutex::new(PanelAutomaton::new()),
            button_panel: Arc::clone(&button_panel),
            installed: Subscribers::new(),
        });
        for kind in [
            HostEventKind::DeviceAcquired,
            HostEventKind::DeviceReleased,
            HostEventKind::DeviceConnected,
            HostEventKind::DeviceRemoved,
            HostEventKind::VisibilityChanged,
            HostEventKind::MultiWindowVisibilityChanged,
            HostEventKind::CategoryInstalled,
        ] {
            let reactor = Arc::clone(&reactor);
            aggregator.set_handler(kind, move |event: &HostEvent| reactor.on_event(event));
        }

        Self {
            options,
            connection,
            resource_category,
            button_panel,
            window,
            aggregator,
            reactor,
            session: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    // ── Connection ───────────────────────────────────────────────────────────

    /// Connects over the transport returned by `open`, which receives the
    /// inbound sink it must deliver envelopes and faults to.
    ///
    /// An existing session is disconnected first.
    ///
    /// # Errors
    ///
    /// [`HandshakeError`] if the transport cannot be opened, the manager
    /// refuses, a version is incompatible, or the link fails mid-handshake.
    /// No category is left installed on error.
    pub fn connect_with<F>(&self, open: F) -> Result<(), HandshakeError>
    where
        F: FnOnce(Arc<dyn InboundSink>) -> Result<Arc<dyn Transport>, TransportError>,
    {
        self.disconnect();
        self.reset_local_state();

        let monitor = FaultMonitor::new();
        let router = Arc::new(Router::new(Arc::clone(&monitor)));
        router.install(Arc::clone(&self.connection) as Arc<dyn Category>);
        let transport = open(Arc::clone(&router) as Arc<dyn InboundSink>)?;
        self.connection
            .link()
            .attach(Arc::clone(&transport), Arc::clone(&monitor));
        self.aggregator.attach(&monitor);

        let candidates: Vec<Arc<dyn Category>> = vec![
            Arc::clone(&self.resource_category) as Arc<dyn Category>,
            Arc::clone(&self.button_panel) as Arc<dyn Category>,
            Arc::clone(&self.window) as Arc<dyn Category>,
        ];
        let mut handshake = Handshake::new(&self.connection);
        let accepted = match handshake.run(
            self.options.client_token,
            self.options.client_type,
            &candidates,
        ) {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("handshake ended in {:?}: {e}", handshake.state());
                self.connection.link().detach();
                router.clear();
                transport.close();
                return Err(e);
            }
        };

        for category in accepted {
            let descriptor = category.descriptor();
            category
                .link()
                .attach(Arc::clone(&transport), Arc::clone(&monitor));
            router.install(category);
            info!("installed {descriptor}");
            self.aggregator
                .enqueue(HostEvent::CategoryInstalled(descriptor));
        }
        *lock(&self.session) = Some(Session { transport, router });

        self.seed_visibility();
        Ok(())
    }

    /// Tears the session down.  A no-op when not connected.
    ///
    /// Blocked requests are not interrupted by this; they resolve through
    /// their response, a fault, or a shutdown notice.
    pub fn disconnect(&self) {
        let Some(session) = lock(&self.session).take() else {
            return;
        };
        info!("disconnecting");

        self.aggregator.begin_disconnect();
        let released = self.reactor.resources.release_all_devices();
        debug!("released {released} devices on teardown");
        self.reactor.resources.reset_all_devices();
        lock(&self.reactor.panels).reset();
        for category in session.router.installed() {
            category.reset();
        }

        if let Err(e) = self.connection.send_shutdown("client disconnecting") {
            warn!("shutdown notice not sent: {e}");
        }
        for category in session.router.clear() {
            category.link().detach();
        }
        session.transport.close();
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.session).is_some()
    }

    /// Whether the handshake installed category `id` on this connection.
    pub fn is_installed(&self, id: CategoryId) -> bool {
        lock(&self.session)
            .as_ref()
            .is_some_and(|s| s.router.is_installed(id))
    }

    /// The fault that ended the current connection, if any.
    pub fn fault(&self) -> Option<LinkFault> {
        self.monitor().and_then(|m| m.fault())
    }

    // ── Host tick ────────────────────────────────────────────────────────────

    /// Runs one host tick: drains the central queue to its handlers, then
    /// lets every installed category flush its own buffer.
    ///
    /// Returns the number of central events drained, or `None` if the queue
    /// was busy and the drain was skipped.
    pub fn update(&self) -> Option<usize> {
        let drained = self.aggregator.update();
        let installed = lock(&self.session)
            .as_ref()
            .map(|s| s.router.installed())
            .unwrap_or_default();
        for category in installed {
            category.update();
        }
        drained
    }

    /// Blocks until an event of `kind` is queued (not consumed) or the link
    /// faults.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`], or the link's fault.
    pub fn wait_for_event(&self, kind: HostEventKind) -> Result<(), ClientError> {
        let monitor = self.monitor().ok_or(ClientError::NotConnected)?;
        Ok(self.aggregator.wait_for_event(kind, &monitor)?)
    }

    /// Like [`wait_for_event`](Self::wait_for_event), giving up after
    /// `timeout`.  Returns whether the event showed up.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotConnected`], or the link's fault.
    pub fn wait_for_event_timeout(
        &self,
        kind: HostEventKind,
        timeout: Duration,
    ) -> Result<bool, ClientError> {
        let monitor = self.monitor().ok_or(ClientError::NotConnected)?;
        Ok(self
            .aggregator
            .wait_for_event_timeout(kind, &monitor, timeout)?)
    }

    pub fn pending_events(&self) -> usize {
        self.aggregator.len()
    }

    // ── Categories and notifications ─────────────────────────────────────────

    pub fn resources(&self) -> &ResourceManager {
        &self.reactor.resources
    }

    pub fn button_panel(&self) -> &ButtonPanelCategory {
        &self.button_panel
    }

    pub fn window(&self) -> &WindowCategory {
        &self.window
    }

    /// Registration state of one panel, as the automaton sees it.
    pub fn panel_state(&self, panel_id: u32) -> Option<PanelState> {
        lock(&self.reactor.panels).panel(panel_id)
    }

    pub fn window_visible(&self) -> bool {
        lock(&self.reactor.panels).window_visible()
    }

    /// Subscribes to "category installed" notifications, delivered on the
    /// host tick after each successful handshake.
    pub fn on_category_installed(
        &self,
        callback: impl Fn(&CategoryDescriptor) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.reactor.installed.subscribe(callback)
    }

    pub fn unsubscribe_category_installed(&self, id: SubscriptionId) -> bool {
        self.reactor.installed.unsubscribe(id)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn monitor(&self) -> Option<Arc<FaultMonitor>> {
        lock(&self.session)
            .as_ref()
            .map(|s| Arc::clone(s.router.monitor()))
    }

    fn reset_local_state(&self) {
        self.aggregator.reset();
        self.reactor.resources.reset_all_devices();
        lock(&self.reactor.panels).reset();
        for category in [
            Arc::clone(&self.connection) as Arc<dyn Category>,
            Arc::clone(&self.resource_category) as Arc<dyn Category>,
            Arc::clone(&self.button_panel) as Arc<dyn Category>,
            Arc::clone(&self.window) as Arc<dyn Category>,
        ] {
            category.reset();
        }
    }

    fn seed_visibility(&self) {
        if !self.window.link().is_attached() {
            return;
        }
        match self.window.get_visibility() {
            Ok(visible) => {
                debug!("window visible at connect: {visible}");
                let commands = lock(&self.reactor.panels).on_visibility(visible);
                self.reactor.issue(commands);
            }
            Err(e) => warn!("could not query window visibility: {e}"),
        }
    }
}
