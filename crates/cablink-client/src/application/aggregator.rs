//! EventAggregator: one ordered queue for every category's notifications,
//! drained once per host tick.
//!
//! # Producer side (receive thread)
//!
//! [`EventAggregator::enqueue`] always takes the queue lock and never drops
//! an event, except while the aggregator is *disconnecting*: teardown
//! discards late events so the host is not surprised by stale notifications.
//!
//! # Consumer side (host thread)
//!
//! [`EventAggregator::update`] never blocks on the receive thread:
//!
//! 1. try-lock the queue; if contended, skip this tick;
//! 2. swap the backlog out and release the lock;
//! 3. outside the lock, dispatch each event in FIFO order to the handler
//!    registered for its [`HostEventKind`] (no handler: dropped).
//!
//! Insertion order is delivery order, across all categories.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use cablink_core::protocol::{MessageName, ResourceEvent, WindowEvent};
use cablink_core::CategoryDescriptor;
use tracing::{debug, trace};

use crate::fault::{lock, FaultMonitor, Gate, LinkFault, Wake};

/// A notification queued for the host tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Resource(ResourceEvent),
    Window(WindowEvent),
    /// The handshake installed this category.
    CategoryInstalled(CategoryDescriptor),
}

/// The concrete type of a [`HostEvent`]; handlers are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    DeviceAcquired,
    DeviceReleased,
    DeviceConnected,
    DeviceRemoved,
    VisibilityChanged,
    MultiWindowVisibilityChanged,
    CategoryInstalled,
}

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            HostEvent::Resource(ResourceEvent::DeviceAcquired { .. }) => HostEventKind::DeviceAcquired,
            HostEvent::Resource(ResourceEvent::DeviceReleased { .. }) => HostEventKind::DeviceReleased,
            HostEvent::Resource(ResourceEvent::DeviceConnected { .. }) => {
                HostEventKind::DeviceConnected
            }
            HostEvent::Resource(ResourceEvent::DeviceRemoved { .. }) => HostEventKind::DeviceRemoved,
            HostEvent::Window(WindowEvent::VisibilityChanged { .. }) => {
                HostEventKind::VisibilityChanged
            }
            HostEvent::Window(WindowEvent::MultiWindowVisibilityChanged { .. }) => {
                HostEventKind::MultiWindowVisibilityChanged
            }
            HostEvent::CategoryInstalled(_) => HostEventKind::CategoryInstalled,
        }
    }
}

impl MessageName for HostEvent {
    fn variant_name(&self) -> &'static str {
        match self {
            HostEvent::Resource(event) => event.variant_name(),
            HostEvent::Window(WindowEvent::VisibilityChanged { .. }) => "VisibilityChanged",
            HostEvent::Window(WindowEvent::MultiWindowVisibilityChanged { .. }) => {
                "MultiWindowVisibilityChanged"
            }
            HostEvent::CategoryInstalled(_) => "CategoryInstalled",
        }
    }
}

pub type HostEventHandler = Box<dyn FnMut(&HostEvent) + Send>;

pub struct EventAggregator {
    queue: Arc<Gate<VecDeque<HostEvent>>>,
    disconnecting: AtomicBool,
    handlers: Mutex<HashMap<HostEventKind, HostEventHandler>>,
}

impl Default for EventAggregator {
    fn default() -> Self {
        Self {
            queue: Arc::new(Gate::new(VecDeque::new())),
            disconnecting: AtomicBool::new(false),
            handlers: Mutex::new(HashMap::new()),
        }
    }
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the queue with a connection's fault monitor so
    /// [`wait_for_event`](Self::wait_for_event) is interrupted by its faults.
    pub fn attach(&self, monitor: &FaultMonitor) {
        let gate: Weak<dyn Wake> = Arc::downgrade(&self.queue) as Weak<dyn Wake>;
        monitor.register(gate);
    }

    /// Sets the single handler for `kind`, returning the one it replaces.
    ///
    /// Handlers run on the host thread inside [`update`](Self::update) and
    /// must not call back into `set_handler`.
    pub fn set_handler(
        &self,
        kind: HostEventKind,
        handler: impl FnMut(&HostEvent) + Send + 'static,
    ) -> Option<HostEventHandler> {
        lock(&self.handlers).insert(kind, Box::new(handler))
    }

    /// Appends `event`.  Returns `false` if it was discarded because the
    /// aggregator is disconnecting.
    ///
    /// The flag is read under the queue lock, so no event can slip in between
    /// [`begin_disconnect`](Self::begin_disconnect) raising it and clearing
    /// the backlog.
    pub fn enqueue(&self, event: HostEvent) -> bool {
        self.queue.update(|queue| {
            if self.disconnecting.load(Ordering::Acquire) {
                debug!("disconnecting; dropped {}", event.variant_name());
                return false;
            }
            trace!("queued {}", event.variant_name());
            queue.push_back(event);
            true
        })
    }

    /// Drains the backlog to the registered handlers.  Returns how many
    /// events were taken from the queue (dispatched or dropped), or `None` if
    /// the queue was contended and this tick was skipped.
    pub fn update(&self) -> Option<usize> {
        let backlog = {
            let mut queue = self.queue.try_lock()?;
            std::mem::take(&mut *queue)
        };
        let drained = backlog.len();
        if drained == 0 {
            return Some(0);
        }

        let mut handlers = lock(&self.handlers);
        for event in &backlog {
            match handlers.get_mut(&event.kind()) {
                Some(handler) => handler(event),
                None => trace!("no handler for {}", event.variant_name()),
            }
        }
        Some(drained)
    }

    /// Blocks until an event of `kind` is present in the queue (it is not
    /// consumed), or the monitor faults.
    ///
    /// A concurrent [`update`](Self::update) may drain the event right after
    /// this returns; callers should re-check their own state rather than
    /// assume it is still queued.
    ///
    /// # Errors
    ///
    /// The monitor's [`LinkFault`].
    pub fn wait_for_event(&self, kind: HostEventKind, monitor: &FaultMonitor) -> Result<(), LinkFault> {
        self.queue
            .wait_until(monitor, |queue| queue.iter().any(|e| e.kind() == kind).then_some(()))
    }

    /// Like [`wait_for_event`](Self::wait_for_event), giving up after
    /// `timeout`.  Returns whether the event showed up.
    ///
    /// # Errors
    ///
    /// The monitor's [`LinkFault`].
    pub fn wait_for_event_timeout(
        &self,
        kind: HostEventKind,
        monitor: &FaultMonitor,
        timeout: Duration,
    ) -> Result<bool, LinkFault> {
        let found = self.queue.wait_until_timeout(monitor, timeout, |queue| {
            queue.iter().any(|e| e.kind() == kind).then_some(())
        })?;
        Ok(found.is_some())
    }

    /// Starts teardown: later events are discarded and the backlog is dropped.
    pub fn begin_disconnect(&self) {
        self.queue.update(|queue| {
            self.disconnecting.store(true, Ordering::Release);
            queue.clear();
        });
    }

    /// Accepts events again, with an empty queue.  Called on connect.
    pub fn reset(&self) {
        self.queue.update(|queue| {
            queue.clear();
            self.disconnecting.store(false, Ordering::Release);
        });
    }

    pub fn is_disconnecting(&self) -> bool {
        self.disconnecting.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.queue.update(VecDeque::clear);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
