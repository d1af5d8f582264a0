//! Fault monitor: turns a transport failure into an error for every blocked
//! waiter at once.
//!
//! Three operations block the host thread: a category waiting for its
//! response, the handshake waiting for the init response, and
//! `wait_for_event`.  Each of them waits on a [`Gate`] (a mutex-guarded value
//! plus a condition variable) that is registered with the connection's
//! [`FaultMonitor`].  When the transport fails, or the manager announces a
//! shutdown, [`FaultMonitor::raise`] records the fault and wakes every
//! registered gate; each waiter re-checks the monitor and returns the fault
//! instead of hanging.
//!
//! # Lost-wakeup freedom
//!
//! A waiter checks the monitor while holding its gate's lock, and `raise`
//! takes that same lock before notifying.  So either the waiter sees the
//! fault before sleeping, or it is already asleep when the notification
//! arrives.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// A condition that interrupts every blocked waiter on the connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkFault {
    /// The transport's receive path failed (I/O error, EOF, corrupt frame).
    #[error("transport fault: {0}")]
    Transport(String),
    /// The manager sent a shutdown notice.
    #[error("remote shutdown: {0}")]
    RemoteShutdown(String),
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Non-blocking lock; `None` means another thread holds it right now.
pub(crate) fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::WouldBlock) => None,
        Err(TryLockError::Poisoned(p)) => Some(p.into_inner()),
    }
}

// ── Wake ──────────────────────────────────────────────────────────────────────

/// Something the fault monitor can wake.
pub trait Wake: Send + Sync {
    fn wake(&self);
}

// ── Gate ──────────────────────────────────────────────────────────────────────

/// A mutex-guarded value that threads can block on until a predicate holds.
#[derive(Debug, Default)]
pub struct Gate<T> {
    value: Mutex<T>,
    changed: Condvar,
}

impl<T> Gate<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            changed: Condvar::new(),
        }
    }

    /// Blocking lock for producers and short inspections.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        lock(&self.value)
    }

    /// Non-blocking lock; `None` if contended.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        try_lock(&self.value)
    }

    /// Mutates the value under the lock and wakes all waiters.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = lock(&self.value);
        let result = f(&mut guard);
        self.changed.notify_all();
        result
    }

    /// Blocks until `poll` returns `Some`, or the monitor reports a fault.
    ///
    /// `poll` runs under the lock after every wake-up, so it always sees the
    /// current value; it may take from the value (e.g. empty a slot).
    ///
    /// # Errors
    ///
    /// Returns the monitor's [`LinkFault`] if one is (or becomes) raised
    /// while `poll` keeps returning `None`.
    pub fn wait_until<R>(
        &self,
        monitor: &FaultMonitor,
        mut poll: impl FnMut(&mut T) -> Option<R>,
    ) -> Result<R, LinkFault> {
        let mut guard = lock(&self.value);
        loop {
            if let Some(result) = poll(&mut guard) {
                return Ok(result);
            }
            monitor.check()?;
            guard = self
                .changed
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`wait_until`](Self::wait_until) but gives up after `timeout`,
    /// returning `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the monitor's [`LinkFault`] if one is raised first.
    pub fn wait_until_timeout<R>(
        &self,
        monitor: &FaultMonitor,
        timeout: Duration,
        mut poll: impl FnMut(&mut T) -> Option<R>,
    ) -> Result<Option<R>, LinkFault> {
        let deadline = Instant::now() + timeout;
        let mut guard = lock(&self.value);
        loop {
            if let Some(result) = poll(&mut guard) {
                return Ok(Some(result));
            }
            monitor.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            guard = self
                .changed
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl<T: Send> Wake for Gate<T> {
    fn wake(&self) {
        let _guard = lock(&self.value);
        self.changed.notify_all();
    }
}

// ── FaultMonitor ──────────────────────────────────────────────────────────────

/// Records the first fault on a connection and wakes every registered gate.
///
/// One monitor is created per connection attempt; a reconnect starts clean.
#[derive(Default)]
pub struct FaultMonitor {
    fault: Mutex<Option<LinkFault>>,
    gates: Mutex<Vec<Weak<dyn Wake>>>,
}

impl FaultMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a gate to be woken on fault.  Dropped gates are pruned lazily.
    pub fn register(&self, gate: Weak<dyn Wake>) {
        let mut gates = lock(&self.gates);
        gates.retain(|g| g.strong_count() > 0);
        gates.push(gate);
    }

    /// Records `fault` (the first one wins) and wakes every registered gate.
    pub fn raise(&self, fault: LinkFault) {
        {
            let mut slot = lock(&self.fault);
            if let Some(existing) = slot.as_ref() {
                debug!("fault already raised ({existing}); ignoring {fault}");
                return;
            }
            warn!("{fault}");
            *slot = Some(fault);
        }

        let gates: Vec<Arc<dyn Wake>> = lock(&self.gates)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for gate in gates {
            gate.wake();
        }
    }

    /// Returns the recorded fault, if any.
    pub fn fault(&self) -> Option<LinkFault> {
        lock(&self.fault).clone()
    }

    /// Synchronous check: `Err` once a fault has been raised.
    ///
    /// # Errors
    ///
    /// Returns the recorded [`LinkFault`].
    pub fn check(&self) -> Result<(), LinkFault> {
        match self.fault() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    pub fn is_faulted(&self) -> bool {
        lock(&self.fault).is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn registered_gate(monitor: &FaultMonitor) -> Arc<Gate<Option<u32>>> {
        let gate = Arc::new(Gate::new(None));
        let weak: Weak<dyn Wake> = Arc::downgrade(&gate) as Weak<dyn Wake>;
        monitor.register(weak);
        gate
    }

    #[test]
    fn test_wait_until_returns_value_set_by_another_thread() {
        // Arrange
        let monitor = FaultMonitor::new();
        let gate = registered_gate(&monitor);
        let producer = Arc::clone(&gate);

        // Act
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.update(|v| *v = Some(7));
        });
        let result = gate.wait_until(&monitor, |v| v.take());
        handle.join().expect("producer panicked");

        // Assert
        assert_eq!(result, Ok(7));
        assert!(gate.lock().is_none(), "poll must have taken the value");
    }

    #[test]
    fn test_raise_interrupts_every_blocked_waiter() {
        // Arrange – two waiters on two different gates
        let monitor = FaultMonitor::new();
        let gates = [registered_gate(&monitor), registered_gate(&monitor)];

        let waiters: Vec<_> = gates
            .iter()
            .map(|g| {
                let gate = Arc::clone(g);
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || gate.wait_until(&monitor, |v| v.take()))
            })
            .collect();

        // Act
        thread::sleep(Duration::from_millis(30));
        monitor.raise(LinkFault::Transport("socket reset".to_string()));

        // Assert
        for waiter in waiters {
            let result = waiter.join().expect("waiter panicked");
            assert_eq!(
                result,
                Err(LinkFault::Transport("socket reset".to_string()))
            );
        }
    }

    #[test]
    fn test_first_fault_wins() {
        let monitor = FaultMonitor::new();
        monitor.raise(LinkFault::RemoteShutdown("maintenance".to_string()));
        monitor.raise(LinkFault::Transport("eof".to_string()));

        assert_eq!(
            monitor.check(),
            Err(LinkFault::RemoteShutdown("maintenance".to_string()))
        );
    }

    #[test]
    fn test_wait_returns_immediately_when_already_faulted() {
        let monitor = FaultMonitor::new();
        monitor.raise(LinkFault::Transport("gone".to_string()));
        let gate: Gate<Option<u32>> = Gate::new(None);

        assert!(gate.wait_until(&monitor, |v| v.take()).is_err());
    }

    #[test]
    fn test_wait_until_timeout_gives_up() {
        let monitor = FaultMonitor::new();
        let gate: Gate<Option<u32>> = Gate::new(None);

        let result = gate.wait_until_timeout(&monitor, Duration::from_millis(10), |v| v.take());

        assert_eq!(result, Ok(None));
    }

    #[test]
    fn test_try_lock_reports_contention() {
        let gate = Gate::new(0u32);
        let _held = gate.lock();
        assert!(gate.try_lock().is_none());
    }
}
