//! PanelAutomaton: decides when a button panel should be registered.
//!
//! A panel is "hot" (its buttons produce events) only while the client owns
//! it *and* the presentation window is visible.  Ownership arrives as
//! device-acquired/released events, visibility as window events; the two are
//! independent and may arrive in any order.
//!
//! ```text
//! should_be_registered = window_visible && acquired
//!
//!   should && !registered  ──►  Register(id),   registered = true
//!  !should &&  registered  ──►  Unregister(id), registered = false
//! ```
//!
//! The rule is re-evaluated for every known panel on every input, which is
//! what makes duplicate register/unregister calls impossible.
//!
//! The automaton is pure: it returns the commands to issue and the caller
//! performs them.  `registered` flips when the command is *issued*, not when
//! the manager confirms it.

use std::collections::BTreeMap;

/// A request the caller must send to the button panel category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    Register(u32),
    Unregister(u32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelState {
    pub acquired: bool,
    pub registered: bool,
}

#[derive(Debug, Default)]
pub struct PanelAutomaton {
    // BTreeMap so commands for several panels come out in id order.
    panels: BTreeMap<u32, PanelState>,
    window_visible: bool,
}

impl PanelAutomaton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_device_acquired(&mut self, panel_id: u32) -> Vec<PanelCommand> {
        self.panels.entry(panel_id).or_default().acquired = true;
        self.evaluate()
    }

    pub fn on_device_released(&mut self, panel_id: u32) -> Vec<PanelCommand> {
        self.panels.entry(panel_id).or_default().acquired = false;
        self.evaluate()
    }

    /// Forgets a panel that was unplugged.  No unregister is issued; there is
    /// nothing left on the other side to unregister.
    pub fn on_device_removed(&mut self, panel_id: u32) {
        self.panels.remove(&panel_id);
    }

    pub fn on_visibility(&mut self, visible: bool) -> Vec<PanelCommand> {
        self.window_visible = visible;
        self.evaluate()
    }

    /// Back to "nothing acquired, window hidden".  Called on every connect.
    pub fn reset(&mut self) {
        self.panels.clear();
        self.window_visible = false;
    }

    pub fn window_visible(&self) -> bool {
        self.window_visible
    }

    pub fn panel(&self, panel_id: u32) -> Option<PanelState> {
        self.panels.get(&panel_id).copied()
    }

    fn evaluate(&mut self) -> Vec<PanelCommand> {
        let visible = self.window_visible;
        let mut commands = Vec::new();
        for (&id, state) in self.panels.iter_mut() {
            let should_be_registered = visible && state.acquired;
            if should_be_registered && !state.registered {
                state.registered = true;
                commands.push(PanelCommand::Register(id));
            } else if !should_be_registered && state.registered {
                state.registered = false;
                commands.push(PanelCommand::Unregister(id));
            }
        }
        commands
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
