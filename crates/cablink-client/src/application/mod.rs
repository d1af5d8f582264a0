//! Application layer: the use cases built on the category framework.
//!
//! # What does the client do with its categories?
//!
//! - **`handshake`** – Sends the INIT request, checks every echoed category
//!   version, and decides which categories this connection installs.
//!
//! - **`router`** – The inbound sink handed to the transport.  Routes each
//!   envelope to its installed category and relays transport faults.
//!
//! - **`aggregator`** – The central event queue.  Categories enqueue from the
//!   receive thread; the host drains it once per tick without ever blocking.
//!
//! - **`resources`** – The device/group ownership state machine and the
//!   connected-device cache.
//!
//! - **`panel`** – The pure automaton deciding when a button panel is
//!   registered (owned *and* window visible).
//!
//! - **`client`** – `CabinetClient`, which wires all of the above together
//!   and owns the connect / update / disconnect lifecycle.

pub mod aggregator;
pub mod client;
pub mod handshake;
pub mod panel;
pub mod resources;
pub mod router;
