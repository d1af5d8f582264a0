//! cablink-client library entry point.
//!
//! The client side of the cabinet link: a game process talks to the cabinet
//! manager over one connection that carries several versioned message
//! *categories*.  This crate provides
//!
//! 1. the category framework (`category`, `categories`) with one blocking
//!    request slot per category;
//! 2. the connection handshake that negotiates which categories are used;
//! 3. the event aggregator that hands manager events to the host on its own
//!    tick;
//! 4. the device/group ownership ledger and the button-panel registration
//!    automaton built on top of those events.
//!
//! `CabinetClient` in `application::client` wires all of it together.

/// Application layer: handshake, routing, aggregation, and the client.
pub mod application;

/// Concrete categories spoken on the link.
pub mod categories;

/// The category trait and its building blocks.
pub mod category;

/// Fault propagation to blocked waiters.
pub mod fault;

/// Infrastructure layer: TCP transport, configuration, scripted manager.
pub mod infrastructure;

/// The transport contract.
pub mod transport;

pub use application::client::{CabinetClient, ClientError, ClientOptions};
