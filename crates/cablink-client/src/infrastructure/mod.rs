//! Infrastructure layer: adapters around the framework.
//!
//! The application layer only knows the [`Transport`](crate::transport::Transport)
//! and [`InboundSink`](crate::transport::InboundSink) seams; everything that
//! touches sockets, files or a fake manager lives here.
//!
//! # Sub-modules
//!
//! - **`network`** – `TcpTransport`, a framed TCP link driven by its own
//!   receive thread.
//! - **`config`** – TOML configuration with per-field defaults.
//! - **`testing`** – `ScriptedManager`, an in-process manager for tests and
//!   local experiments.

pub mod config;
pub mod network;
pub mod testing;
