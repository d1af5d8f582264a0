//! Concrete categories.
//!
//! | Category | Id | Version |
//! |---|---|---|
//! | [`ConnectionCategory`] | 0 | 1.0, never negotiated |
//! | [`ResourceCategory`] | 1 | 1.0 on `Legacy`, else 1.2 |
//! | [`ButtonPanelCategory`] | 2 | 1.1 |
//! | [`WindowCategory`] | 3 | 1.0 on `Legacy`, else 1.1 |
//!
//! Each one is a thin typed facade over its [`CategoryLink`](crate::category::CategoryLink):
//! public operations build a request, block for the reply, and `match` the
//! reply variant; `handle_event` decodes the closed event enum and either
//! publishes it at once or buffers it for the host tick.

pub mod button_panel;
pub mod connection;
pub mod resource;
pub mod window;

pub use button_panel::ButtonPanelCategory;
pub use connection::ConnectionCategory;
pub use resource::ResourceCategory;
pub use window::WindowCategory;
