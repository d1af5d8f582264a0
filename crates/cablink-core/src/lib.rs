//! # cablink-core
//!
//! Shared library for the cabinet link containing the envelope codec, the
//! per-category message families, and the version/device domain types.
//!
//! It has no threads, sockets, or locks; everything here is plain data and
//! pure functions, used by `cablink-client` and by test doubles of the
//! hardware/services manager.
//!
//! # Architecture overview
//!
//! A game's presentation process talks to the cabinet's hardware/services
//! manager over a single persistent connection.  Functionality is split into
//! independently versioned *categories* (button panels, resource ownership,
//! window control, ...) multiplexed over that connection.
//!
//! - **`protocol`** – How bytes travel.  Every message is an `Envelope`
//!   (category id, request/response/event kind, request id, opaque body)
//!   framed behind a 12-byte header.  Bodies are `bincode` encodings of a
//!   category's closed message enums.
//!
//! - **`domain`** – Category versions and the negotiation rule, and device /
//!   group identity for the resource ownership state machine.

pub mod domain;
pub mod protocol;

pub use domain::device::{
    DeviceKey, DeviceRef, DeviceType, GroupId, Priority, ResourceStatus, PLACEHOLDER_DEVICE_ID,
};
pub use domain::version::{
    negotiate, CategoryDescriptor, CategoryVersion, PlatformTarget, VersionMismatch,
};
pub use protocol::codec::{decode_envelope, encode_envelope, ProtocolError};
pub use protocol::envelope::{CategoryId, Envelope, MessageKind};
