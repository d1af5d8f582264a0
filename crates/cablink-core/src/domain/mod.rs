//! Pure domain types with no I/O: category versions and device identity.
//!
//! - **`version`** – `CategoryVersion`, `CategoryDescriptor`, the platform
//!   target enum, and the `negotiate` compatibility rule used by the
//!   connection handshake.
//!
//! - **`device`** – device and group identity (`DeviceRef` as sent on the
//!   wire, `DeviceKey` as used for local bookkeeping) and the three-state
//!   `ResourceStatus`.

pub mod device;
pub mod version;
