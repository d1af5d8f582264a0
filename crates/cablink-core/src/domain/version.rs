//! Category versions and the negotiation rule.
//!
//! # Compatibility rule
//!
//! A category requested at `major.minor` is compatible with the manager's
//! offer iff the majors are equal and the manager's minor is at least the
//! requested minor.  Minor versions only ever add messages, so a newer
//! manager can serve an older client, never the reverse.
//!
//! ```text
//! requested 1.2  offered 1.3  → ok
//! requested 1.2  offered 1.1  → mismatch (manager too old)
//! requested 2.0  offered 1.9  → mismatch (major differs)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::envelope::CategoryId;

/// A `major.minor` category version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryVersion {
    pub major: u16,
    pub minor: u16,
}

impl CategoryVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Returns `true` if `offered` can serve a client that asked for `self`.
    pub fn is_satisfied_by(&self, offered: &CategoryVersion) -> bool {
        self.major == offered.major && offered.minor >= self.minor
    }
}

impl fmt::Display for CategoryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A category identity as exchanged in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    pub id: CategoryId,
    pub version: CategoryVersion,
}

impl CategoryDescriptor {
    pub const fn new(id: CategoryId, major: u16, minor: u16) -> Self {
        Self {
            id,
            version: CategoryVersion::new(major, minor),
        }
    }
}

impl fmt::Display for CategoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.id, self.version)
    }
}

/// The platform ("foundation") target the client was built for.
///
/// Some categories advertise a different minor version per target; the
/// target itself is opaque to the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlatformTarget {
    /// Older cabinets; device ids are not carried on the wire.
    Legacy,
    #[default]
    Standard,
    Extended,
}

/// The manager offered an incompatible version of a requested category.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("version mismatch for {category}: requested v{requested}, manager offers v{offered}")]
pub struct VersionMismatch {
    pub category: CategoryId,
    pub requested: CategoryVersion,
    pub offered: CategoryVersion,
}

/// Checks a requested category against the manager's echo of it.
///
/// # Errors
///
/// Returns [`VersionMismatch`] naming both tuples when they are incompatible.
pub fn negotiate(
    requested: &CategoryDescriptor,
    offered: &CategoryDescriptor,
) -> Result<(), VersionMismatch> {
    if requested.version.is_satisfied_by(&offered.version) {
        Ok(())
    } else {
        Err(VersionMismatch {
            category: requested.id,
            requested: requested.version,
            offered: offered.version,
        })
    }
}
