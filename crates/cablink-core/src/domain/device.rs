//! Device and group identity, plus the three-state ownership status.
//!
//! # Optional device ids
//!
//! On older protocol versions the manager does not send a device id at all
//! (there was only ever one device of each type).  On the wire this is a
//! [`DeviceRef`] with `device_id: None`.  Local bookkeeping needs a total key,
//! so [`DeviceKey::normalize`] substitutes [`PLACEHOLDER_DEVICE_ID`].  This is
//! a compatibility shim: normalization happens only at the state-machine
//! boundary and never leaks back onto the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Id substituted for a device whose id was not sent.
pub const PLACEHOLDER_DEVICE_ID: u32 = 0;

/// Kind of shared cabinet hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceType {
    ButtonPanel,
    ReelShelf,
    LightBezel,
    TopperDisplay,
    SoundChannel,
}

/// A device as named on the wire; the id may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRef {
    pub device_type: DeviceType,
    pub device_id: Option<u32>,
}

impl DeviceRef {
    pub fn new(device_type: DeviceType, device_id: Option<u32>) -> Self {
        Self {
            device_type,
            device_id,
        }
    }
}

/// A device identity usable as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub device_type: DeviceType,
    pub device_id: u32,
}

impl DeviceKey {
    /// Builds a key, substituting [`PLACEHOLDER_DEVICE_ID`] for a missing id.
    pub fn normalize(device_type: DeviceType, device_id: Option<u32>) -> Self {
        Self {
            device_type,
            device_id: device_id.unwrap_or(PLACEHOLDER_DEVICE_ID),
        }
    }

    /// Converts back to a wire reference.
    ///
    /// `include_id` is false on legacy category versions that do not carry ids.
    pub fn to_ref(self, include_id: bool) -> DeviceRef {
        DeviceRef {
            device_type: self.device_type,
            device_id: include_id.then_some(self.device_id),
        }
    }
}

impl From<DeviceRef> for DeviceKey {
    fn from(r: DeviceRef) -> Self {
        DeviceKey::normalize(r.device_type, r.device_id)
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.device_type, self.device_id)
    }
}

/// A sub-partition of a device that can be acquired on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Ownership status of a device or of one of its groups.
///
/// ```text
/// NotInUse ──acquire ok──► Acquired ──release / removed──► NotInUse
///    │                        ▲
///    └──acquire queued──► Requested ──DeviceAcquired event──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResourceStatus {
    #[default]
    NotInUse,
    Requested,
    Acquired,
}

/// Arbitration priority for an acquisition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_substitutes_placeholder_for_missing_id() {
        let key = DeviceKey::normalize(DeviceType::ReelShelf, None);
        assert_eq!(key.device_id, PLACEHOLDER_DEVICE_ID);
    }

    #[test]
    fn test_missing_and_placeholder_ids_map_to_the_same_key() {
        // Arrange
        let legacy = DeviceRef::new(DeviceType::ButtonPanel, None);
        let explicit = DeviceRef::new(DeviceType::ButtonPanel, Some(PLACEHOLDER_DEVICE_ID));

        // Assert
        assert_eq!(DeviceKey::from(legacy), DeviceKey::from(explicit));
    }

    #[test]
    fn test_to_ref_omits_id_for_legacy_versions() {
        let key = DeviceKey::normalize(DeviceType::LightBezel, Some(3));
        assert_eq!(key.to_ref(false).device_id, None);
        assert_eq!(key.to_ref(true).device_id, Some(3));
    }
}
