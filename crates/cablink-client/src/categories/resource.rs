//! Category 1: device and group ownership on the wire.
//!
//! This type only speaks the protocol.  The ownership ledger, the
//! short-circuits and the error policy live in
//! [`ResourceManager`](crate::application::resources::ResourceManager).
//!
//! # Device ids on legacy targets
//!
//! Minor version 0 predates per-unit device ids.  Outbound references then
//! omit the id (`DeviceKey::to_ref(false)`), and inbound ones are normalized
//! to `PLACEHOLDER_DEVICE_ID` by the ledger.

use cablink_core::protocol::{
    decode_body, ConnectedDevice, GroupsReply, ResourceEvent, ResourceReply, ResourceRequest,
    ResourceResponse,
};
use cablink_core::{
    CategoryDescriptor, CategoryId, DeviceKey, DeviceRef, GroupId, PlatformTarget, Priority,
};
use tracing::debug;

use crate::category::{Category, CategoryError, CategoryLink, Subscribers};

pub struct ResourceCategory {
    link: CategoryLink,
    target: PlatformTarget,
    events: Subscribers<ResourceEvent>,
}

impl ResourceCategory {
    pub fn new(target: PlatformTarget) -> Self {
        Self {
            link: CategoryLink::new(CategoryId::RESOURCE_MANAGEMENT),
            target,
            events: Subscribers::new(),
        }
    }

    /// Minor version asked for on `target`.
    pub fn minor_version(target: PlatformTarget) -> u16 {
        match target {
            PlatformTarget::Legacy => 0,
            PlatformTarget::Standard | PlatformTarget::Extended => 2,
        }
    }

    /// Whether device ids travel on the wire at this version.
    pub fn carries_device_id(&self) -> bool {
        Self::minor_version(self.target) > 0
    }

    /// Ownership and hot-plug events, published from the receive thread as
    /// they arrive.
    pub fn events(&self) -> &Subscribers<ResourceEvent> {
        &self.events
    }

    fn wire_ref(&self, device: DeviceKey) -> DeviceRef {
        device.to_ref(self.carries_device_id())
    }

    pub fn acquire_device(
        &self,
        device: DeviceKey,
        priority: Priority,
    ) -> Result<ResourceReply, CategoryError> {
        let request = ResourceRequest::AcquireDevice {
            device: self.wire_ref(device),
            priority,
        };
        match self.link.request(&request)? {
            ResourceResponse::AcquireDevice(reply) => Ok(reply),
            other => Err(self.unexpected("AcquireDevice", &other)),
        }
    }

    pub fn release_device(&self, device: DeviceKey) -> Result<ResourceReply, CategoryError> {
        let request = ResourceRequest::ReleaseDevice {
            device: self.wire_ref(device),
        };
        match self.link.request(&request)? {
            ResourceResponse::ReleaseDevice(reply) => Ok(reply),
            other => Err(self.unexpected("ReleaseDevice", &other)),
        }
    }

    pub fn acquire_groups(
        &self,
        device: DeviceKey,
        groups: Vec<GroupId>,
        priority: Priority,
    ) -> Result<GroupsReply, CategoryError> {
        let request = ResourceRequest::AcquireGroups {
            device: self.wire_ref(device),
            groups,
            priority,
        };
        match self.link.request(&request)? {
            ResourceResponse::AcquireGroups(reply) => Ok(reply),
            other => Err(self.unexpected("AcquireGroups", &other)),
        }
    }

    pub fn release_groups(
        &self,
        device: DeviceKey,
        groups: Vec<GroupId>,
    ) -> Result<GroupsReply, CategoryError> {
        let request = ResourceRequest::ReleaseGroups {
            device: self.wire_ref(device),
            groups,
        };
        match self.link.request(&request)? {
            ResourceResponse::ReleaseGroups(reply) => Ok(reply),
            other => Err(self.unexpected("ReleaseGroups", &other)),
        }
    }

    pub fn connected_devices(&self) -> Result<Vec<ConnectedDevice>, CategoryError> {
        match self
            .link
            .request(&ResourceRequest::GetConnectedDevicesWithGroups)?
        {
            ResourceResponse::ConnectedDevices(devices) => Ok(devices),
            other => Err(self.unexpected("ConnectedDevices", &other)),
        }
    }

    fn unexpected(&self, expected: &'static str, actual: &ResourceResponse) -> CategoryError {
        CategoryError::unexpected_reply(self.link.id(), expected, actual)
    }
}

impl Category for ResourceCategory {
    fn descriptor(&self) -> CategoryDescriptor {
        CategoryDescriptor::new(
            CategoryId::RESOURCE_MANAGEMENT,
            1,
            Self::minor_version(self.target),
        )
    }

    fn link(&self) -> &CategoryLink {
        &self.link
    }

    fn handle_event(&self, body: &[u8]) -> Result<(), CategoryError> {
        let event: ResourceEvent = decode_body(self.link.id(), body)?;
        if self.events.publish(&event) == 0 {
            debug!("resource event with no subscriber: {event:?}");
        }
        Ok(())
    }
}
