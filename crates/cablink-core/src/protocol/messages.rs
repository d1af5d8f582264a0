//! Message families, one closed set per category.
//!
//! Each category owns three enums: what the client may ask (`*Request`), what
//! the manager answers (`*Response`), and what the manager pushes on its own
//! (`*Event`).  Bodies on the wire are `bincode` encodings of these enums, so a
//! category dispatches with an exhaustive `match` and an unknown variant can
//! only show up as a decode failure.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::device::{DeviceRef, GroupId, Priority};
use crate::domain::version::CategoryDescriptor;

/// Names the concrete variant of a message, for `UnexpectedReplyType` errors
/// and logs.
pub trait MessageName {
    fn variant_name(&self) -> &'static str;
}

// ── Connection (category 0) ───────────────────────────────────────────────────

/// Role of the connecting process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClientType {
    /// The game's presentation process.
    #[default]
    Presentation,
    /// Service/diagnostic tooling.
    Diagnostics,
}

/// Result code of the connection handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionErrorCode {
    Success,
    InvalidToken,
    UnsupportedClientType,
    ManagerBusy,
    Internal,
}

/// INIT request: the client's token, role, and wish list of categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    pub client_token: Uuid,
    pub client_type: ClientType,
    pub categories: Vec<CategoryDescriptor>,
}

/// INIT response: the manager's verdict and the categories it supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResponse {
    pub error_code: ConnectionErrorCode,
    pub description: String,
    pub categories: Vec<CategoryDescriptor>,
}

/// One-way notice that the sender is going away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownNotice {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionRequest {
    Init(InitRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionResponse {
    Init(InitResponse),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    Shutdown(ShutdownNotice),
}

impl MessageName for ConnectionResponse {
    fn variant_name(&self) -> &'static str {
        match self {
            ConnectionResponse::Init(_) => "Init",
        }
    }
}

// ── Resource management (category 1) ─────────────────────────────────────────

/// Business-level result code for device and group operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceErrorCode {
    Success,
    /// The device is owned by someone else; the client is queued for it.
    Queued,
    ClientDoesNotOwnResource,
    DeviceNotConnected,
    InvalidDevice,
    /// Transient driver hiccup.
    DriverBusy,
    Denied,
    Internal,
}

/// Result of a single-device operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReply {
    pub code: ResourceErrorCode,
    pub description: String,
}

/// Per-group outcome inside a [`GroupsReply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResult {
    pub group: GroupId,
    pub code: ResourceErrorCode,
}

/// Result of a multi-group operation; may be mixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupsReply {
    pub code: ResourceErrorCode,
    pub description: String,
    pub results: Vec<GroupResult>,
}

/// A connected device and the groups it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedDevice {
    pub device: DeviceRef,
    pub groups: Vec<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceRequest {
    AcquireDevice {
        device: DeviceRef,
        priority: Priority,
    },
    ReleaseDevice {
        device: DeviceRef,
    },
    AcquireGroups {
        device: DeviceRef,
        groups: Vec<GroupId>,
        priority: Priority,
    },
    ReleaseGroups {
        device: DeviceRef,
        groups: Vec<GroupId>,
    },
    GetConnectedDevicesWithGroups,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceResponse {
    AcquireDevice(ResourceReply),
    ReleaseDevice(ResourceReply),
    AcquireGroups(GroupsReply),
    ReleaseGroups(GroupsReply),
    ConnectedDevices(Vec<ConnectedDevice>),
}

impl MessageName for ResourceResponse {
    fn variant_name(&self) -> &'static str {
        match self {
            ResourceResponse::AcquireDevice(_) => "AcquireDevice",
            ResourceResponse::ReleaseDevice(_) => "ReleaseDevice",
            ResourceResponse::AcquireGroups(_) => "AcquireGroups",
            ResourceResponse::ReleaseGroups(_) => "ReleaseGroups",
            ResourceResponse::ConnectedDevices(_) => "ConnectedDevices",
        }
    }
}

/// Ownership and hot-plug notifications.
///
/// A non-empty `groups` list narrows an acquired/released event to those
/// groups only; the device's own status is then left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceEvent {
    DeviceAcquired {
        device: DeviceRef,
        groups: Vec<GroupId>,
    },
    DeviceReleased {
        device: DeviceRef,
        groups: Vec<GroupId>,
    },
    DeviceConnected {
        device: DeviceRef,
    },
    DeviceRemoved {
        device: DeviceRef,
    },
}

impl MessageName for ResourceEvent {
    fn variant_name(&self) -> &'static str {
        match self {
            ResourceEvent::DeviceAcquired { .. } => "DeviceAcquired",
            ResourceEvent::DeviceReleased { .. } => "DeviceReleased",
            ResourceEvent::DeviceConnected { .. } => "DeviceConnected",
            ResourceEvent::DeviceRemoved { .. } => "DeviceRemoved",
        }
    }
}

// ── Button panel (category 2) ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonPanelRequest {
    RegisterPanel { panel_id: u32 },
    UnregisterPanel { panel_id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonPanelResponse {
    RegisterPanel(ResourceReply),
    UnregisterPanel(ResourceReply),
}

impl MessageName for ButtonPanelResponse {
    fn variant_name(&self) -> &'static str {
        match self {
            ButtonPanelResponse::RegisterPanel(_) => "RegisterPanel",
            ButtonPanelResponse::UnregisterPanel(_) => "UnregisterPanel",
        }
    }
}

/// Live button input from a registered panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonPanelEvent {
    ButtonPressed { panel_id: u32, button_id: u16 },
    ButtonReleased { panel_id: u32, button_id: u16 },
}

// ── Window control (category 3) ───────────────────────────────────────────────

/// Visibility of one window in a multi-window presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowVisibility {
    pub window_id: u32,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowRequest {
    GetVisibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowResponse {
    Visibility { visible: bool },
}

impl MessageName for WindowResponse {
    fn variant_name(&self) -> &'static str {
        match self {
            WindowResponse::Visibility { .. } => "Visibility",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowEvent {
    VisibilityChanged { visible: bool },
    MultiWindowVisibilityChanged { windows: Vec<WindowVisibility> },
}

impl WindowEvent {
    /// Collapses either form to "is any of our windows visible".
    pub fn any_visible(&self) -> bool {
        match self {
            WindowEvent::VisibilityChanged { visible } => *visible,
            WindowEvent::MultiWindowVisibilityChanged { windows } => {
                windows.iter().any(|w| w.visible)
            }
        }
    }
}
