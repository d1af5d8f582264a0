//! ResourceManager: the device and group ownership state machine.
//!
//! # Per-device status
//!
//! ```text
//!                acquire: Success
//!   NotInUse ──────────────────────────► Acquired
//!      │  ▲                                 │
//!      │  └──── release / Released event ───┘
//!      │           / Removed event
//!      │ acquire: Queued               ▲
//!      ▼                               │ Acquired event
//!   Requested ─────────────────────────┘
//! ```
//!
//! Groups follow the same three states, keyed by (device, group) and
//! independent of the parent's own status.  A removed device loses its
//! groups too.
//!
//! # One ledger, one lock
//!
//! Device status, group status and the connected-device cache live in one
//! [`ResourceLedger`] behind a single mutex, so an event and a reply racing
//! each other are applied in one consistent order.  The lock is never held
//! across a network round trip.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use cablink_core::protocol::{ConnectedDevice, GroupsReply, ResourceErrorCode, ResourceEvent};
use cablink_core::{DeviceKey, DeviceRef, GroupId, Priority, ResourceStatus};
use tracing::{debug, info, warn};

use crate::categories::ResourceCategory;
use crate::category::{Category, ErrorPolicy, ResourceError, Screened, Subscribers};
use crate::fault::lock;

/// Direction of an ownership change reported to host subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipChange {
    Acquired,
    Released,
}

/// Forwarded to host subscribers when the manager grants or takes back a
/// device (empty `groups`) or some of its groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipNotice {
    pub device: DeviceKey,
    pub groups: Vec<GroupId>,
    pub change: OwnershipChange,
}

#[derive(Debug, Default)]
struct DeviceEntry {
    status: ResourceStatus,
    groups: HashMap<GroupId, ResourceStatus>,
}

impl DeviceEntry {
    fn holds_anything(&self) -> bool {
        self.status != ResourceStatus::NotInUse
            || self.groups.values().any(|s| *s != ResourceStatus::NotInUse)
    }
}

#[derive(Debug, Default)]
struct ResourceLedger {
    devices: HashMap<DeviceKey, DeviceEntry>,
    connected: Option<Vec<ConnectedDevice>>,
    /// Bumped on every invalidation, so a query that raced an event does not
    /// store a stale snapshot.
    cache_epoch: u64,
}

impl ResourceLedger {
    fn device_mut(&mut self, key: DeviceKey) -> &mut DeviceEntry {
        self.devices.entry(key).or_default()
    }

    fn invalidate_cache(&mut self) {
        self.connected = None;
        self.cache_epoch += 1;
    }
}

pub struct ResourceManager {
    category: Arc<ResourceCategory>,
    policy: ErrorPolicy,
    ledger: Mutex<ResourceLedger>,
    notices: Subscribers<OwnershipNotice>,
}

impl ResourceManager {
    pub fn new(category: Arc<ResourceCategory>, policy: ErrorPolicy) -> Self {
        Self {
            category,
            policy,
            ledger: Mutex::new(ResourceLedger::default()),
            notices: Subscribers::new(),
        }
    }

    /// Ownership changes announced by the manager, after the ledger is updated.
    pub fn notices(&self) -> &Subscribers<OwnershipNotice> {
        &self.notices
    }

    // ── Devices ──────────────────────────────────────────────────────────────

    /// Asks for exclusive use of a device.
    ///
    /// Returns the resulting status: `Acquired`, or `Requested` (queued
    /// behind another owner).  A refusal suppressed by policy leaves the
    /// local status as it was and returns it.  A device already `Requested`
    /// answers `Requested` again without a round trip.
    ///
    /// # Errors
    ///
    /// [`ResourceError::Remote`] for an escalated refusal, or a
    /// [`ResourceError::Category`] for transport and protocol failures.
    pub fn acquire_device(
        &self,
        device: DeviceRef,
        priority: Priority,
    ) -> Result<ResourceStatus, ResourceError> {
        let key = DeviceKey::from(device);
        if self.device_status(key) == ResourceStatus::Requested {
            debug!("{key} already requested; not asking again");
            return Ok(ResourceStatus::Requested);
        }

        let reply = self.category.acquire_device(key, priority)?;
        let status = match reply.code {
            ResourceErrorCode::Success => ResourceStatus::Acquired,
            ResourceErrorCode::Queued => ResourceStatus::Requested,
            code => {
                self.screen(code, &reply.description)?;
                let unchanged = self.device_status(key);
                debug!("acquire {key} refused with {code:?}; still {unchanged:?}");
                return Ok(unchanged);
            }
        };
        info!("acquire {key}: {status:?}");
        lock(&self.ledger).device_mut(key).status = status;
        Ok(status)
    }

    /// Gives a device back.  On success, or on a suppressed refusal, the
    /// device and all its groups become `NotInUse`.
    ///
    /// # Errors
    ///
    /// As for [`acquire_device`](Self::acquire_device).
    pub fn release_device(&self, device: DeviceRef) -> Result<(), ResourceError> {
        let key = DeviceKey::from(device);
        let reply = self.category.release_device(key)?;
        self.screen(reply.code, &reply.description)?;
        info!("released {key}");
        lock(&self.ledger).devices.remove(&key);
        Ok(())
    }

    /// Local view of a device's status; unknown devices are `NotInUse`.
    pub fn device_status(&self, device: impl Into<DeviceKey>) -> ResourceStatus {
        let key = device.into();
        lock(&self.ledger)
            .devices
            .get(&key)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    // ── Groups ───────────────────────────────────────────────────────────────

    /// Asks for some groups of a device.  The result may be mixed; the
    /// per-group outcome map is returned as the manager reported it.
    ///
    /// Groups already `Requested` are answered `Queued` locally and left out
    /// of the request; when nothing is left, no request is sent.
    ///
    /// # Errors
    ///
    /// [`ResourceError::Remote`] when the overall code is escalated by
    /// policy, or a [`ResourceError::Category`].
    pub fn acquire_groups(
        &self,
        device: DeviceRef,
        groups: &[GroupId],
        priority: Priority,
    ) -> Result<BTreeMap<GroupId, ResourceErrorCode>, ResourceError> {
        let key = DeviceKey::from(device);
        let mut outcome = BTreeMap::new();
        let mut to_send = Vec::with_capacity(groups.len());
        for &group in groups {
            if self.group_status(key, group) == ResourceStatus::Requested {
                outcome.insert(group, ResourceErrorCode::Queued);
            } else if !to_send.contains(&group) {
                to_send.push(group);
            }
        }
        if to_send.is_empty() {
            debug!("{key}: every group already requested");
            return Ok(outcome);
        }

        let reply = self.category.acquire_groups(key, to_send, priority)?;
        self.screen_groups(&reply)?;

        let mut ledger = lock(&self.ledger);
        let entry = ledger.device_mut(key);
        for result in &reply.results {
            let status = match result.code {
                ResourceErrorCode::Success => ResourceStatus::Acquired,
                ResourceErrorCode::Queued => ResourceStatus::Requested,
                _ => ResourceStatus::NotInUse,
            };
            entry.groups.insert(result.group, status);
            outcome.insert(result.group, result.code);
        }
        debug!("acquire groups on {key}: {outcome:?}");
        Ok(outcome)
    }

    /// Gives groups back.  Each group reported as released (or refused with a
    /// suppressed code) becomes `NotInUse`.
    ///
    /// # Errors
    ///
    /// As for [`acquire_groups`](Self::acquire_groups).
    pub fn release_groups(
        &self,
        device: DeviceRef,
        groups: &[GroupId],
    ) -> Result<BTreeMap<GroupId, ResourceErrorCode>, ResourceError> {
        let key = DeviceKey::from(device);
        let reply = self.category.release_groups(key, groups.to_vec())?;
        self.screen_groups(&reply)?;

        let mut ledger = lock(&self.ledger);
        let entry = ledger.device_mut(key);
        let mut outcome = BTreeMap::new();
        for result in &reply.results {
            if result.code == ResourceErrorCode::Success || self.policy.suppresses(result.code) {
                entry.groups.remove(&result.group);
            }
            outcome.insert(result.group, result.code);
        }
        Ok(outcome)
    }

    /// Local view of one group's status; unknown groups are `NotInUse`.
    pub fn group_status(&self, device: impl Into<DeviceKey>, group: GroupId) -> ResourceStatus {
        let key = device.into();
        lock(&self.ledger)
            .devices
            .get(&key)
            .and_then(|entry| entry.groups.get(&group).copied())
            .unwrap_or_default()
    }

    // ── Connected devices ────────────────────────────────────────────────────

    /// Connected devices and their groups.
    ///
    /// Served from the cache while it holds a non-empty snapshot; otherwise
    /// one query is sent and its answer becomes the new snapshot.  Hot-plug
    /// events invalidate the cache.
    ///
    /// # Errors
    ///
    /// A [`ResourceError::Category`] if the query fails.
    pub fn get_connected_devices_with_groups(
        &self,
    ) -> Result<Vec<ConnectedDevice>, ResourceError> {
        let epoch = {
            let ledger = lock(&self.ledger);
            if let Some(devices) = ledger.connected.as_ref().filter(|d| !d.is_empty()) {
                return Ok(devices.clone());
            }
            ledger.cache_epoch
        };

        let devices = self.category.connected_devices()?;
        let mut ledger = lock(&self.ledger);
        if ledger.cache_epoch == epoch {
            ledger.connected = Some(devices.clone());
        } else {
            debug!("connected-device snapshot invalidated while in flight; not cached");
        }
        Ok(devices)
    }

    // ── Reconciliation ───────────────────────────────────────────────────────

    /// Applies an ownership or hot-plug event to the ledger.
    ///
    /// Acquired/released events are forwarded to [`notices`](Self::notices)
    /// subscribers and returned.
    pub fn reconcile(&self, event: &ResourceEvent) -> Option<OwnershipNotice> {
        let notice = {
            let mut ledger = lock(&self.ledger);
            match event {
                ResourceEvent::DeviceAcquired { device, groups } => {
                    Some(apply_ownership(&mut ledger, *device, groups, OwnershipChange::Acquired))
                }
                ResourceEvent::DeviceReleased { device, groups } => {
                    Some(apply_ownership(&mut ledger, *device, groups, OwnershipChange::Released))
                }
                ResourceEvent::DeviceConnected { device } => {
                    debug!("{} connected; cache invalidated", DeviceKey::from(*device));
                    ledger.invalidate_cache();
                    None
                }
                ResourceEvent::DeviceRemoved { device } => {
                    let key = DeviceKey::from(*device);
                    if ledger.devices.remove(&key).is_some_and(|e| e.holds_anything()) {
                        warn!("{key} removed while held");
                    }
                    ledger.invalidate_cache();
                    None
                }
            }
        };

        if let Some(notice) = &notice {
            self.notices.publish(notice);
        }
        notice
    }

    /// Forgets every device and group and invalidates the cache.  Ownership
    /// is never assumed to survive a reconnect.
    pub fn reset_all_devices(&self) {
        let mut ledger = lock(&self.ledger);
        ledger.devices.clear();
        ledger.invalidate_cache();
    }

    /// Releases, on the manager, everything this client holds or waits for:
    /// the held groups of each device with `ReleaseGroups`, then the device
    /// itself with `ReleaseDevice` when its own status is not `NotInUse`.
    /// Failures are logged, never raised.  Returns how many release requests
    /// succeeded.
    pub fn release_all_devices(&self) -> usize {
        let held: Vec<(DeviceKey, bool, Vec<GroupId>)> = lock(&self.ledger)
            .devices
            .iter()
            .filter(|(_, entry)| entry.holds_anything())
            .map(|(key, entry)| {
                let mut groups: Vec<GroupId> = entry
                    .groups
                    .iter()
                    .filter(|(_, status)| **status != ResourceStatus::NotInUse)
                    .map(|(group, _)| *group)
                    .collect();
                groups.sort_unstable();
                (*key, entry.status != ResourceStatus::NotInUse, groups)
            })
            .collect();

        let mut released = 0;
        for (key, device_held, groups) in held {
            let device = key.to_ref(true);
            if !groups.is_empty() {
                match self.release_groups(device, &groups) {
                    Ok(_) => released += 1,
                    Err(e) => warn!("release of {key} groups {groups:?} during teardown failed: {e}"),
                }
            }
            if device_held {
                match self.release_device(device) {
                    Ok(()) => released += 1,
                    Err(e) => warn!("release of {key} during teardown failed: {e}"),
                }
            }
        }
        released
    }

    fn screen(&self, code: ResourceErrorCode, description: &str) -> Result<Screened, ResourceError> {
        self.policy.screen(self.category.descriptor().id, code, description)
    }

    fn screen_groups(&self, reply: &GroupsReply) -> Result<(), ResourceError> {
        if reply.code != ResourceErrorCode::Queued {
            self.screen(reply.code, &reply.description)?;
        }
        Ok(())
    }
}

fn apply_ownership(
    ledger: &mut ResourceLedger,
    device: DeviceRef,
    groups: &[GroupId],
    change: OwnershipChange,
) -> OwnershipNotice {
    let key = DeviceKey::from(device);
    let status = match change {
        OwnershipChange::Acquired => ResourceStatus::Acquired,
        OwnershipChange::Released => ResourceStatus::NotInUse,
    };
    let entry = ledger.device_mut(key);
    if groups.is_empty() {
        entry.status = status;
    } else {
        for group in groups {
            entry.groups.insert(*group, status);
        }
    }
    debug!("{key} {change:?} (groups {groups:?})");
    OwnershipNotice {
        device: key,
        groups: groups.to_vec(),
        change,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultMonitor;
    use crate::transport::MockTransport;
    use cablink_core::protocol::{
        decode_body, encode_body, GroupResult, ResourceReply, ResourceRequest, ResourceResponse,
    };
    use cablink_core::{DeviceType, Envelope, PlatformTarget};

    fn reel(id: u32) -> DeviceRef {
        DeviceRef::new(DeviceType::ReelShelf, Some(id))
    }

    fn reply(code: ResourceErrorCode) -> ResourceReply {
        ResourceReply {
            code,
            description: format!("{code:?}"),
        }
    }

    /// A manager whose answers come from `answer`, wired through a mock that
    /// also asserts how many requests go out.
    fn manager_with(
        expected_requests: usize,
        answer: impl Fn(ResourceRequest) -> ResourceResponse + Send + 'static,
    ) -> ResourceManager {
        let category = Arc::new(ResourceCategory::new(PlatformTarget::Standard));
        let responder = Arc::clone(&category);
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(expected_requests)
            .returning(move |env: Envelope| {
                let request: ResourceRequest = decode_body(env.category, &env.body).unwrap();
                let body = encode_body(&answer(request)).unwrap();
                responder.handle_response(env.request_id, &body).unwrap();
                Ok(())
            });
        category.link().attach(Arc::new(transport), FaultMonitor::new());
        ResourceManager::new(category, ErrorPolicy::resource_management_default())
    }

    #[test]
    fn test_second_acquire_while_requested_has_no_round_trip() {
        // Arrange – exactly one request may reach the manager
        let manager = manager_with(1, |_| {
            ResourceResponse::AcquireDevice(reply(ResourceErrorCode::Queued))
        });

        // Act
        let first = manager.acquire_device(reel(1), Priority::Medium);
        let second = manager.acquire_device(reel(1), Priority::Medium);

        // Assert
        assert_eq!(first, Ok(ResourceStatus::Requested));
        assert_eq!(second, Ok(ResourceStatus::Requested));
    }

    #[test]
    fn test_acquire_success_marks_acquired() {
        let manager = manager_with(1, |_| {
            ResourceResponse::AcquireDevice(reply(ResourceErrorCode::Success))
        });

        assert_eq!(
            manager.acquire_device(reel(2), Priority::High),
            Ok(ResourceStatus::Acquired)
        );
        assert_eq!(manager.device_status(reel(2)), ResourceStatus::Acquired);
    }

    #[test]
    fn test_escalated_refusal_keeps_not_in_use() {
        let manager = manager_with(1, |_| {
            ResourceResponse::AcquireDevice(reply(ResourceErrorCode::Denied))
        });

        let result = manager.acquire_device(reel(3), Priority::Low);

        assert!(matches!(
            result,
            Err(ResourceError::Remote {
                code: ResourceErrorCode::Denied,
                ..
            })
        ));
        assert_eq!(manager.device_status(reel(3)), ResourceStatus::NotInUse);
    }

    #[test]
    fn test_release_of_unowned_device_is_suppressed() {
        let manager = manager_with(1, |_| {
            ResourceResponse::ReleaseDevice(reply(ResourceErrorCode::ClientDoesNotOwnResource))
        });

        assert_eq!(manager.release_device(reel(4)), Ok(()));
    }

    #[test]
    fn test_acquire_groups_returns_mixed_map_and_skips_requested_groups() {
        // Arrange – group 1 acquired, group 2 queued on the first call
        let manager = manager_with(2, |request| match request {
            ResourceRequest::AcquireGroups { groups, .. } => {
                ResourceResponse::AcquireGroups(GroupsReply {
                    code: ResourceErrorCode::Success,
                    description: String::new(),
                    results: groups
                        .into_iter()
                        .map(|group| GroupResult {
                            group,
                            code: if group == GroupId(2) {
                                ResourceErrorCode::Queued
                            } else {
                                ResourceErrorCode::Success
                            },
                        })
                        .collect(),
                })
            }
            other => panic!("unexpected {other:?}"),
        });

        // Act
        let first = manager
            .acquire_groups(reel(1), &[GroupId(1), GroupId(2)], Priority::Medium)
            .expect("first");
        let second = manager
            .acquire_groups(reel(1), &[GroupId(2), GroupId(3)], Priority::Medium)
            .expect("second");

        // Assert
        assert_eq!(
            first,
            BTreeMap::from([
                (GroupId(1), ResourceErrorCode::Success),
                (GroupId(2), ResourceErrorCode::Queued),
            ])
        );
        assert_eq!(
            second,
            BTreeMap::from([
                (GroupId(2), ResourceErrorCode::Queued),
                (GroupId(3), ResourceErrorCode::Success),
            ])
        );
        assert_eq!(manager.group_status(reel(1), GroupId(1)), ResourceStatus::Acquired);
        assert_eq!(
            manager.device_status(reel(1)),
            ResourceStatus::NotInUse,
            "group status is independent of the device"
        );
    }

    #[test]
    fn test_only_requested_groups_sends_nothing() {
        let manager = manager_with(0, |_| unreachable!());
        {
            let mut ledger = lock(&manager.ledger);
            ledger
                .device_mut(DeviceKey::from(reel(1)))
                .groups
                .insert(GroupId(5), ResourceStatus::Requested);
        }

        let outcome = manager
            .acquire_groups(reel(1), &[GroupId(5)], Priority::Medium)
            .expect("local answer");

        assert_eq!(outcome, BTreeMap::from([(GroupId(5), ResourceErrorCode::Queued)]));
    }

    #[test]
    fn test_removed_device_drops_status_and_groups() {
        // Arrange
        let manager = manager_with(0, |_| unreachable!());
        manager.reconcile(&ResourceEvent::DeviceAcquired {
            device: reel(7),
            groups: vec![],
        });
        manager.reconcile(&ResourceEvent::DeviceAcquired {
            device: reel(7),
            groups: vec![GroupId(1), GroupId(2)],
        });

        // Act
        manager.reconcile(&ResourceEvent::DeviceRemoved { device: reel(7) });

        // Assert
        assert_eq!(manager.device_status(reel(7)), ResourceStatus::NotInUse);
        assert_eq!(manager.group_status(reel(7), GroupId(1)), ResourceStatus::NotInUse);
        assert_eq!(manager.group_status(reel(7), GroupId(2)), ResourceStatus::NotInUse);
    }

    #[test]
    fn test_group_event_leaves_device_status_alone() {
        let manager = manager_with(0, |_| unreachable!());
        manager.reconcile(&ResourceEvent::DeviceAcquired {
            device: reel(8),
            groups: vec![],
        });

        manager.reconcile(&ResourceEvent::DeviceReleased {
            device: reel(8),
            groups: vec![GroupId(4)],
        });

        assert_eq!(manager.device_status(reel(8)), ResourceStatus::Acquired);
    }

    #[test]
    fn test_notices_are_forwarded_to_subscribers() {
        let manager = manager_with(0, |_| unreachable!());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager
            .notices()
            .subscribe(move |n: &OwnershipNotice| sink.lock().unwrap().push(n.change));

        manager.reconcile(&ResourceEvent::DeviceAcquired {
            device: reel(1),
            groups: vec![],
        });
        manager.reconcile(&ResourceEvent::DeviceConnected { device: reel(2) });
        manager.reconcile(&ResourceEvent::DeviceReleased {
            device: reel(1),
            groups: vec![],
        });

        assert_eq!(
            *seen.lock().unwrap(),
            vec![OwnershipChange::Acquired, OwnershipChange::Released]
        );
    }

    #[test]
    fn test_connected_devices_are_cached_until_hot_plug() {
        // Arrange – two queries in total: initial fill, refill after the event
        let manager = manager_with(2, |_| {
            ResourceResponse::ConnectedDevices(vec![ConnectedDevice {
                device: DeviceRef::new(DeviceType::ButtonPanel, Some(1)),
                groups: vec![GroupId(0)],
            }])
        });

        // Act
        let first = manager.get_connected_devices_with_groups().expect("first");
        let cached = manager.get_connected_devices_with_groups().expect("cached");
        manager.reconcile(&ResourceEvent::DeviceRemoved { device: reel(9) });
        let refreshed = manager.get_connected_devices_with_groups().expect("refreshed");

        // Assert
        assert_eq!(first, cached);
        assert_eq!(first, refreshed);
    }

    #[test]
    fn test_reset_all_devices_forgets_everything() {
        let manager = manager_with(0, |_| unreachable!());
        manager.reconcile(&ResourceEvent::DeviceAcquired {
            device: reel(1),
            groups: vec![GroupId(1)],
        });

        manager.reset_all_devices();

        assert_eq!(manager.group_status(reel(1), GroupId(1)), ResourceStatus::NotInUse);
        assert_eq!(manager.release_all_devices(), 0);
    }

    #[test]
    fn test_release_all_devices_releases_only_held_devices() {
        // Arrange – one acquired, one known but released
        let manager = manager_with(1, |request| match request {
            ResourceRequest::ReleaseDevice { device } => {
                assert_eq!(device, reel(1));
                ResourceResponse::ReleaseDevice(reply(ResourceErrorCode::Success))
            }
            other => panic!("unexpected {other:?}"),
        });
        manager.reconcile(&ResourceEvent::DeviceAcquired {
            device: reel(1),
            groups: vec![],
        });
        manager.reconcile(&ResourceEvent::DeviceReleased {
            device: reel(2),
            groups: vec![],
        });

        // Act
        let released = manager.release_all_devices();

        // Assert
        assert_eq!(released, 1);
        assert_eq!(manager.device_status(reel(1)), ResourceStatus::NotInUse);
    }

    #[test]
    fn test_release_all_devices_releases_groups_held_without_the_device() {
        // Arrange – groups 1 and 2 held, the device itself never acquired
        let sent = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&sent);
        let manager = manager_with(1, move |request| {
            log.lock().unwrap().push(request.clone());
            match request {
                ResourceRequest::ReleaseGroups { groups, .. } => {
                    ResourceResponse::ReleaseGroups(GroupsReply {
                        code: ResourceErrorCode::Success,
                        description: String::new(),
                        results: groups
                            .into_iter()
                            .map(|group| GroupResult {
                                group,
                                code: ResourceErrorCode::Success,
                            })
                            .collect(),
                    })
                }
                other => panic!("unexpected {other:?}"),
            }
        });
        manager.reconcile(&ResourceEvent::DeviceAcquired {
            device: reel(1),
            groups: vec![GroupId(2), GroupId(1)],
        });

        // Act
        let released = manager.release_all_devices();

        // Assert
        assert_eq!(released, 1);
        let sent = sent.lock().unwrap();
        assert!(
            matches!(
                sent.as_slice(),
                [ResourceRequest::ReleaseGroups { device, groups }]
                    if *device == reel(1) && *groups == vec![GroupId(1), GroupId(2)]
            ),
            "got {sent:?}"
        );
        assert_eq!(manager.group_status(reel(1), GroupId(1)), ResourceStatus::NotInUse);
        assert_eq!(manager.group_status(reel(1), GroupId(2)), ResourceStatus::NotInUse);
    }

    #[test]
    fn test_suppressed_acquire_refusal_keeps_existing_status() {
        // Arrange – the device is already ours through an event
        let manager = manager_with(1, |_| {
            ResourceResponse::AcquireDevice(reply(ResourceErrorCode::ClientDoesNotOwnResource))
        });
        manager.reconcile(&ResourceEvent::DeviceAcquired {
            device: reel(5),
            groups: vec![],
        });

        // Act
        let result = manager.acquire_device(reel(5), Priority::Medium);

        // Assert
        assert_eq!(result, Ok(ResourceStatus::Acquired));
        assert_eq!(manager.device_status(reel(5)), ResourceStatus::Acquired);
    }

    #[test]
    fn test_legacy_device_without_id_is_tracked_under_placeholder() {
        let manager = manager_with(0, |_| unreachable!());

        manager.reconcile(&ResourceEvent::DeviceAcquired {
            device: DeviceRef::new(DeviceType::SoundChannel, None),
            groups: vec![],
        });

        assert_eq!(
            manager.device_status(DeviceKey::normalize(
                DeviceType::SoundChannel,
                Some(cablink_core::PLACEHOLDER_DEVICE_ID)
            )),
            ResourceStatus::Acquired
        );
    }
}
