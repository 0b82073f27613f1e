//! Block device records
//!
//! Each record tracks one kernel block device (disk or partition) by device
//! number. Partition records may exist before the kernel reports them: the
//! volume manager pre-creates them as *pending* once it knows the partition
//! table, and the kernel add event later resolves them.
//!
//! Removal is two-phase. A remove event only moves the record to
//! [`EjectState::EjectRequested`]; the record is dropped from the registry
//! when the volume manager confirms the eject.

use super::{Result, TopologyError};
use std::collections::BTreeMap;
use uevent::{DevType, DeviceNumber};

/// Where a record stands in the two-phase destroy protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EjectState {
    Tracked,
    /// Remove seen, waiting on the volume manager
    EjectRequested,
}

/// A tracked block device
#[derive(Debug, Clone)]
pub struct BlockDevice {
    pub devno: DeviceNumber,
    /// Unset while the record is a pending placeholder
    pub devpath: Option<String>,
    /// Parent disk; `None` for disks
    pub disk: Option<DeviceNumber>,
    /// Device path of the backing media
    pub media: String,
    pub devtype: DevType,
    pending: bool,
    state: EjectState,
}

impl BlockDevice {
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn state(&self) -> EjectState {
        self.state
    }
}

/// Store of block device records keyed by device number
#[derive(Debug, Default)]
pub struct BlockDeviceRegistry {
    devices: BTreeMap<DeviceNumber, BlockDevice>,
}

impl BlockDeviceRegistry {
    pub fn lookup(&self, devno: DeviceNumber) -> Option<&BlockDevice> {
        self.devices.get(&devno)
    }

    /// Create a record for a device the kernel has just reported
    pub fn create(
        &mut self,
        disk: Option<DeviceNumber>,
        devpath: &str,
        devno: DeviceNumber,
        media: &str,
        devtype: DevType,
    ) -> Result<&BlockDevice> {
        self.insert(BlockDevice {
            devno,
            devpath: Some(devpath.to_string()),
            disk,
            media: media.to_string(),
            devtype,
            pending: false,
            state: EjectState::Tracked,
        })
    }

    /// Create a placeholder for a partition the kernel has not reported yet
    pub fn create_pending_partition(
        &mut self,
        disk: DeviceNumber,
        minor: u32,
    ) -> Result<&BlockDevice> {
        let devno = DeviceNumber::new(disk.major, minor);
        if devno.is_disk() {
            return Err(TopologyError::NotAPartition(devno));
        }

        let media = self
            .devices
            .get(&disk)
            .filter(|d| d.devtype == DevType::Disk)
            .map(|d| d.media.clone())
            .ok_or(TopologyError::DiskNotFound(disk))?;

        self.insert(BlockDevice {
            devno,
            devpath: None,
            disk: Some(disk),
            media,
            devtype: DevType::Partition,
            pending: true,
            state: EjectState::Tracked,
        })
    }

    fn insert(&mut self, device: BlockDevice) -> Result<&BlockDevice> {
        let devno = device.devno;
        if self.devices.contains_key(&devno) {
            return Err(TopologyError::BlockDeviceExists(devno));
        }
        Ok(self.devices.entry(devno).or_insert(device))
    }

    /// Record the kernel device path
    ///
    /// Returns `true` if this resolved a pending placeholder. A resolved
    /// record never goes back to pending.
    pub fn set_devpath(&mut self, devno: DeviceNumber, devpath: &str) -> Result<bool> {
        let device = self
            .devices
            .get_mut(&devno)
            .ok_or(TopologyError::BlockDeviceNotFound(devno))?;
        device.devpath = Some(devpath.to_string());
        Ok(std::mem::replace(&mut device.pending, false))
    }

    /// Partitions of `disk` still waiting for their kernel add event
    pub fn pending_partitions(&self, disk: DeviceNumber) -> usize {
        self.devices
            .values()
            .filter(|d| d.disk == Some(disk) && d.pending)
            .count()
    }

    /// Drop the placeholders of `disk` that never saw their kernel add
    ///
    /// Returns the device numbers removed.
    pub fn destroy_pending_partitions(&mut self, disk: DeviceNumber) -> Vec<DeviceNumber> {
        let mut removed = Vec::new();
        self.devices.retain(|devno, d| {
            let stale = d.disk == Some(disk) && d.pending;
            if stale {
                removed.push(*devno);
            }
            !stale
        });
        removed
    }

    /// Move a record to `EjectRequested`
    ///
    /// Returns `false` if an eject was already requested.
    pub fn request_eject(&mut self, devno: DeviceNumber) -> Result<bool> {
        self.set_state(devno, EjectState::EjectRequested)
    }

    /// Undo [`request_eject`](Self::request_eject) when the volume manager
    /// could not be notified
    pub fn cancel_eject(&mut self, devno: DeviceNumber) -> Result<bool> {
        self.set_state(devno, EjectState::Tracked)
    }

    fn set_state(&mut self, devno: DeviceNumber, state: EjectState) -> Result<bool> {
        let device = self
            .devices
            .get_mut(&devno)
            .ok_or(TopologyError::BlockDeviceNotFound(devno))?;
        Ok(std::mem::replace(&mut device.state, state) != state)
    }

    pub fn destroy(&mut self, devno: DeviceNumber) -> Result<BlockDevice> {
        self.devices
            .remove(&devno)
            .ok_or(TopologyError::BlockDeviceNotFound(devno))
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockDevice> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
