//! Read-only views of the storage topology
//!
//! The hotplug worker owns the live topology; these plain values are what it
//! hands across the bridge when asked for a snapshot.

use serde::{Deserialize, Serialize};
use uevent::{DevType, DeviceNumber};

/// A tracked physical medium (e.g. an SD card)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSnapshot {
    pub devpath: String,
    pub name: String,
    pub serial: String,
    /// Block devices currently attached, in device-number order
    pub block_devices: Vec<DeviceNumber>,
}

/// A tracked block device (disk or partition)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceSnapshot {
    pub devno: DeviceNumber,
    /// `None` while the record is a pending placeholder
    pub devpath: Option<String>,
    pub disk: Option<DeviceNumber>,
    pub media: String,
    pub devtype: DevType,
    pub pending: bool,
    /// Remove seen, waiting for the volume manager to release it
    pub eject_requested: bool,
}

/// Whole-topology snapshot plus mass-storage state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub media: Vec<MediaSnapshot>,
    pub block_devices: Vec<BlockDeviceSnapshot>,
    pub ums_host_connected: bool,
    pub ums_enabled: bool,
}

impl TopologySnapshot {
    pub fn media_at(&self, devpath: &str) -> Option<&MediaSnapshot> {
        self.media.iter().find(|m| m.devpath == devpath)
    }

    pub fn block_device(&self, devno: DeviceNumber) -> Option<&BlockDeviceSnapshot> {
        self.block_devices.iter().find(|b| b.devno == devno)
    }
}
