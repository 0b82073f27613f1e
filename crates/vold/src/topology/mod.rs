//! In-memory storage topology
//!
//! Media records and block device records, plus the cross-store operations
//! the hotplug handlers need. Nothing here talks to the kernel or the volume
//! manager; it is plain bookkeeping owned by the hotplug worker thread.

pub mod blockdev;
pub mod media;

pub use blockdev::{BlockDevice, BlockDeviceRegistry, EjectState};
pub use media::{Media, MediaKind, MediaRegistry};

use common::{BlockDeviceSnapshot, MediaSnapshot, TopologySnapshot};
use thiserror::Error;
use uevent::{DevType, DeviceNumber};

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Media already tracked at {0}")]
    MediaExists(String),

    #[error("No media tracked at {0}")]
    MediaNotFound(String),

    #[error("Block device {0} already exists")]
    BlockDeviceExists(DeviceNumber),

    #[error("Block device {0} not found")]
    BlockDeviceNotFound(DeviceNumber),

    #[error("Disk {0} not found")]
    DiskNotFound(DeviceNumber),

    #[error("{0} is a disk, not a partition")]
    NotAPartition(DeviceNumber),
}

pub type Result<T> = std::result::Result<T, TopologyError>;

#[derive(Debug, Default)]
pub struct Topology {
    pub media: MediaRegistry,
    pub block_devices: BlockDeviceRegistry,
}

impl Topology {
    /// Pre-create pending partitions `minors` of `disk`
    ///
    /// All-or-nothing: on error no placeholder from this call survives.
    pub fn create_pending_partitions(&mut self, disk: DeviceNumber, minors: &[u32]) -> Result<()> {
        let mut created = Vec::with_capacity(minors.len());
        for &minor in minors {
            match self.block_devices.create_pending_partition(disk, minor) {
                Ok(device) => created.push(device.devno),
                Err(e) => {
                    for devno in created {
                        let _ = self.block_devices.destroy(devno);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Detach a block device from its media (if still tracked) and drop it
    ///
    /// Destroying a disk also drops its partition placeholders that were
    /// never resolved; nothing else would ever remove them.
    pub fn destroy_block_device(&mut self, devno: DeviceNumber) -> Result<BlockDevice> {
        if let Some(devpath) = self.media.lookup_by_device(devno).map(|m| m.devpath.clone()) {
            self.media.detach(&devpath, devno)?;
        }
        let device = self.block_devices.destroy(devno)?;
        if device.devtype == DevType::Disk {
            self.block_devices.destroy_pending_partitions(devno);
        }
        Ok(device)
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            media: self
                .media
                .iter()
                .map(|m| MediaSnapshot {
                    devpath: m.devpath.clone(),
                    name: m.name.clone(),
                    serial: m.serial.clone(),
                    block_devices: m.block_devices().collect(),
                })
                .collect(),
            block_devices: self
                .block_devices
                .iter()
                .map(|b| BlockDeviceSnapshot {
                    devno: b.devno,
                    devpath: b.devpath.clone(),
                    disk: b.disk,
                    media: b.media.clone(),
                    devtype: b.devtype,
                    pending: b.is_pending(),
                    eject_requested: b.state() == EjectState::EjectRequested,
                })
                .collect(),
            ..TopologySnapshot::default()
        }
    }
}
