//! `block` subsystem: disk and partition lifecycle
//!
//! Block devices are only tracked when they sit on a known media record.
//! Disks are handed to the volume manager once every partition the volume
//! manager expected has shown up. Removal goes through an eject ticket; the
//! record is freed only when the ticket's completion comes back through the
//! worker queue.

use super::{Hotplug, HotplugError, Result};
use crate::sysfs::AttributeReader;
use crate::topology::EjectState;
use crate::volmgr::{EjectTicket, VolumeManager};
use tracing::{debug, info, warn};
use uevent::{Action, DevType, DeviceNumber, Event, strip_components};

impl<V: VolumeManager, A: AttributeReader> Hotplug<V, A> {
    pub(super) fn handle_block(&mut self, event: &Event) -> Result<()> {
        let Some(devtype) = event.param("DEVTYPE") else {
            debug!("Ignoring block event without DEVTYPE for {}", event.path);
            return Ok(());
        };
        let devtype: DevType = devtype.parse().map_err(HotplugError::InvalidDevType)?;

        let Some(media_path) = strip_components(&event.path, devtype.media_depth()) else {
            debug!("{} is too shallow to sit on media", event.path);
            return Ok(());
        };
        let Some(media) = self.topology.media.lookup_by_path(media_path) else {
            debug!("No media for {} {}, ignoring", devtype, event.path);
            return Ok(());
        };
        let media_path = media.devpath.clone();

        let devno = event.device_number()?;

        match event.action {
            Action::Add => self.block_add(event, devno, devtype, &media_path),
            Action::Remove => self.block_remove(devno),
            Action::Change => {
                debug!("Block change on {} ({})", devno, event.path);
                Ok(())
            }
        }
    }

    fn block_add(
        &mut self,
        event: &Event,
        devno: DeviceNumber,
        devtype: DevType,
        media_path: &str,
    ) -> Result<()> {
        let disk = match devtype {
            DevType::Disk => None,
            DevType::Partition => {
                let disk = devno.disk();
                if self.topology.block_devices.lookup(disk).is_none() {
                    return Err(HotplugError::OrphanPartition(devno));
                }
                Some(disk)
            }
        };

        let (resolved, parent) = match self.topology.block_devices.lookup(devno) {
            Some(existing) if existing.state() == EjectState::EjectRequested => {
                return Err(HotplugError::EjectInProgress(devno));
            }
            Some(existing) => {
                let parent = existing.disk;
                let resolved = self.topology.block_devices.set_devpath(devno, &event.path)?;
                if !resolved {
                    debug!("Duplicate add for {}, refreshed path", devno);
                }
                (resolved, parent)
            }
            None => {
                self.topology
                    .block_devices
                    .create(disk, &event.path, devno, media_path, devtype)?;
                (false, disk)
            }
        };

        self.topology.media.attach(media_path, devno)?;
        info!("Block device {} {} added ({})", devtype, devno, event.path);

        if resolved && let Some(parent) = parent {
            let remaining = self.topology.block_devices.pending_partitions(parent);
            debug!("Disk {} waiting on {} more partition(s)", parent, remaining);
            if remaining == 0 {
                self.volmgr.consider_disk(parent)?;
            }
        }
        Ok(())
    }

    fn block_remove(&mut self, devno: DeviceNumber) -> Result<()> {
        let Some(device) = self.topology.block_devices.lookup(devno) else {
            debug!("Remove for untracked block device {}", devno);
            return Ok(());
        };
        if device.state() == EjectState::EjectRequested {
            debug!("Eject of {} already requested", devno);
            return Ok(());
        }

        self.topology.block_devices.request_eject(devno)?;
        let Some(device) = self.topology.block_devices.lookup(devno) else {
            return Ok(());
        };

        info!("Requesting eject of {}", devno);
        let ticket = EjectTicket::new(devno, self.completions.clone());
        if let Err(e) = self.volmgr.notify_eject(device, ticket) {
            self.topology.block_devices.cancel_eject(devno)?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Second half of the remove protocol
    ///
    /// Runs when an eject ticket's completion is taken off the worker queue.
    pub fn finish_eject(&mut self, devno: DeviceNumber) -> Result<()> {
        match self.topology.block_devices.lookup(devno) {
            None => {
                warn!("Eject completion for unknown block device {}", devno);
                Ok(())
            }
            Some(device) if device.state() != EjectState::EjectRequested => {
                warn!("Eject completion for {} without a pending eject", devno);
                Ok(())
            }
            Some(_) => {
                let device = self.topology.destroy_block_device(devno)?;
                info!(
                    "Block device {} destroyed ({})",
                    devno,
                    device.devpath.as_deref().unwrap_or("pending")
                );
                Ok(())
            }
        }
    }
}
