//! Physical media records
//!
//! A media record stands for one removable unit (an SD/MMC card) and is keyed
//! by the sysfs path of the card device. Block devices carved out of the card
//! are attached to it as they show up.

use super::{Result, TopologyError};
use std::collections::{BTreeMap, BTreeSet};
use uevent::DeviceNumber;

/// Kind of physical media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Mmc,
}

/// A tracked physical medium
#[derive(Debug, Clone)]
pub struct Media {
    pub devpath: String,
    pub name: String,
    pub serial: String,
    pub kind: MediaKind,
    block_devices: BTreeSet<DeviceNumber>,
}

impl Media {
    /// Attached block devices in device-number order
    pub fn block_devices(&self) -> impl Iterator<Item = DeviceNumber> + '_ {
        self.block_devices.iter().copied()
    }

    pub fn has_block_device(&self, devno: DeviceNumber) -> bool {
        self.block_devices.contains(&devno)
    }
}

/// Store of media records keyed by device path
#[derive(Debug, Default)]
pub struct MediaRegistry {
    media: BTreeMap<String, Media>,
}

impl MediaRegistry {
    pub fn create(
        &mut self,
        devpath: &str,
        name: &str,
        serial: &str,
        kind: MediaKind,
    ) -> Result<&Media> {
        if self.media.contains_key(devpath) {
            return Err(TopologyError::MediaExists(devpath.to_string()));
        }

        let media = self.media.entry(devpath.to_string()).or_insert(Media {
            devpath: devpath.to_string(),
            name: name.to_string(),
            serial: serial.to_string(),
            kind,
            block_devices: BTreeSet::new(),
        });
        Ok(media)
    }

    /// Exact match on the media device path
    pub fn lookup_by_path(&self, devpath: &str) -> Option<&Media> {
        self.media.get(devpath)
    }

    /// The media a block device is attached to, if any
    pub fn lookup_by_device(&self, devno: DeviceNumber) -> Option<&Media> {
        self.media.values().find(|m| m.has_block_device(devno))
    }

    /// Remove a media record, returning it with whatever was still attached
    pub fn destroy(&mut self, devpath: &str) -> Result<Media> {
        self.media
            .remove(devpath)
            .ok_or_else(|| TopologyError::MediaNotFound(devpath.to_string()))
    }

    /// Attach a block device; attaching twice is a no-op
    pub fn attach(&mut self, devpath: &str, devno: DeviceNumber) -> Result<()> {
        let media = self
            .media
            .get_mut(devpath)
            .ok_or_else(|| TopologyError::MediaNotFound(devpath.to_string()))?;
        media.block_devices.insert(devno);
        Ok(())
    }

    /// Detach a block device, returning whether it was attached
    pub fn detach(&mut self, devpath: &str, devno: DeviceNumber) -> Result<bool> {
        let media = self
            .media
            .get_mut(devpath)
            .ok_or_else(|| TopologyError::MediaNotFound(devpath.to_string()))?;
        Ok(media.block_devices.remove(&devno))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Media> {
        self.media.values()
    }

    pub fn len(&self) -> usize {
        self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }
}
