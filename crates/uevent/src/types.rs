//! Typed values carried by uevents
//!
//! The kernel sends everything as text; these types give the few fields the
//! daemon actually interprets a proper shape.

use crate::error::{DecodeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kernel hotplug action
///
/// Only three actions are acted upon. The kernel emits others (`bind`,
/// `move`, ...) which decode as the default and are filtered by handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Add,
    Change,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Change => "change",
            Action::Remove => "remove",
        }
    }
}

impl FromStr for Action {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(Action::Add),
            "change" => Ok(Action::Change),
            "remove" => Ok(Action::Remove),
            other => Err(DecodeError::InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Block device number (major, minor)
///
/// Minor 0 is the whole disk; a nonzero minor is a partition of the disk that
/// shares its major number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceNumber {
    pub major: u32,
    pub minor: u32,
}

impl DeviceNumber {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Device number of the disk this device belongs to
    pub const fn disk(&self) -> Self {
        Self::new(self.major, 0)
    }

    pub const fn is_disk(&self) -> bool {
        self.minor == 0
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Value of the `DEVTYPE` parameter on block events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevType {
    Disk,
    Partition,
}

impl DevType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DevType::Disk => "disk",
            DevType::Partition => "partition",
        }
    }

    /// Number of trailing sysfs path components between this device and the
    /// physical media that owns it
    ///
    /// `/devices/.../mmc0:0001/block/mmcblk0` is a disk two levels below its
    /// card; its partitions sit one level deeper.
    pub fn media_depth(&self) -> usize {
        match self {
            DevType::Disk => 2,
            DevType::Partition => 3,
        }
    }
}

impl FromStr for DevType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "disk" => Ok(DevType::Disk),
            "partition" => Ok(DevType::Partition),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for DevType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip `count` trailing components from a sysfs device path
///
/// Returns `None` when the path is not deep enough, which means the device
/// cannot belong to a media record.
pub fn strip_components(path: &str, count: usize) -> Option<&str> {
    let mut end = path.len();
    for _ in 0..count {
        end = path[..end].rfind('/')?;
    }
    if end == 0 { None } else { Some(&path[..end]) }
}
