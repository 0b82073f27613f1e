use crate::topology::TopologyError;
use crate::volmgr::VolumeError;
use thiserror::Error;
use uevent::{DecodeError, DeviceNumber};

/// Failure handling a single hotplug event
///
/// Every variant is scoped to the event that produced it; the worker logs it
/// and moves on to the next one.
#[derive(Debug, Error)]
pub enum HotplugError {
    #[error("Malformed uevent: {0}")]
    Decode(#[from] DecodeError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Volume manager error: {0}")]
    Volume(#[from] VolumeError),

    #[error("Unknown DEVTYPE '{0}'")]
    InvalidDevType(String),

    #[error("No media tracked at {0}")]
    UnknownMedia(String),

    #[error("Partition {0} has no disk record")]
    OrphanPartition(DeviceNumber),

    #[error("Eject of {0} still in progress")]
    EjectInProgress(DeviceNumber),

    #[error("Failed to read attribute '{name}' of {devpath}: {source}")]
    Attribute {
        devpath: String,
        name: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, HotplugError>;
