//! Common utilities for the storage hotplug daemon
//!
//! This crate provides functionality shared between the daemon binary and its
//! tests: error handling, logging setup, topology snapshot types, and the
//! async channel bridge to the hotplug worker thread.

pub mod channel;
pub mod error;
pub mod logging;
pub mod storage_types;
pub mod test_utils;

pub use channel::{
    EVENT_QUEUE_CAPACITY, HotplugBridge, HotplugCommand, HotplugEvent, HotplugWorker,
    create_hotplug_bridge,
};
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use storage_types::{BlockDeviceSnapshot, MediaSnapshot, TopologySnapshot};
