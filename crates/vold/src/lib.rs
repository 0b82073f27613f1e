//! Storage hotplug daemon
//!
//! Listens for kernel uevents, keeps track of removable media and the block
//! devices on them, and tells the volume manager when a disk is fully
//! enumerated or about to go away.
//!
//! The hotplug core ([`hotplug::Hotplug`]) runs on a dedicated worker thread
//! ([`worker`]); a second thread ([`netlink`]) feeds it raw kernel datagrams.
//! The Tokio runtime in the binary only handles signals, systemd and the
//! notifications the worker sends back.

pub mod config;
pub mod hotplug;
#[cfg(target_os = "linux")]
pub mod netlink;
pub mod replay;
pub mod service;
pub mod sysfs;
pub mod topology;
pub mod ums;
pub mod volmgr;
pub mod worker;

pub use hotplug::{Hotplug, HotplugError, HotplugSettings};
pub use sysfs::{AttributeReader, SysfsReader};
pub use volmgr::{EjectTicket, StandaloneVolumeManager, VolumeError, VolumeManager};
pub use worker::spawn_hotplug_worker;
