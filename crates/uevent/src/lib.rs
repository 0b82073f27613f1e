//! Kernel uevent wire format
//!
//! This crate turns the NUL-delimited datagrams the kernel multicasts on
//! `NETLINK_KOBJECT_UEVENT` into typed [`Event`]s, and provides the synthetic
//! construction path used for replay and injection.
//!
//! # Example
//!
//! ```
//! use uevent::{Action, DeviceNumber, decode_event};
//!
//! let raw = b"add@/devices/mmc0/block/mmcblk0\0\
//!             ACTION=add\0SUBSYSTEM=block\0SEQNUM=7\0\
//!             MAJOR=179\0MINOR=0\0DEVTYPE=disk\0";
//!
//! let event = decode_event(raw).unwrap();
//! assert_eq!(event.action, Action::Add);
//! assert_eq!(event.subsystem, "block");
//! assert_eq!(event.device_number().unwrap(), DeviceNumber::new(179, 0));
//! ```
//!
//! # Synthetic events
//!
//! ```
//! use uevent::Event;
//!
//! let event = Event::synthetic("mmc", "/devices/mmc0", "add", ["MMC_TYPE=SD"]).unwrap();
//! assert_eq!(event.param("MMC_TYPE"), Some("SD"));
//! ```

pub mod codec;
pub mod error;
pub mod event;
pub mod types;

pub use codec::{MAX_UEVENT_SIZE, decode_event};
pub use error::{DecodeError, Result};
pub use event::{Event, MAX_PARAMS, Params, SyntheticEvent};
pub use types::{Action, DevType, DeviceNumber, strip_components};
