//! Test utilities for the hotplug daemon
//!
//! Builders for raw kernel datagrams and helpers shared by tests across
//! crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::UeventBuilder;
//!
//! let bytes = UeventBuilder::new("add", "/devices/mmc0")
//!     .subsystem("mmc")
//!     .param("MMC_TYPE", "SD")
//!     .build();
//! assert!(bytes.starts_with(b"add@/devices/mmc0\0"));
//! ```

use std::future::Future;
use std::time::Duration;
use uevent::DeviceNumber;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// sysfs path of the SD slot used throughout the tests
pub const TEST_CARD_PATH: &str = "/devices/platform/msm_sdcc.2/mmc_host/mmc1/mmc1:e624";

/// Builder for raw NUL-delimited uevent datagrams
#[derive(Debug, Clone)]
pub struct UeventBuilder {
    action: String,
    path: String,
    fields: Vec<String>,
    seqnum: Option<u64>,
}

impl UeventBuilder {
    /// Start a datagram whose header is `<action>@<path>` and which carries
    /// a matching `ACTION=` entry
    pub fn new(action: &str, path: &str) -> Self {
        Self {
            action: action.to_string(),
            path: path.to_string(),
            fields: vec![format!("ACTION={}", action)],
            seqnum: None,
        }
    }

    pub fn subsystem(mut self, subsystem: &str) -> Self {
        self.fields.push(format!("SUBSYSTEM={}", subsystem));
        self
    }

    pub fn seqnum(mut self, seqnum: u64) -> Self {
        self.seqnum = Some(seqnum);
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.fields.push(format!("{}={}", key, value));
        self
    }

    /// Add `MAJOR`/`MINOR` entries
    pub fn devno(self, devno: DeviceNumber) -> Self {
        self.param("MAJOR", &devno.major.to_string())
            .param("MINOR", &devno.minor.to_string())
    }

    /// Append a field verbatim (no `KEY=VALUE` formatting)
    pub fn raw_field(mut self, field: &str) -> Self {
        self.fields.push(field.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(format!("{}@{}", self.action, self.path).as_bytes());
        buf.push(0);
        for field in &self.fields {
            buf.extend_from_slice(field.as_bytes());
            buf.push(0);
        }
        if let Some(seqnum) = self.seqnum {
            buf.extend_from_slice(format!("SEQNUM={}", seqnum).as_bytes());
            buf.push(0);
        }
        buf
    }
}

/// Datagram for an SD/MMC card insertion or removal at `path`
pub fn mmc_uevent(action: &str, path: &str, mmc_type: &str, name: &str) -> Vec<u8> {
    UeventBuilder::new(action, path)
        .subsystem("mmc")
        .param("MMC_TYPE", mmc_type)
        .param("MMC_NAME", name)
        .build()
}

/// Datagram for the whole-disk block device of the card at `card_path`
pub fn disk_uevent(action: &str, card_path: &str, disk: &str, devno: DeviceNumber) -> Vec<u8> {
    UeventBuilder::new(action, &format!("{}/block/{}", card_path, disk))
        .subsystem("block")
        .devno(devno)
        .param("DEVTYPE", "disk")
        .build()
}

/// Datagram for partition `devno` of `disk` on the card at `card_path`
pub fn partition_uevent(
    action: &str,
    card_path: &str,
    disk: &str,
    devno: DeviceNumber,
) -> Vec<u8> {
    let path = format!("{}/block/{}/{}p{}", card_path, disk, disk, devno.minor);
    UeventBuilder::new(action, &path)
        .subsystem("block")
        .devno(devno)
        .param("DEVTYPE", "partition")
        .build()
}

/// Datagram for a `switch` state change
pub fn switch_uevent(name: &str, state: &str) -> Vec<u8> {
    UeventBuilder::new("change", &format!("/devices/virtual/switch/{}", name))
        .subsystem("switch")
        .param("SWITCH_NAME", name)
        .param("SWITCH_STATE", state)
        .build()
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_layout() {
        let bytes = UeventBuilder::new("remove", "/devices/x")
            .subsystem("block")
            .param("DEVTYPE", "disk")
            .seqnum(9)
            .build();

        let fields: Vec<&[u8]> = bytes.split(|&b| b == 0).collect();
        assert_eq!(fields[0], b"remove@/devices/x");
        assert_eq!(fields[1], b"ACTION=remove");
        assert_eq!(fields[2], b"SUBSYSTEM=block");
        assert_eq!(fields[3], b"DEVTYPE=disk");
        assert_eq!(fields[4], b"SEQNUM=9");
        assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn test_partition_uevent_decodes() {
        let bytes = partition_uevent("add", TEST_CARD_PATH, "mmcblk0", DeviceNumber::new(179, 2));
        let event = uevent::decode_event(&bytes).unwrap();
        assert!(event.path.ends_with("/block/mmcblk0/mmcblk0p2"));
        assert_eq!(event.device_number().unwrap(), DeviceNumber::new(179, 2));
        assert_eq!(event.param("DEVTYPE"), Some("partition"));
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_failure() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            42
        })
        .await;

        assert!(result.is_err());
    }
}
