//! Decoded uevent representation
//!
//! An [`Event`] lives for exactly one dispatch. Handlers that need to keep a
//! field past that point copy it out.

use crate::error::{DecodeError, Result};
use crate::types::{Action, DeviceNumber};
use serde::{Deserialize, Serialize};

/// Maximum number of free-form parameters retained per event
pub const MAX_PARAMS: usize = 32;

/// Ordered, capacity-checked list of `KEY=VALUE` strings
///
/// Entries past [`MAX_PARAMS`] are dropped and counted instead of stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<String>,
    dropped: usize,
}

impl Params {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_PARAMS),
            dropped: 0,
        }
    }

    /// Append an entry, returning `false` if the list is already full
    pub fn push(&mut self, entry: impl Into<String>) -> bool {
        if self.entries.len() >= MAX_PARAMS {
            self.dropped += 1;
            return false;
        }
        self.entries.push(entry.into());
        true
    }

    /// Value of the first entry whose key is exactly `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| {
            entry
                .strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries rejected because the list was full
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<S: Into<String>> FromIterator<S> for Params {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut params = Params::new();
        for entry in iter {
            params.push(entry);
        }
        params
    }
}

/// A decoded kernel hotplug notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Device path (sysfs-relative, e.g. `/devices/platform/.../mmcblk0`)
    pub path: String,
    pub action: Action,
    /// Empty when the message carried no `SUBSYSTEM=` entry
    pub subsystem: String,
    pub seqnum: u64,
    pub params: Params,
}

impl Event {
    /// Build an event from explicit fields, bypassing the byte decoder
    ///
    /// Used for replay and injection. Unlike the kernel path, an unknown
    /// action string is rejected.
    pub fn synthetic<I, S>(subsystem: &str, path: &str, action: &str, params: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            path: path.to_string(),
            action: action.parse()?,
            subsystem: subsystem.to_string(),
            seqnum: 0,
            params: params.into_iter().collect(),
        })
    }

    /// Shorthand for `self.params.get(key)`
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// Parse `MAJOR`/`MINOR` into a device number
    ///
    /// Both must be present and plain decimal; nothing defaults to zero.
    pub fn device_number(&self) -> Result<DeviceNumber> {
        Ok(DeviceNumber::new(
            self.numeric_param("MAJOR")?,
            self.numeric_param("MINOR")?,
        ))
    }

    fn numeric_param(&self, key: &'static str) -> Result<u32> {
        let value = self.param(key).ok_or(DecodeError::MissingParam(key))?;
        value.parse().map_err(|_| DecodeError::MalformedParam {
            key,
            value: value.to_string(),
        })
    }
}

/// Serializable form of a synthetic event, as read from replay files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticEvent {
    pub subsystem: String,
    pub path: String,
    #[serde(default = "SyntheticEvent::default_action")]
    pub action: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl SyntheticEvent {
    fn default_action() -> String {
        Action::Add.as_str().to_string()
    }

    pub fn to_event(&self) -> Result<Event> {
        Event::synthetic(
            &self.subsystem,
            &self.path,
            &self.action,
            self.params.iter().cloned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_exact_key_match() {
        let params: Params = ["SWITCH_NAMES=x", "SWITCH_NAME=usb_mass_storage"]
            .into_iter()
            .collect();
        assert_eq!(params.get("SWITCH_NAME"), Some("usb_mass_storage"));
        assert_eq!(params.get("SWITCH"), None);
    }

    #[test]
    fn test_params_first_match_wins() {
        let params: Params = ["A=1", "A=2"].into_iter().collect();
        assert_eq!(params.get("A"), Some("1"));
    }

    #[test]
    fn test_params_empty_value() {
        let params: Params = ["DEVNAME="].into_iter().collect();
        assert_eq!(params.get("DEVNAME"), Some(""));
    }

    #[test]
    fn test_params_capacity() {
        let mut params = Params::new();
        for i in 0..MAX_PARAMS {
            assert!(params.push(format!("K{}=v", i)));
        }
        assert!(!params.push("OVER=1"));
        assert!(!params.push("OVER=2"));
        assert_eq!(params.len(), MAX_PARAMS);
        assert_eq!(params.dropped(), 2);
        assert_eq!(params.get("OVER"), None);
    }

    #[test]
    fn test_device_number_strict() {
        let ev = Event::synthetic("block", "/d", "add", ["MAJOR=179", "MINOR=1"]).unwrap();
        assert_eq!(ev.device_number().unwrap(), DeviceNumber::new(179, 1));

        let ev = Event::synthetic("block", "/d", "add", ["MAJOR=179"]).unwrap();
        assert_eq!(
            ev.device_number(),
            Err(DecodeError::MissingParam("MINOR"))
        );

        let ev = Event::synthetic("block", "/d", "add", ["MAJOR=17x", "MINOR=1"]).unwrap();
        assert_eq!(
            ev.device_number(),
            Err(DecodeError::MalformedParam {
                key: "MAJOR",
                value: "17x".to_string()
            })
        );

        let ev = Event::synthetic("block", "/d", "add", ["MAJOR=", "MINOR=1"]).unwrap();
        assert!(ev.device_number().is_err());
    }

    #[test]
    fn test_synthetic_rejects_bad_action() {
        let err = Event::synthetic("mmc", "/devices/mmc0", "explode", Vec::<String>::new());
        assert_eq!(err, Err(DecodeError::InvalidAction("explode".to_string())));
    }

    #[test]
    fn test_synthetic_event_defaults() {
        let raw: SyntheticEvent =
            serde_json::from_str(r#"{"subsystem":"mmc","path":"/devices/mmc0"}"#).unwrap();
        assert_eq!(raw.action, "add");
        assert!(raw.params.is_empty());
        let ev = raw.to_event().unwrap();
        assert_eq!(ev.action, Action::Add);
        assert_eq!(ev.subsystem, "mmc");
    }
}
