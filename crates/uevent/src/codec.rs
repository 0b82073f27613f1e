//! Kernel uevent decoding
//!
//! A uevent datagram is a sequence of NUL-terminated ASCII strings:
//!
//! ```text
//! add@/devices/platform/mmc0\0ACTION=add\0SEQNUM=1042\0SUBSYSTEM=mmc\0MMC_TYPE=SD\0
//! ```
//!
//! The first string is `<prefix>@<device path>`. The rest are `KEY=VALUE`
//! pairs; `ACTION`, `SEQNUM` and `SUBSYSTEM` populate dedicated fields and
//! everything else is kept verbatim as a parameter.
//!
//! The buffer is untrusted. Decoding never indexes past its length, tolerates
//! a missing final terminator, and caps the parameter list at
//! [`MAX_PARAMS`](crate::MAX_PARAMS).

use crate::error::{DecodeError, Result};
use crate::event::Event;
use crate::types::Action;

/// Largest datagram accepted (matches the receive buffer size)
pub const MAX_UEVENT_SIZE: usize = 64 * 1024;

const ACTION_KEY: &str = "ACTION=";
const SEQNUM_KEY: &str = "SEQNUM=";
const SUBSYSTEM_KEY: &str = "SUBSYSTEM=";

/// Decode a raw uevent datagram
///
/// # Example
/// ```
/// use uevent::{Action, decode_event};
///
/// let raw = b"add@/devices/mmc0\0ACTION=remove\0SUBSYSTEM=mmc\0MMC_TYPE=SD\0";
/// let event = decode_event(raw).unwrap();
/// assert_eq!(event.path, "/devices/mmc0");
/// assert_eq!(event.action, Action::Remove);
/// assert_eq!(event.param("MMC_TYPE"), Some("SD"));
/// ```
pub fn decode_event(buf: &[u8]) -> Result<Event> {
    if buf.len() > MAX_UEVENT_SIZE {
        return Err(DecodeError::TooLarge {
            size: buf.len(),
            max: MAX_UEVENT_SIZE,
        });
    }

    let mut fields = buf.split(|&b| b == 0).filter(|s| !s.is_empty());

    let header = fields.next().ok_or(DecodeError::Empty)?;
    let mut event = Event {
        path: decode_path(header)?,
        ..Event::default()
    };

    for raw in fields {
        let field = String::from_utf8_lossy(raw);

        if let Some(action) = field.strip_prefix(ACTION_KEY) {
            // Upstream only emits add/change/remove for the subsystems we
            // handle; anything else keeps the default.
            if let Ok(action) = action.parse::<Action>() {
                event.action = action;
            }
        } else if let Some(seqnum) = field.strip_prefix(SEQNUM_KEY) {
            event.seqnum = parse_seqnum(seqnum);
        } else if let Some(subsystem) = field.strip_prefix(SUBSYSTEM_KEY) {
            event.subsystem = subsystem.to_string();
        } else {
            event.params.push(field.into_owned());
        }
    }

    Ok(event)
}

fn decode_path(header: &[u8]) -> Result<String> {
    let at = header
        .iter()
        .position(|&b| b == b'@')
        .ok_or(DecodeError::MissingDevicePath)?;

    let path = std::str::from_utf8(&header[at + 1..]).map_err(|_| DecodeError::InvalidUtf8)?;
    if path.is_empty() {
        return Err(DecodeError::MissingDevicePath);
    }

    Ok(path.to_string())
}

/// Leading decimal digits, 0 if there are none or they overflow
fn parse_seqnum(s: &str) -> u64 {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    s[..digits].parse().unwrap_or(0)
}
