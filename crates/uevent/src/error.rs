//! Decode error types

use thiserror::Error;

/// Errors raised while turning raw kernel bytes (or synthetic input) into an [`Event`]
///
/// [`Event`]: crate::Event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer contained no data at all
    #[error("Empty uevent buffer")]
    Empty,

    /// Buffer length exceeds the maximum a single uevent may occupy
    #[error("Uevent too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// The header string has no `@` separator or nothing after it
    #[error("Uevent header has no device path")]
    MissingDevicePath,

    /// The header string is not valid UTF-8
    #[error("Uevent header is not valid UTF-8")]
    InvalidUtf8,

    /// Synthetic event carried an action other than add/change/remove
    #[error("Invalid action '{0}'")]
    InvalidAction(String),

    /// A parameter required by the caller is absent
    #[error("Missing parameter {0}")]
    MissingParam(&'static str),

    /// A parameter is present but cannot be parsed
    #[error("Malformed parameter {key}={value}")]
    MalformedParam { key: &'static str, value: String },
}

/// Type alias for decode results
pub type Result<T> = std::result::Result<T, DecodeError>;
