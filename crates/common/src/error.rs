//! Common error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::Channel("receiving on a closed channel".into()).to_string(),
            "Channel error: receiving on a closed channel"
        );
        assert_eq!(
            Error::Config("Invalid log filter".into()).to_string(),
            "Configuration error: Invalid log filter"
        );
    }
}
