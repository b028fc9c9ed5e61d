//! Link layer errors

use obd_conv::ConvError;
use thiserror::Error;

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    /// Endpoint unreachable, refused, or connect timed out
    #[error("Connect failed: {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// Adapter did not complete the init sequence
    #[error("Handshake failed at {command}: {reason}")]
    Handshake { command: String, reason: String },

    /// Socket closed or timed out mid-exchange
    #[error("Transport error: {0}")]
    Transport(String),

    /// Bad channel selection or settings; fatal to plan construction only
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ConvError> for LinkError {
    fn from(e: ConvError) -> Self {
        LinkError::InvalidConfig(e.to_string())
    }
}

impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        LinkError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_error_is_config_error() {
        let err: LinkError = ConvError::InvalidChannel("WARP".into()).into();
        assert_eq!(err, LinkError::InvalidConfig("invalid channel: WARP".into()));
    }

    #[test]
    fn test_io_error_is_transport_error() {
        let err: LinkError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe").into();
        assert_eq!(err, LinkError::Transport("broken pipe".into()));
    }
}
