//! Error types for channel lookup, batch planning and decoding

use thiserror::Error;

use crate::codec::PartialDecode;

/// Errors that can occur while building or decoding batches
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConvError {
    /// Identifier does not name a registered channel
    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    /// A batch must carry at least one channel
    #[error("batch has no channels")]
    EmptyBatch,

    /// Response did not line up with the request; the decoded prefix is kept
    #[error("decode mismatch: {0}")]
    DecodeMismatch(Box<PartialDecode>),
}

impl From<PartialDecode> for ConvError {
    fn from(partial: PartialDecode) -> Self {
        ConvError::DecodeMismatch(Box::new(partial))
    }
}

/// Result type for conversion operations
pub type ConvResult<T> = Result<T, ConvError>;

/// Parse a two-digit wire code ("0C", "0x0c", " 5c ")
pub fn parse_wire_code(s: &str) -> ConvResult<u8> {
    let trimmed = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    if trimmed.len() != 2 {
        return Err(ConvError::InvalidChannel(s.to_string()));
    }
    u8::from_str_radix(trimmed, 16).map_err(|_| ConvError::InvalidChannel(s.to_string()))
}

/// Format a wire code as two uppercase hex digits
pub fn format_wire_code(code: u8) -> String {
    format!("{:02X}", code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_code() {
        assert_eq!(parse_wire_code("0C").unwrap(), 0x0C);
        assert_eq!(parse_wire_code("0x5c").unwrap(), 0x5C);
        assert_eq!(parse_wire_code(" 44 ").unwrap(), 0x44);
        assert!(parse_wire_code("ZZ").is_err());
        assert!(parse_wire_code("10C").is_err());
        assert!(parse_wire_code("").is_err());
    }

    #[test]
    fn test_format_wire_code() {
        assert_eq!(format_wire_code(0x0C), "0C");
        assert_eq!(format_wire_code(0x5C), "5C");
        assert_eq!(format_wire_code(0x04), "04");
    }
}
