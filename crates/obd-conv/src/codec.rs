//! Mode 01 batch codec
//!
//! Requests are `01` followed by each channel's wire code in caller order.
//! Responses are `41` followed by `<code><data>` per channel, possibly split
//! over numbered lines by the adapter.
//!
//! Decoding is strict about order: each slot must carry the wire code of the
//! channel requested at that position. The first mismatch stops the walk and
//! everything decoded before it is returned as a [`PartialDecode`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::convert::bytes_to_raw;
use crate::error::{format_wire_code, ConvResult};
use crate::registry::{resolve_all, ChannelId};

/// Mode 01 request prefix
pub const REQUEST_MODE: &str = "01";
/// Positive response header for Mode 01
pub const RESPONSE_HEADER: &str = "41";
/// Adapter prompt that terminates every reply
pub const PROMPT: u8 = b'>';

/// Encode identifiers into a request string, failing on unknown ones
pub fn encode<S: AsRef<str>>(identifiers: &[S]) -> ConvResult<String> {
    Ok(encode_channels(&resolve_all(identifiers)?))
}

/// Encode already-resolved channels
pub fn encode_channels(channels: &[ChannelId]) -> String {
    let mut request = String::with_capacity(REQUEST_MODE.len() + channels.len() * 2);
    request.push_str(REQUEST_MODE);
    for channel in channels {
        request.push_str(&channel.descriptor().wire_hex());
    }
    request
}

/// One decoded slot of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawSample {
    pub channel: ChannelId,
    pub raw: u32,
}

/// Why decoding stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MismatchReason {
    /// No `41` header anywhere in the payload
    MissingHeader,
    /// The slot at `position` carried a different wire code
    WireCodeMismatch {
        position: usize,
        expected: String,
        found: String,
    },
    /// Payload ended before the slot at `position` was complete
    Truncated { position: usize },
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::MissingHeader => write!(f, "no {} header", RESPONSE_HEADER),
            MismatchReason::WireCodeMismatch {
                position,
                expected,
                found,
            } => write!(f, "slot {} expected {} found {}", position, expected, found),
            MismatchReason::Truncated { position } => write!(f, "truncated at slot {}", position),
        }
    }
}

/// Prefix of a batch that decoded before a mismatch
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("decoded {} of {requested} channels ({reason})", .decoded.len())]
pub struct PartialDecode {
    pub decoded: Vec<RawSample>,
    pub requested: usize,
    pub reason: MismatchReason,
}

impl PartialDecode {
    pub fn updated(&self) -> usize {
        self.decoded.len()
    }
}

/// Decode a prompt-terminated response for `channels`, in request order
pub fn decode(response: &[u8], channels: &[ChannelId]) -> Result<Vec<RawSample>, PartialDecode> {
    let payload = extract_payload(response);
    let fail = |decoded: Vec<RawSample>, reason| PartialDecode {
        decoded,
        requested: channels.len(),
        reason,
    };

    let start = match payload.find(RESPONSE_HEADER) {
        Some(idx) => idx + RESPONSE_HEADER.len(),
        None => return Err(fail(Vec::new(), MismatchReason::MissingHeader)),
    };

    let mut decoded = Vec::with_capacity(channels.len());
    let mut cursor = start;
    for (position, &channel) in channels.iter().enumerate() {
        let desc = channel.descriptor();
        let end = cursor + desc.response_digits();
        if end > payload.len() {
            return Err(fail(decoded, MismatchReason::Truncated { position }));
        }

        let code = &payload[cursor..cursor + 2];
        let expected = format_wire_code(desc.wire_code);
        if code != expected {
            return Err(fail(
                decoded,
                MismatchReason::WireCodeMismatch {
                    position,
                    expected,
                    found: code.to_string(),
                },
            ));
        }

        // payload is filtered to hex digits, so this only fails on odd slicing
        let data = match hex::decode(&payload[cursor + 2..end]) {
            Ok(bytes) => bytes,
            Err(_) => return Err(fail(decoded, MismatchReason::Truncated { position })),
        };
        decoded.push(RawSample {
            channel,
            raw: bytes_to_raw(&data),
        });
        cursor = end;
    }

    Ok(decoded)
}

/// Concatenate the hex payload of an adapter reply
///
/// Drops whitespace and the prompt, strips `N:`/`NN:` frame markers, and
/// skips status lines such as `SEARCHING...` or `NO DATA`. When frame markers
/// are present, unmarked lines (the byte count header) are dropped too.
pub fn extract_payload(response: &[u8]) -> String {
    let text = String::from_utf8_lossy(response);

    let mut lines: Vec<(bool, String)> = Vec::new();
    for raw_line in text.split(|c: char| c == '\r' || c == '\n') {
        let cleaned: String = raw_line
            .chars()
            .filter(|c| !c.is_whitespace() && *c != PROMPT as char)
            .collect();
        if cleaned.is_empty() {
            continue;
        }

        let (framed, body) = match cleaned.split_once(':') {
            Some((marker, rest))
                if (1..=2).contains(&marker.len())
                    && marker.chars().all(|c| c.is_ascii_hexdigit()) =>
            {
                (true, rest.to_string())
            }
            _ => (false, cleaned),
        };

        if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        lines.push((framed, body.to_ascii_uppercase()));
    }

    let any_framed = lines.iter().any(|(framed, _)| *framed);
    lines
        .into_iter()
        .filter(|(framed, _)| *framed || !any_framed)
        .map(|(_, body)| body)
        .collect()
}
