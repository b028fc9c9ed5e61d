//! obd-conv - OBD-II Mode 01 channel conversion and batch codec
//!
//! Everything here is pure and synchronous: a static channel registry,
//! raw ↔ physical conversion, truncation to display precision, and the codec
//! that packs several channels into one Mode 01 request and unpacks the reply.
//!
//! # Features
//!
//! - **Typed channels** - identifiers resolve once to [`ChannelId`], never per poll
//! - **Plain-data registry** - descriptors carry no closures; conversions are pure functions
//! - **Truncation, not rounding** - displayed values never overstate a reading
//! - **Order-strict decoding** - a mismatched slot stops the walk and keeps the prefix
//!
//! # Quick Start
//!
//! ```rust
//! use obd_conv::{decode, convert, BatchPlan, ChannelId};
//!
//! // RPM + boost fit in a single frame: 1 + (1+2) + (1+1) = 6 bytes
//! let plan = BatchPlan::from_identifiers(&["RPM", "BOOST"]).unwrap();
//! assert_eq!(plan.request(), "010C0B");
//! assert!(plan.budget_warning().is_none());
//!
//! // Decode the adapter's reply in request order
//! let samples = decode(b"410C1AF80B64\r\n>", plan.channels()).unwrap();
//! assert_eq!(convert(ChannelId::Rpm, samples[0].raw), 1726.0);
//! ```
//!
//! # Wire format
//!
//! | Direction | Format | Example |
//! |-----------|--------|---------|
//! | Request | `01` + codes | `010C0B` |
//! | Response | `41` + (code + data)* | `410C1AF80B64` |
//! | Multi-frame | `N:` prefixed lines | `0: 41 0C 1A F8` |

pub mod codec;
pub mod convert;
pub mod error;
pub mod plan;
pub mod precision;
pub mod registry;

// Re-export main types
pub use codec::{decode, encode, encode_channels, MismatchReason, PartialDecode, RawSample};
pub use convert::{convert, encode_raw, resolution};
pub use error::{format_wire_code, parse_wire_code, ConvError, ConvResult};
pub use plan::{byte_budget, BatchPlan, BudgetWarning, SINGLE_FRAME_BUDGET};
pub use precision::{format_truncated, truncate_to_precision};
pub use registry::{descriptors, lookup, ChannelId, Descriptor};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{decode, encode, RawSample};
    pub use crate::error::{ConvError, ConvResult};
    pub use crate::plan::BatchPlan;
    pub use crate::registry::{ChannelId, Descriptor};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_workflow() {
        let plan = BatchPlan::from_identifiers(&["RPM", "COOLANT_TEMP", "VOLTAGE"]).unwrap();
        assert_eq!(plan.request(), "010C0542");
        // 1 + 3 + 2 + 3
        assert_eq!(plan.byte_budget(), 9);
        assert!(plan.budget_warning().is_some());

        let response = b"41 0C 0C 80 05 7D 42 37 14\r\n>";
        let samples = decode(response, plan.channels()).unwrap();
        let values: Vec<f64> = samples
            .iter()
            .map(|s| {
                let desc = s.channel.descriptor();
                truncate_to_precision(convert(s.channel, s.raw), desc.precision)
            })
            .collect();

        // 0x0C80 / 4 = 800 rpm, 0x7D - 40 = 85 °C, 0x3714 / 1000 = 14.1 V
        assert_eq!(values, vec![800.0, 85.0, 14.1]);
    }

    #[test]
    fn test_simulator_and_client_agree() {
        // a value put on the wire with encode_raw decodes back within one step
        for desc in descriptors() {
            let mid = (desc.dial_min + desc.dial_max) / 2.0;
            let raw = encode_raw(desc.id, mid);
            let request = encode_channels(&[desc.id]);
            let hex_data = hex::encode_upper(convert::raw_to_bytes(desc.id, raw));
            let response = format!("41{}{}\r\n>", &request[2..], hex_data);

            let samples = decode(response.as_bytes(), &[desc.id]).unwrap();
            assert_eq!(samples[0].raw, raw);
            assert!((convert(desc.id, raw) - mid).abs() <= resolution(desc.id));
        }
    }
}
