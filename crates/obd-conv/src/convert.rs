//! Raw ↔ physical conversion
//!
//! `convert` is the client side (raw integer from the wire to engineering
//! units), `encode_raw` is its inverse and is what the simulator uses to put
//! values on the wire. Both agree on byte width and big-endian order through
//! the registry.

use crate::registry::ChannelId;

/// kPa → gauge psi, the scale used for both boost and barometer
const KPA_TO_PSI: f64 = 0.145;
const ATMOSPHERE_PSI: f64 = 14.5;
const LAMBDA_SCALE: f64 = 32768.0;

/// Convert a raw response integer to the channel's physical value
pub fn convert(id: ChannelId, raw: u32) -> f64 {
    let a = raw as f64;
    match id {
        ChannelId::Rpm => a / 4.0,
        ChannelId::Speed => a,
        ChannelId::CoolantTemp | ChannelId::OilTemp | ChannelId::Iat => a - 40.0,
        ChannelId::Boost | ChannelId::BarometricPressure => a * KPA_TO_PSI - ATMOSPHERE_PSI,
        ChannelId::Throttle | ChannelId::Load => a * 100.0 / 255.0,
        ChannelId::Stft | ChannelId::Ltft => (a - 128.0) * 100.0 / 128.0,
        ChannelId::Timing => a / 2.0 - 64.0,
        ChannelId::Voltage => a / 1000.0,
        ChannelId::Afr => a / LAMBDA_SCALE,
        ChannelId::Maf => a / 100.0,
    }
}

/// Map a physical value back to the nearest raw integer
///
/// Values outside what the channel can carry saturate at 0 or the width's
/// maximum. NaN encodes as 0.
pub fn encode_raw(id: ChannelId, physical: f64) -> u32 {
    let v = physical;
    let raw = match id {
        ChannelId::Rpm => v * 4.0,
        ChannelId::Speed => v,
        ChannelId::CoolantTemp | ChannelId::OilTemp | ChannelId::Iat => v + 40.0,
        ChannelId::Boost | ChannelId::BarometricPressure => (v + ATMOSPHERE_PSI) / KPA_TO_PSI,
        ChannelId::Throttle | ChannelId::Load => v * 255.0 / 100.0,
        ChannelId::Stft | ChannelId::Ltft => v * 128.0 / 100.0 + 128.0,
        ChannelId::Timing => (v + 64.0) * 2.0,
        ChannelId::Voltage => v * 1000.0,
        ChannelId::Afr => v * LAMBDA_SCALE,
        ChannelId::Maf => v * 100.0,
    };

    if raw.is_nan() {
        return 0;
    }
    let max = id.descriptor().max_raw() as f64;
    raw.round().clamp(0.0, max) as u32
}

/// Smallest physical step one raw count represents
pub fn resolution(id: ChannelId) -> f64 {
    (convert(id, 1) - convert(id, 0)).abs()
}

/// Raw integer → big-endian bytes of the channel's width
pub fn raw_to_bytes(id: ChannelId, raw: u32) -> Vec<u8> {
    let width = id.descriptor().byte_width as usize;
    raw.to_be_bytes()[4 - width..].to_vec()
}

/// Big-endian bytes → raw integer
pub fn bytes_to_raw(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}
