//! Channel registry
//!
//! Static table of every Mode 01 parameter the stack understands. The table is
//! plain data: conversions live in [`crate::convert`] and are keyed by
//! [`ChannelId`], so nothing here is mutable after startup and lookups need no
//! synchronization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{format_wire_code, parse_wire_code, ConvError, ConvResult};

/// Stable identifier of a telemetry channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelId {
    BarometricPressure,
    Boost,
    Iat,
    Afr,
    Timing,
    CoolantTemp,
    OilTemp,
    Voltage,
    Rpm,
    Throttle,
    Speed,
    Ltft,
    Stft,
    Load,
    Maf,
}

impl ChannelId {
    /// Every channel, in registry order
    pub const ALL: [ChannelId; 15] = [
        ChannelId::BarometricPressure,
        ChannelId::Boost,
        ChannelId::Iat,
        ChannelId::Afr,
        ChannelId::Timing,
        ChannelId::CoolantTemp,
        ChannelId::OilTemp,
        ChannelId::Voltage,
        ChannelId::Rpm,
        ChannelId::Throttle,
        ChannelId::Speed,
        ChannelId::Ltft,
        ChannelId::Stft,
        ChannelId::Load,
        ChannelId::Maf,
    ];

    /// Position of this channel in the registry table
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical identifier string
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelId::BarometricPressure => "BAROMETRIC_PRESSURE",
            ChannelId::Boost => "BOOST",
            ChannelId::Iat => "IAT",
            ChannelId::Afr => "AFR",
            ChannelId::Timing => "TIMING",
            ChannelId::CoolantTemp => "COOLANT_TEMP",
            ChannelId::OilTemp => "OIL_TEMP",
            ChannelId::Voltage => "VOLTAGE",
            ChannelId::Rpm => "RPM",
            ChannelId::Throttle => "THROTTLE",
            ChannelId::Speed => "SPEED",
            ChannelId::Ltft => "LTFT",
            ChannelId::Stft => "STFT",
            ChannelId::Load => "LOAD",
            ChannelId::Maf => "MAF",
        }
    }

    /// Descriptor for this channel
    pub fn descriptor(self) -> &'static Descriptor {
        &DESCRIPTORS[self.index()]
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelId {
    type Err = ConvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s).map(|d| d.id)
    }
}

/// Immutable description of one supported parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Descriptor {
    pub id: ChannelId,
    /// Display name
    pub name: &'static str,
    /// Mode 01 PID
    pub wire_code: u8,
    /// Data bytes in the response (1 or 2)
    pub byte_width: u8,
    pub unit: &'static str,
    /// Decimal places kept after truncation
    pub precision: u8,
    pub dial_min: f64,
    pub dial_max: f64,
    /// Value the store is seeded with before the first sample
    pub default_value: f64,
}

impl Descriptor {
    /// Wire code as two uppercase hex digits
    pub fn wire_hex(&self) -> String {
        format_wire_code(self.wire_code)
    }

    /// Largest raw integer the channel can carry
    pub fn max_raw(&self) -> u32 {
        match self.byte_width {
            1 => 0xFF,
            _ => 0xFFFF,
        }
    }

    /// Hex digits one channel occupies in a response (code + data)
    pub fn response_digits(&self) -> usize {
        2 + 2 * self.byte_width as usize
    }
}

#[allow(clippy::too_many_arguments)]
const fn descriptor(
    id: ChannelId,
    name: &'static str,
    wire_code: u8,
    byte_width: u8,
    unit: &'static str,
    precision: u8,
    range: (f64, f64),
    default_value: f64,
) -> Descriptor {
    Descriptor {
        id,
        name,
        wire_code,
        byte_width,
        unit,
        precision,
        dial_min: range.0,
        dial_max: range.1,
        default_value,
    }
}

static DESCRIPTORS: [Descriptor; 15] = [
    descriptor(ChannelId::BarometricPressure, "Barometer", 0x33, 1, "psi", 2, (-20.0, 20.0), 0.0),
    descriptor(ChannelId::Boost, "Boost", 0x0B, 1, "psi", 2, (-20.0, 20.0), 0.0),
    descriptor(ChannelId::Iat, "Intake Air Temp", 0x0F, 1, "°C", 0, (0.0, 80.0), 40.0),
    descriptor(ChannelId::Afr, "Commanded AFR", 0x44, 2, "λ", 2, (0.7, 1.3), 1.0),
    descriptor(ChannelId::Timing, "Timing Advance", 0x0E, 1, "°", 0, (-20.0, 60.0), 0.0),
    descriptor(ChannelId::CoolantTemp, "Coolant Temp", 0x05, 1, "°C", 0, (40.0, 120.0), 90.0),
    descriptor(ChannelId::OilTemp, "Oil Temp", 0x5C, 1, "°C", 0, (40.0, 120.0), 90.0),
    descriptor(ChannelId::Voltage, "Voltage", 0x42, 2, "V", 1, (5.0, 20.0), 12.0),
    descriptor(ChannelId::Rpm, "RPM", 0x0C, 2, "rpm", 0, (0.0, 7000.0), 800.0),
    descriptor(ChannelId::Throttle, "Throttle", 0x11, 1, "%", 0, (0.0, 100.0), 0.0),
    descriptor(ChannelId::Speed, "Speed", 0x0D, 1, "km/h", 0, (0.0, 180.0), 0.0),
    descriptor(ChannelId::Ltft, "LTFT", 0x07, 1, "%", 1, (-20.0, 20.0), 0.0),
    descriptor(ChannelId::Stft, "STFT", 0x06, 1, "%", 1, (-20.0, 20.0), 0.0),
    descriptor(ChannelId::Load, "Engine Load", 0x04, 1, "%", 0, (0.0, 100.0), 0.0),
    descriptor(ChannelId::Maf, "Mass Air Flow", 0x10, 2, "g/s", 1, (0.0, 300.0), 0.0),
];

/// Older dashboard names still found in user configs
const ALIASES: &[(&str, ChannelId)] = &[
    ("BARO", ChannelId::BarometricPressure),
    ("MANIFOLD_PRESSURE", ChannelId::Boost),
    ("MAP", ChannelId::Boost),
    ("INTAKE_TEMP", ChannelId::Iat),
    ("AFR_C", ChannelId::Afr),
    ("LAMBDA", ChannelId::Afr),
    ("IGNITION_TIMING", ChannelId::Timing),
    ("COOLANT", ChannelId::CoolantTemp),
    ("OIL", ChannelId::OilTemp),
    ("ENGINE_RPM", ChannelId::Rpm),
    ("THROTTLE_POSITION", ChannelId::Throttle),
    ("ENGINE_LOAD", ChannelId::Load),
];

/// All descriptors in registry order
pub fn descriptors() -> &'static [Descriptor] {
    &DESCRIPTORS
}

/// Resolve an identifier, alias or wire code to its descriptor
///
/// Identifiers and aliases are matched case-insensitively. Two-digit hex
/// strings are tried as wire codes last.
pub fn lookup(identifier: &str) -> ConvResult<&'static Descriptor> {
    let key = identifier.trim();

    if let Some(desc) = DESCRIPTORS
        .iter()
        .find(|d| d.id.as_str().eq_ignore_ascii_case(key))
    {
        return Ok(desc);
    }

    if let Some((_, id)) = ALIASES.iter().find(|(alias, _)| alias.eq_ignore_ascii_case(key)) {
        return Ok(id.descriptor());
    }

    parse_wire_code(key)
        .ok()
        .and_then(by_wire_code)
        .ok_or_else(|| ConvError::InvalidChannel(identifier.to_string()))
}

/// Find the descriptor carrying a given wire code
pub fn by_wire_code(code: u8) -> Option<&'static Descriptor> {
    DESCRIPTORS.iter().find(|d| d.wire_code == code)
}

/// Resolve a list of identifiers, failing on the first unknown one
pub fn resolve_all<S: AsRef<str>>(identifiers: &[S]) -> ConvResult<Vec<ChannelId>> {
    identifiers
        .iter()
        .map(|s| lookup(s.as_ref()).map(|d| d.id))
        .collect()
}
