//! Value store
//!
//! One entry per registry channel, each behind its own lock so a reader always
//! sees a value and its min/max from the same update. The polling loop is the
//! only writer; any number of consumers may read.

use chrono::{DateTime, Duration, Utc};
use obd_conv::{convert, format_truncated, truncate_to_precision, ChannelId, RawSample};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use tracing::debug;

/// Current state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelReading {
    pub channel: ChannelId,
    /// Physical value, truncated to the channel's precision
    pub value: f64,
    /// Running minimum, `+inf` before the first sample
    #[serde(serialize_with = "finite_or_none")]
    pub min: f64,
    /// Running maximum, `-inf` before the first sample
    #[serde(serialize_with = "finite_or_none")]
    pub max: f64,
    /// Samples applied since startup
    pub samples: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

fn finite_or_none<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(value)
    } else {
        serializer.serialize_none()
    }
}

impl ChannelReading {
    /// Entry seeded from the channel's descriptor default
    pub fn seeded(channel: ChannelId) -> Self {
        Self {
            channel,
            value: channel.descriptor().default_value,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            samples: 0,
            updated_at: None,
        }
    }

    /// Whether any sample has landed
    pub fn has_data(&self) -> bool {
        self.samples > 0
    }

    /// Current value, or `None` if only the seed is present
    pub fn current(&self) -> Option<f64> {
        self.has_data().then_some(self.value)
    }

    /// Value formatted with the channel's display precision
    pub fn display_value(&self) -> String {
        format_truncated(self.value, self.channel.descriptor().precision)
    }

    pub fn min(&self) -> Option<f64> {
        self.min.is_finite().then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        self.max.is_finite().then_some(self.max)
    }

    /// Time since the last sample, `None` if never updated
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.updated_at.map(|t| now - t)
    }

    /// Whether the reading is older than `max_age` (or has never been set)
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.age(now) {
            Some(age) => age > max_age,
            None => true,
        }
    }

    fn record(&mut self, value: f64, at: DateTime<Utc>) {
        self.value = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.samples += 1;
        self.updated_at = Some(at);
    }
}

/// Live telemetry for every registry channel
pub struct ValueStore {
    entries: Vec<RwLock<ChannelReading>>,
}

impl ValueStore {
    /// Create a store seeded with descriptor defaults
    pub fn new() -> Self {
        Self {
            entries: ChannelId::ALL
                .iter()
                .map(|&id| RwLock::new(ChannelReading::seeded(id)))
                .collect(),
        }
    }

    /// Convert, truncate and record one raw sample
    ///
    /// Returns the stored (truncated) value.
    pub fn apply_raw(&self, channel: ChannelId, raw: u32) -> f64 {
        self.apply_raw_at(channel, raw, Utc::now())
    }

    /// Same as [`apply_raw`](Self::apply_raw) with an explicit timestamp
    pub fn apply_raw_at(&self, channel: ChannelId, raw: u32, at: DateTime<Utc>) -> f64 {
        let precision = channel.descriptor().precision;
        let value = truncate_to_precision(convert(channel, raw), precision);
        self.entries[channel.index()].write().record(value, at);
        value
    }

    /// Apply decoded samples in order, returning how many landed
    pub fn apply_samples(&self, samples: &[RawSample]) -> usize {
        let now = Utc::now();
        for sample in samples {
            self.apply_raw_at(sample.channel, sample.raw, now);
        }
        samples.len()
    }

    /// Consistent copy of one channel
    pub fn reading(&self, channel: ChannelId) -> ChannelReading {
        *self.entries[channel.index()].read()
    }

    /// Current value (seed value before the first sample)
    pub fn value(&self, channel: ChannelId) -> f64 {
        self.entries[channel.index()].read().value
    }

    /// Every channel, in registry order
    pub fn snapshot(&self) -> Vec<ChannelReading> {
        self.entries.iter().map(|e| *e.read()).collect()
    }

    /// Selected channels, in the given order
    pub fn snapshot_of(&self, channels: &[ChannelId]) -> Vec<ChannelReading> {
        channels.iter().map(|&c| self.reading(c)).collect()
    }

    /// Whether a channel has gone without an update for longer than `max_age`
    pub fn is_stale(&self, channel: ChannelId, max_age: Duration) -> bool {
        self.reading(channel).is_stale(Utc::now(), max_age)
    }

    /// Restart min/max tracking from each channel's current value
    ///
    /// Channels that never received a sample keep their sentinels.
    pub fn reset_extremes(&self) {
        for entry in &self.entries {
            let mut reading = entry.write();
            if reading.has_data() {
                reading.min = reading.value;
                reading.max = reading.value;
            }
        }
        debug!("Running extremes reset");
    }
}

impl Default for ValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_seeded_without_data() {
        let store = ValueStore::new();
        let rpm = store.reading(ChannelId::Rpm);
        assert_eq!(rpm.value, 800.0);
        assert_eq!(rpm.min, f64::INFINITY);
        assert_eq!(rpm.max, f64::NEG_INFINITY);
        assert_eq!(rpm.min(), None);
        assert_eq!(rpm.max(), None);
        assert_eq!(rpm.current(), None);
        assert!(rpm.updated_at.is_none());
        assert!(store.is_stale(ChannelId::Rpm, Duration::seconds(60)));
    }

    #[test]
    fn test_apply_raw_truncates() {
        let store = ValueStore::new();
        // 0x1AFB / 4 = 1726.75, precision 0
        assert_eq!(store.apply_raw(ChannelId::Rpm, 0x1AFB), 1726.0);
        // 0x1C / 2 - 64 = -50
        assert_eq!(store.apply_raw(ChannelId::Timing, 0x1C), -50.0);
        // (0x86 - 128) * 100 / 128 = 4.6875 -> 4.6
        assert_eq!(store.apply_raw(ChannelId::Stft, 0x86), 4.6);
    }

    #[test]
    fn test_display_value_uses_channel_precision() {
        let store = ValueStore::new();
        store.apply_raw(ChannelId::Rpm, 0x1AFB);
        store.apply_raw(ChannelId::Stft, 0x86);
        assert_eq!(store.reading(ChannelId::Rpm).display_value(), "1726");
        assert_eq!(store.reading(ChannelId::Stft).display_value(), "4.6");
        // seeded 12.0 V keeps its one decimal
        assert_eq!(store.reading(ChannelId::Voltage).display_value(), "12.0");
    }

    #[test]
    fn test_min_max_track_truncated_values() {
        let store = ValueStore::new();
        store.apply_raw(ChannelId::CoolantTemp, 130); // 90
        store.apply_raw(ChannelId::CoolantTemp, 110); // 70
        store.apply_raw(ChannelId::CoolantTemp, 125); // 85

        let reading = store.reading(ChannelId::CoolantTemp);
        assert_eq!(reading.value, 85.0);
        assert_eq!(reading.min(), Some(70.0));
        assert_eq!(reading.max(), Some(90.0));
        assert_eq!(reading.samples, 3);
        assert!(reading.min <= reading.value && reading.value <= reading.max);
    }

    #[test]
    fn test_idempotent_reapply() {
        let store = ValueStore::new();
        let samples = [
            RawSample { channel: ChannelId::Rpm, raw: 0x1AF8 },
            RawSample { channel: ChannelId::Boost, raw: 0x64 },
        ];
        assert_eq!(store.apply_samples(&samples), 2);
        let first = store.snapshot_of(&[ChannelId::Rpm, ChannelId::Boost]);
        store.apply_samples(&samples);
        let second = store.snapshot_of(&[ChannelId::Rpm, ChannelId::Boost]);

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.value, b.value);
            assert!(b.max >= a.max);
            assert!(b.min <= a.min);
        }
    }

    #[test]
    fn test_staleness() {
        let store = ValueStore::new();
        let then = Utc::now() - Duration::seconds(10);
        store.apply_raw_at(ChannelId::Speed, 50, then);

        let reading = store.reading(ChannelId::Speed);
        let now = Utc::now();
        assert!(reading.is_stale(now, Duration::seconds(5)));
        assert!(!reading.is_stale(now, Duration::seconds(60)));
        assert!(reading.age(now).unwrap() >= Duration::seconds(10));
    }

    #[test]
    fn test_reset_extremes() {
        let store = ValueStore::new();
        store.apply_raw(ChannelId::Speed, 20);
        store.apply_raw(ChannelId::Speed, 90);
        store.apply_raw(ChannelId::Speed, 50);
        store.reset_extremes();

        let reading = store.reading(ChannelId::Speed);
        assert_eq!(reading.value, 50.0);
        assert_eq!(reading.min(), Some(50.0));
        assert_eq!(reading.max(), Some(50.0));
        assert_eq!(store.reading(ChannelId::Rpm).min(), None);
    }

    #[test]
    fn test_snapshot_order_and_serialization() {
        let store = ValueStore::new();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), ChannelId::ALL.len());
        assert_eq!(snapshot[0].channel, ChannelId::ALL[0]);

        let json = serde_json::to_value(store.reading(ChannelId::Rpm)).unwrap();
        assert_eq!(json["channel"], "RPM");
        assert!(json["min"].is_null());
        assert!(json["max"].is_null());
    }
}
