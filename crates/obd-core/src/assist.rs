//! Driver assist evaluation
//!
//! Turns a store snapshot into coarse hints (eco driving, shift points,
//! warm-up, responsiveness, battery). Any assessment whose inputs have not
//! received a sample yet comes back as `None`.

use std::fmt;

use chrono::{DateTime, Utc};
use obd_conv::ChannelId;
use serde::Serialize;

use crate::store::ValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EcoDriving {
    Good,
    Inefficient,
    UpshiftRecommended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EcoStatus {
    pub driving: EcoDriving,
    /// LTFT below -5 %
    pub rich_trim: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShiftHint {
    None,
    Upshift,
    Downshift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarmUp {
    Cold,
    Warming,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResponsivenessLabel {
    Tuned,
    Ok,
    Heatsoaked,
    Dull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Responsiveness {
    pub score: u8,
    pub label: ResponsivenessLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatteryStatus {
    Ok,
    LowVoltage,
    Overcharging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThrottleStyle {
    Smooth,
    Moderate,
    Aggressive,
}

impl ThrottleStyle {
    /// Classify a throttle rate in %/s
    pub fn from_rate(rate: f64) -> Self {
        if rate > 100.0 {
            ThrottleStyle::Aggressive
        } else if rate > 20.0 {
            ThrottleStyle::Moderate
        } else {
            ThrottleStyle::Smooth
        }
    }
}

/// Everything the assist layer derived from one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssistReport {
    pub eco: Option<EcoStatus>,
    pub shift: Option<ShiftHint>,
    pub warm_up: Option<WarmUp>,
    pub responsiveness: Option<Responsiveness>,
    pub battery: Option<BatteryStatus>,
}

impl fmt::Display for AssistReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show<T: fmt::Debug>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "--".to_string(), |v| format!("{:?}", v))
        }
        write!(
            f,
            "eco={} shift={} warm_up={} responsiveness={} battery={}",
            show(&self.eco.map(|e| e.driving)),
            show(&self.shift),
            show(&self.warm_up),
            show(&self.responsiveness.map(|r| r.score)),
            show(&self.battery)
        )
    }
}

/// Current values of the channels the assist heuristics read
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AssistInputs {
    pub throttle: Option<f64>,
    pub load: Option<f64>,
    pub lambda: Option<f64>,
    pub rpm: Option<f64>,
    pub ltft: Option<f64>,
    pub stft: Option<f64>,
    pub coolant: Option<f64>,
    pub oil: Option<f64>,
    pub timing: Option<f64>,
    pub iat: Option<f64>,
    pub voltage: Option<f64>,
}

impl AssistInputs {
    pub fn from_store(store: &ValueStore) -> Self {
        let get = |c: ChannelId| store.reading(c).current();
        Self {
            throttle: get(ChannelId::Throttle),
            load: get(ChannelId::Load),
            lambda: get(ChannelId::Afr),
            rpm: get(ChannelId::Rpm),
            ltft: get(ChannelId::Ltft),
            stft: get(ChannelId::Stft),
            coolant: get(ChannelId::CoolantTemp),
            oil: get(ChannelId::OilTemp),
            timing: get(ChannelId::Timing),
            iat: get(ChannelId::Iat),
            voltage: get(ChannelId::Voltage),
        }
    }
}

/// Evaluate all hints from the store's current values
pub fn evaluate(store: &ValueStore) -> AssistReport {
    evaluate_inputs(&AssistInputs::from_store(store))
}

pub fn evaluate_inputs(i: &AssistInputs) -> AssistReport {
    AssistReport {
        eco: eco_status(i),
        shift: shift_hint(i),
        warm_up: warm_up(i),
        responsiveness: responsiveness(i),
        battery: i.voltage.map(battery_status),
    }
}

fn eco_status(i: &AssistInputs) -> Option<EcoStatus> {
    let (load, throttle, lambda, rpm, ltft) = (i.load?, i.throttle?, i.lambda?, i.rpm?, i.ltft?);
    let driving = if load > 80.0 || throttle > 70.0 || lambda < 0.95 {
        EcoDriving::Inefficient
    } else if throttle < 20.0 && rpm > 3000.0 {
        EcoDriving::UpshiftRecommended
    } else {
        EcoDriving::Good
    };
    Some(EcoStatus {
        driving,
        rich_trim: ltft < -5.0,
    })
}

fn shift_hint(i: &AssistInputs) -> Option<ShiftHint> {
    let (rpm, throttle, load) = (i.rpm?, i.throttle?, i.load?);
    Some(if rpm > 3500.0 && throttle < 30.0 {
        ShiftHint::Upshift
    } else if rpm < 1500.0 && load > 80.0 {
        ShiftHint::Downshift
    } else {
        ShiftHint::None
    })
}

fn warm_up(i: &AssistInputs) -> Option<WarmUp> {
    let (coolant, oil) = (i.coolant?, i.oil?);
    Some(if coolant < 70.0 || oil < 60.0 {
        WarmUp::Cold
    } else if coolant >= 85.0 && oil >= 85.0 {
        WarmUp::Ready
    } else {
        WarmUp::Warming
    })
}

fn responsiveness(i: &AssistInputs) -> Option<Responsiveness> {
    let (iat, ltft, stft, timing, load) = (i.iat?, i.ltft?, i.stft?, i.timing?, i.load?);
    let mut score: i32 = 100;
    if iat > 50.0 {
        score -= 20;
    }
    if ltft.abs() > 5.0 {
        score -= 20;
    }
    if stft.abs() > 5.0 {
        score -= 10;
    }
    if timing < 10.0 {
        score -= 15;
    }
    if load < 20.0 {
        score -= 10;
    }
    let score = score.clamp(0, 100) as u8;
    let label = match score {
        81..=100 => ResponsivenessLabel::Tuned,
        51..=80 => ResponsivenessLabel::Ok,
        31..=50 => ResponsivenessLabel::Heatsoaked,
        _ => ResponsivenessLabel::Dull,
    };
    Some(Responsiveness { score, label })
}

fn battery_status(voltage: f64) -> BatteryStatus {
    if voltage < 12.6 {
        BatteryStatus::LowVoltage
    } else if voltage > 14.7 {
        BatteryStatus::Overcharging
    } else {
        BatteryStatus::Ok
    }
}

/// Tracks throttle between reports to classify how it is being driven
#[derive(Debug, Default)]
pub struct ThrottleCoach {
    last: Option<(f64, DateTime<Utc>)>,
}

impl ThrottleCoach {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the latest throttle reading; needs two readings to say anything
    ///
    /// A reading that is not newer than the previous one is ignored.
    pub fn observe(&mut self, throttle: f64, at: DateTime<Utc>) -> Option<ThrottleStyle> {
        let Some((prev_throttle, prev_at)) = self.last else {
            self.last = Some((throttle, at));
            return None;
        };
        let elapsed = (at - prev_at).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 {
            return None;
        }
        self.last = Some((throttle, at));
        let rate = (throttle - prev_throttle).abs() / elapsed;
        Some(ThrottleStyle::from_rate(rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn cruising() -> AssistInputs {
        AssistInputs {
            throttle: Some(25.0),
            load: Some(40.0),
            lambda: Some(1.0),
            rpm: Some(2200.0),
            ltft: Some(1.5),
            stft: Some(-0.8),
            coolant: Some(90.0),
            oil: Some(92.0),
            timing: Some(18.0),
            iat: Some(30.0),
            voltage: Some(14.1),
        }
    }

    #[test]
    fn test_cruising_is_all_good() {
        let report = evaluate_inputs(&cruising());
        assert_eq!(
            report.eco,
            Some(EcoStatus {
                driving: EcoDriving::Good,
                rich_trim: false
            })
        );
        assert_eq!(report.shift, Some(ShiftHint::None));
        assert_eq!(report.warm_up, Some(WarmUp::Ready));
        assert_eq!(
            report.responsiveness,
            Some(Responsiveness {
                score: 100,
                label: ResponsivenessLabel::Tuned
            })
        );
        assert_eq!(report.battery, Some(BatteryStatus::Ok));
    }

    #[test]
    fn test_eco_rules() {
        let mut i = cruising();
        i.lambda = Some(0.9);
        assert_eq!(eco_status(&i).unwrap().driving, EcoDriving::Inefficient);

        let mut i = cruising();
        i.throttle = Some(10.0);
        i.rpm = Some(3200.0);
        assert_eq!(eco_status(&i).unwrap().driving, EcoDriving::UpshiftRecommended);

        let mut i = cruising();
        i.ltft = Some(-6.0);
        assert!(eco_status(&i).unwrap().rich_trim);
    }

    #[test]
    fn test_shift_hints() {
        let mut i = cruising();
        i.rpm = Some(3800.0);
        i.throttle = Some(15.0);
        assert_eq!(shift_hint(&i), Some(ShiftHint::Upshift));

        let mut i = cruising();
        i.rpm = Some(1200.0);
        i.load = Some(85.0);
        assert_eq!(shift_hint(&i), Some(ShiftHint::Downshift));
    }

    #[test]
    fn test_warm_up_bands() {
        let mut i = cruising();
        i.coolant = Some(20.0);
        i.oil = Some(15.0);
        assert_eq!(warm_up(&i), Some(WarmUp::Cold));
        i.coolant = Some(75.0);
        i.oil = Some(70.0);
        assert_eq!(warm_up(&i), Some(WarmUp::Warming));
    }

    #[test]
    fn test_responsiveness_penalties() {
        let mut i = cruising();
        i.iat = Some(55.0); // -20
        i.ltft = Some(12.0); // -20
        i.stft = Some(8.0); // -10
        let r = responsiveness(&i).unwrap();
        assert_eq!(r.score, 50);
        assert_eq!(r.label, ResponsivenessLabel::Heatsoaked);

        i.timing = Some(5.0); // -15
        i.load = Some(10.0); // -10
        let r = responsiveness(&i).unwrap();
        assert_eq!(r.score, 25);
        assert_eq!(r.label, ResponsivenessLabel::Dull);
    }

    #[test]
    fn test_battery() {
        assert_eq!(battery_status(11.8), BatteryStatus::LowVoltage);
        assert_eq!(battery_status(15.0), BatteryStatus::Overcharging);
        assert_eq!(battery_status(12.6), BatteryStatus::Ok);
    }

    #[test]
    fn test_missing_inputs_are_unknown() {
        let report = evaluate(&ValueStore::new());
        assert_eq!(report.eco, None);
        assert_eq!(report.battery, None);
        assert_eq!(
            report.to_string(),
            "eco=-- shift=-- warm_up=-- responsiveness=-- battery=--"
        );
    }

    #[test]
    fn test_throttle_coach() {
        let mut coach = ThrottleCoach::new();
        let t0 = Utc::now();
        assert_eq!(coach.observe(10.0, t0), None);
        assert_eq!(
            coach.observe(70.0, t0 + Duration::milliseconds(500)),
            Some(ThrottleStyle::Aggressive)
        );
        assert_eq!(
            coach.observe(75.0, t0 + Duration::milliseconds(1000)),
            Some(ThrottleStyle::Smooth)
        );
    }

    #[test]
    fn test_throttle_coach_ignores_stale_timestamps() {
        let mut coach = ThrottleCoach::new();
        let t0 = Utc::now();
        assert_eq!(coach.observe(10.0, t0), None);
        // clock stepped back, then the same sample again
        assert_eq!(coach.observe(90.0, t0 - Duration::milliseconds(500)), None);
        assert_eq!(coach.observe(10.0, t0), None);
        // rate is still measured from the t0 reading
        assert_eq!(
            coach.observe(12.0, t0 + Duration::milliseconds(1000)),
            Some(ThrottleStyle::Smooth)
        );
    }
}
