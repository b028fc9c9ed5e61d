//! Vehicle physics model
//!
//! A small scenario state machine driving a handful of continuous variables.
//! Time is injected: [`PhysicsModel::tick`] takes the elapsed simulation time,
//! so scenario cycling can be tested without sleeping.
//!
//! Scenarios cycle ColdStart → NormalEco → Aggressive → Issues → ColdStart on a
//! fixed period. Entering a scenario applies that scenario's resets; every tick
//! then drifts the variables toward the scenario's bands. Speed, manifold
//! pressure, load, timing and MAF are pure functions of rpm and throttle.

use std::time::Duration;

use obd_conv::ChannelId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const RPM_MAX: f64 = 7200.0;
const ATMOSPHERE_KPA: f64 = 100.0;
const KPA_TO_PSI: f64 = 0.145;
const PSI_OFFSET: f64 = 14.5;
/// Chance per tick of picking a new throttle target
const THROTTLE_RETARGET_CHANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    #[default]
    ColdStart,
    NormalEco,
    Aggressive,
    Issues,
}

impl Scenario {
    pub const ORDER: [Scenario; 4] = [
        Scenario::ColdStart,
        Scenario::NormalEco,
        Scenario::Aggressive,
        Scenario::Issues,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::ColdStart => "cold_start",
            Scenario::NormalEco => "normal_eco",
            Scenario::Aggressive => "aggressive",
            Scenario::Issues => "issues",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Scenario::ColdStart => Scenario::NormalEco,
            Scenario::NormalEco => Scenario::Aggressive,
            Scenario::Aggressive => Scenario::Issues,
            Scenario::Issues => Scenario::ColdStart,
        }
    }

    /// Variables forced on entry
    pub fn entry_resets(self) -> &'static [Reset] {
        match self {
            Scenario::ColdStart => COLD_START_RESETS,
            Scenario::NormalEco => NORMAL_ECO_RESETS,
            Scenario::Aggressive => AGGRESSIVE_RESETS,
            Scenario::Issues => ISSUES_RESETS,
        }
    }

    fn profile(self) -> Profile {
        match self {
            Scenario::ColdStart => Profile {
                throttle: (0.0, 8.0),
                idle_rpm: 1200.0,
                rpm_per_throttle: 20.0,
                rpm_noise: 20.0,
                coolant: 90.0,
                oil: 95.0,
                intake: 25.0,
                warm_rate: 0.15,
                voltage: (14.2, 14.6),
                stft: (-1.0, 1.0),
                ltft: 2.3,
            },
            Scenario::NormalEco => Profile {
                throttle: (10.0, 35.0),
                idle_rpm: 800.0,
                rpm_per_throttle: 60.0,
                rpm_noise: 30.0,
                coolant: 90.0,
                oil: 95.0,
                intake: 30.0,
                warm_rate: 0.05,
                voltage: (13.8, 14.2),
                stft: (-2.0, 2.0),
                ltft: 2.3,
            },
            Scenario::Aggressive => Profile {
                throttle: (40.0, 100.0),
                idle_rpm: 800.0,
                rpm_per_throttle: 60.0,
                rpm_noise: 60.0,
                coolant: 100.0,
                oil: 110.0,
                intake: 55.0,
                warm_rate: 0.08,
                voltage: (13.6, 14.0),
                stft: (-4.0, 4.0),
                ltft: 2.3,
            },
            Scenario::Issues => Profile {
                throttle: (5.0, 30.0),
                idle_rpm: 800.0,
                rpm_per_throttle: 50.0,
                rpm_noise: 300.0,
                coolant: 95.0,
                oil: 100.0,
                intake: 40.0,
                warm_rate: 0.05,
                voltage: (11.6, 12.2),
                stft: (8.0, 15.0),
                ltft: 12.0,
            },
        }
    }
}

const COLD_START_RESETS: &[Reset] = &[
    Reset::new(Variable::Coolant, 20.0),
    Reset::new(Variable::Oil, 15.0),
    Reset::new(Variable::Intake, 18.0),
    Reset::new(Variable::Voltage, 12.4),
    Reset::new(Variable::Stft, 0.0),
    Reset::new(Variable::Ltft, 2.3),
];
const NORMAL_ECO_RESETS: &[Reset] = &[Reset::new(Variable::Stft, 0.0)];
const AGGRESSIVE_RESETS: &[Reset] = &[Reset::new(Variable::Intake, 35.0)];
// charging fault plus a lean condition the ECU is trimming out
const ISSUES_RESETS: &[Reset] = &[
    Reset::new(Variable::Voltage, 11.8),
    Reset::new(Variable::Stft, 8.0),
    Reset::new(Variable::Ltft, 12.0),
];

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-scenario bands the variables drift toward
#[derive(Debug, Clone, Copy)]
struct Profile {
    throttle: (f64, f64),
    idle_rpm: f64,
    rpm_per_throttle: f64,
    rpm_noise: f64,
    coolant: f64,
    oil: f64,
    intake: f64,
    warm_rate: f64,
    voltage: (f64, f64),
    stft: (f64, f64),
    ltft: f64,
}

/// Continuous variables a scenario entry may force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Variable {
    Coolant,
    Oil,
    Intake,
    Voltage,
    Stft,
    Ltft,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reset {
    pub variable: Variable,
    pub value: f64,
}

impl Reset {
    pub const fn new(variable: Variable, value: f64) -> Self {
        Self { variable, value }
    }
}

/// One scenario change
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub from: Scenario,
    pub to: Scenario,
    /// Simulation time the new scenario started at
    pub at: Duration,
}

/// Transition table: what happens after `elapsed` in `scenario`
pub fn transition(scenario: Scenario, elapsed: Duration, period: Duration) -> Option<(Scenario, &'static [Reset])> {
    if elapsed >= period {
        let next = scenario.next();
        Some((next, next.entry_resets()))
    } else {
        None
    }
}

/// Snapshot of the simulated vehicle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleState {
    pub rpm: f64,
    /// km/h
    pub speed: f64,
    /// %
    pub throttle: f64,
    /// °C
    pub coolant: f64,
    pub oil: f64,
    pub intake: f64,
    pub voltage: f64,
    /// %
    pub load: f64,
    /// Manifold absolute pressure, kPa
    pub map_kpa: f64,
    pub baro_kpa: f64,
    /// Degrees before TDC
    pub timing: f64,
    pub stft: f64,
    pub ltft: f64,
    /// g/s
    pub maf: f64,
    /// Commanded equivalence ratio
    pub lambda: f64,
    pub scenario: Scenario,
    /// Simulation time the current scenario was entered
    pub scenario_entered: Duration,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            rpm: 800.0,
            speed: 0.0,
            throttle: 0.0,
            coolant: 85.0,
            oil: 90.0,
            intake: 30.0,
            voltage: 14.1,
            load: 20.0,
            map_kpa: ATMOSPHERE_KPA,
            baro_kpa: ATMOSPHERE_KPA,
            timing: 15.0,
            stft: 0.0,
            ltft: 2.3,
            maf: 5.0,
            lambda: 1.0,
            scenario: Scenario::ColdStart,
            scenario_entered: Duration::ZERO,
        }
    }
}

impl VehicleState {
    /// Current value in the channel's registry units
    pub fn value(&self, id: ChannelId) -> f64 {
        match id {
            ChannelId::Rpm => self.rpm,
            ChannelId::Speed => self.speed,
            ChannelId::Throttle => self.throttle,
            ChannelId::CoolantTemp => self.coolant,
            ChannelId::OilTemp => self.oil,
            ChannelId::Iat => self.intake,
            ChannelId::Voltage => self.voltage,
            ChannelId::Load => self.load,
            ChannelId::Boost => self.map_kpa * KPA_TO_PSI - PSI_OFFSET,
            ChannelId::BarometricPressure => self.baro_kpa * KPA_TO_PSI - PSI_OFFSET,
            ChannelId::Timing => self.timing,
            ChannelId::Stft => self.stft,
            ChannelId::Ltft => self.ltft,
            ChannelId::Maf => self.maf,
            ChannelId::Afr => self.lambda,
        }
    }

    pub fn apply(&mut self, reset: &Reset) {
        let slot = match reset.variable {
            Variable::Coolant => &mut self.coolant,
            Variable::Oil => &mut self.oil,
            Variable::Intake => &mut self.intake,
            Variable::Voltage => &mut self.voltage,
            Variable::Stft => &mut self.stft,
            Variable::Ltft => &mut self.ltft,
        };
        *slot = reset.value;
    }

    /// Recompute the channels that follow from rpm and throttle
    fn derive(&mut self) {
        self.speed = if self.rpm > 1000.0 { self.rpm / 200.0 } else { 0.0 };
        self.map_kpa = if self.throttle > 50.0 {
            ATMOSPHERE_KPA + (self.throttle - 50.0) * 2.0
        } else {
            30.0 + self.throttle * 1.4
        };
        self.load = (self.throttle * 0.7 + self.rpm / RPM_MAX * 30.0).clamp(0.0, 100.0);
        let boost_retard = (self.map_kpa - ATMOSPHERE_KPA).max(0.0) * 0.15;
        self.timing = (10.0 + self.rpm / 400.0 - boost_retard).clamp(-20.0, 60.0);
        self.maf = self.rpm * self.map_kpa / 20_000.0;
    }
}

/// Tunables for the model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsConfig {
    /// How long each scenario lasts
    pub scenario_period: Duration,
    /// First-order rpm smoothing factor, 0..1
    pub smoothing: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            scenario_period: Duration::from_secs(30),
            smoothing: 0.15,
        }
    }
}

/// Owns the vehicle state; the physics tick is its only writer
pub struct PhysicsModel {
    state: VehicleState,
    config: PhysicsConfig,
    rng: StdRng,
    throttle_target: f64,
}

impl PhysicsModel {
    /// New model starting in `scenario` at time zero
    pub fn new(config: PhysicsConfig, scenario: Scenario, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut state = VehicleState {
            scenario,
            ..VehicleState::default()
        };
        for reset in scenario.entry_resets() {
            state.apply(reset);
        }
        state.derive();

        Self {
            state,
            config,
            rng,
            throttle_target: 0.0,
        }
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn scenario(&self) -> Scenario {
        self.state.scenario
    }

    /// Advance scenarios to `now`, then run one physics step
    pub fn tick(&mut self, now: Duration) -> Vec<Transition> {
        let transitions = self.advance_to(now);
        self.step();
        transitions
    }

    /// Apply every scenario transition due by `now`
    ///
    /// Scenario boundaries stay on the fixed period grid, so a late call
    /// catches up by several steps instead of drifting.
    pub fn advance_to(&mut self, now: Duration) -> Vec<Transition> {
        let mut transitions = Vec::new();
        let period = self.config.scenario_period;
        if period.is_zero() {
            return transitions;
        }

        loop {
            let elapsed = now.saturating_sub(self.state.scenario_entered);
            let Some((next, resets)) = transition(self.state.scenario, elapsed, period) else {
                break;
            };
            for reset in resets {
                self.state.apply(reset);
            }
            let from = self.state.scenario;
            self.state.scenario = next;
            self.state.scenario_entered += period;
            transitions.push(Transition {
                from,
                to: next,
                at: self.state.scenario_entered,
            });
        }
        transitions
    }

    /// One physics step under the current scenario
    fn step(&mut self) {
        let profile = self.state.scenario.profile();
        let (lo, hi) = profile.throttle;

        if self.rng.gen_bool(THROTTLE_RETARGET_CHANCE)
            || !(lo..=hi).contains(&self.throttle_target)
        {
            self.throttle_target = self.rng.gen_range(lo..=hi);
        }
        let s = &mut self.state;
        s.throttle = (s.throttle + (self.throttle_target - s.throttle) * 0.2).clamp(0.0, 100.0);

        let noise = self.rng.gen_range(-profile.rpm_noise..=profile.rpm_noise);
        let target_rpm = profile.idle_rpm + s.throttle * profile.rpm_per_throttle + noise;
        s.rpm = (s.rpm + (target_rpm - s.rpm) * self.config.smoothing).clamp(0.0, RPM_MAX);

        s.coolant = approach(s.coolant, profile.coolant, profile.warm_rate);
        s.oil = approach(s.oil, profile.oil, profile.warm_rate * 0.7);
        s.intake = approach(s.intake, profile.intake, 0.05);
        s.voltage = self.rng.gen_range(profile.voltage.0..=profile.voltage.1);
        let stft_target = self.rng.gen_range(profile.stft.0..=profile.stft.1);
        s.stft = approach(s.stft, stft_target, 0.5);
        s.ltft = approach(s.ltft, profile.ltft, 0.01);
        s.lambda = if s.scenario == Scenario::Aggressive && s.throttle > 70.0 {
            0.85
        } else if s.scenario == Scenario::ColdStart {
            0.95
        } else {
            1.0
        };

        self.state.derive();
    }
}

/// Move `current` toward `target` by at most `rate`
fn approach(current: f64, target: f64, rate: f64) -> f64 {
    if (target - current).abs() <= rate {
        target
    } else if target > current {
        current + rate
    } else {
        current - rate
    }
}
