//! Matcher simulator configuration types.
//!
//! This module contains the configuration loaded from `rfm.toml`:
//! - `SimulatorConfig` - Root document
//! - `SimulationConfig` - Scheduler, noise and persistence settings
//! - `PlasmaConfig` / `CircuitConfig` - The fixed analog network
//! - `VswrConfig` / `AmsConfig` - Auto-matching thresholds and timing
//! - `StreamConfig` - Periodic report streams
//! - `MotorConfig` - Per-capacitor motor limits and capacitance curve
//!
//! Every section has defaults, so an empty file describes the reference bench.

use crate::config::{ConfigError, SharedConfig, Validate};
use crate::consts::{
    DEFAULT_CYCLE_MS, DEFAULT_FORWARD_POWER_W, DEFAULT_NOISE, DEFAULT_TICK_MS, MOTOR_COUNT,
    Z0_OHM,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

fn default_cycle_ms() -> u64 {
    DEFAULT_CYCLE_MS
}

fn default_noise() -> f64 {
    DEFAULT_NOISE
}

fn default_forward_power_w() -> f64 {
    DEFAULT_FORWARD_POWER_W
}

fn default_motors() -> Vec<MotorConfig> {
    vec![
        MotorConfig::with_position("vvc0", 32000),
        MotorConfig::with_position("vvc1", 17600),
    ]
}

/// Root configuration loaded from `rfm.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Logging and service identity.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Scheduler, sensor model and persistence.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Fixed load standing in for the plasma.
    #[serde(default)]
    pub plasma: PlasmaConfig,

    /// Fixed circuit constants of the five-stage network.
    #[serde(default)]
    pub circuit: CircuitConfig,

    /// VSWR hysteresis thresholds.
    #[serde(default)]
    pub vswr: VswrConfig,

    /// Auto-matching loop timing.
    #[serde(default)]
    pub ams: AmsConfig,

    /// Periodic report streams.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Motor configuration, VVC0 first, then VVC1.
    #[serde(default = "default_motors")]
    pub motors: Vec<MotorConfig>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            simulation: SimulationConfig::default(),
            plasma: PlasmaConfig::default(),
            circuit: CircuitConfig::default(),
            vswr: VswrConfig::default(),
            ams: AmsConfig::default(),
            stream: StreamConfig::default(),
            motors: default_motors(),
        }
    }
}

impl Validate for SimulatorConfig {
    /// # Validation Rules
    /// 1. Shared section valid
    /// 2. `tick_ms` > 0, `cycle_ms` > 0, noise within [0, 0.1], power > 0
    /// 3. VSWR thresholds within range and `restart` >= `stop`
    /// 4. Exactly two motors with unique names, each internally consistent
    ///    and covering at least one step per integrator tick
    /// 5. Circuit frequency and reference impedance positive
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.simulation.validate()?;
        self.plasma.validate()?;
        self.vswr.validate()?;
        self.circuit.validate()?;

        if self.motors.len() != MOTOR_COUNT {
            return Err(ConfigError::ValidationError(format!(
                "Expected {} motors, found {}",
                MOTOR_COUNT,
                self.motors.len()
            )));
        }

        let mut names = HashSet::new();
        for motor in &self.motors {
            motor.validate()?;
            let steps_per_tick = u64::from(motor.rpm) * u64::from(motor.steps_per_rpm_sec)
                * self.simulation.tick_ms
                / 1000;
            if steps_per_tick == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Motor '{}': rpm {} x steps_per_rpm_sec {} covers no step per {}ms tick",
                    motor.name, motor.rpm, motor.steps_per_rpm_sec, self.simulation.tick_ms
                )));
            }
            if !names.insert(motor.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate motor name: {}",
                    motor.name
                )));
            }
        }

        Ok(())
    }
}

/// Scheduler, sensor model and persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Motor integrator tick in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Scheduler resolution in milliseconds (sleep granularity of the run loop).
    #[serde(default = "default_cycle_ms")]
    pub cycle_ms: u64,

    /// Path to motor position persistence file.
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Relative amplitude of uniform sensor noise applied to every reported scalar.
    #[serde(default = "default_noise")]
    pub noise: f64,

    /// Seed for the noise generator. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Forward power assumed dissipated at the measurement point (W).
    #[serde(default = "default_forward_power_w")]
    pub forward_power_w: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            cycle_ms: DEFAULT_CYCLE_MS,
            state_file: None,
            noise: DEFAULT_NOISE,
            seed: None,
            forward_power_w: DEFAULT_FORWARD_POWER_W,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.tick_ms must be greater than 0".to_string(),
            ));
        }
        if self.cycle_ms == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.cycle_ms must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=0.1).contains(&self.noise) {
            return Err(ConfigError::ValidationError(format!(
                "simulation.noise must be within [0, 0.1], got {}",
                self.noise
            )));
        }
        if !(self.forward_power_w > 0.0 && self.forward_power_w.is_finite()) {
            return Err(ConfigError::ValidationError(
                "simulation.forward_power_w must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fixed load impedance standing in for the plasma sheath.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PlasmaConfig {
    /// Resistance (Ω).
    pub r: f64,
    /// Reactance (Ω).
    pub x: f64,
}

impl Default for PlasmaConfig {
    fn default() -> Self {
        Self { r: 9.0, x: 10.0 }
    }
}

impl PlasmaConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.r.is_finite() && self.x.is_finite()) || self.r < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "plasma must be finite with r >= 0, got r={} x={}",
                self.r, self.x
            )));
        }
        Ok(())
    }
}

/// Circuit constants in engineering units.
///
/// Converted once to SI by the simulator; never mutated at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitConfig {
    /// Operating frequency (Hz).
    pub freq_hz: f64,
    /// Input series inductance (nH).
    pub lp_nh: f64,
    /// Input shunt capacitance (pF).
    pub cp_pf: f64,
    /// Branch B inductance (nH).
    pub lb0_nh: f64,
    /// Branch B resistance (Ω).
    pub rb0_ohm: f64,
    /// Branch B shunt capacitance (pF).
    pub cb0_pf: f64,
    /// Stage C resistance (Ω).
    pub rc0_ohm: f64,
    /// Stage C inductance (µH).
    pub lc0_uh: f64,
    /// Stage C tank capacitance (pF).
    pub cc0_pf: f64,
    /// Stage C shunt capacitance (pF).
    pub cc1_pf: f64,
    /// Stage D shunt capacitance (pF).
    pub cd0_pf: f64,
    /// Stage E resistance (Ω).
    pub re0_ohm: f64,
    /// Stage E inductance (nH).
    pub le0_nh: f64,
    /// Reference impedance (Ω).
    pub z0_ohm: f64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            freq_hz: 13.56e6,
            lp_nh: 36.0,
            cp_pf: 15.3,
            lb0_nh: 157.0,
            rb0_ohm: 0.2,
            cb0_pf: 1.9,
            rc0_ohm: 0.2,
            lc0_uh: 1.03,
            cc0_pf: 2.0,
            cc1_pf: 1.5,
            cd0_pf: 31.0,
            re0_ohm: 0.2,
            le0_nh: 15.0,
            z0_ohm: Z0_OHM,
        }
    }
}

impl CircuitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.freq_hz <= 0.0 {
            return Err(ConfigError::ValidationError(
                "circuit.freq_hz must be greater than 0".to_string(),
            ));
        }
        if self.z0_ohm <= 0.0 {
            return Err(ConfigError::ValidationError(
                "circuit.z0_ohm must be greater than 0".to_string(),
            ));
        }
        let capacitors = [
            ("cp_pf", self.cp_pf),
            ("cb0_pf", self.cb0_pf),
            ("cc0_pf", self.cc0_pf),
            ("cc1_pf", self.cc1_pf),
            ("cd0_pf", self.cd0_pf),
        ];
        for (name, value) in capacitors {
            if value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "circuit.{name} must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

/// VSWR hysteresis thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VswrConfig {
    /// Stop matching when VSWR <= this.
    pub stop: f64,
    /// Restart matching when VSWR > this.
    pub restart: f64,
    /// Derive node C from the output sensor when VSWR > this.
    pub output_assist_above: f64,
}

impl Default for VswrConfig {
    fn default() -> Self {
        Self {
            stop: 1.02,
            restart: 1.04,
            output_assist_above: 2.0,
        }
    }
}

impl VswrConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1.0..=5.0).contains(&self.stop) {
            return Err(ConfigError::ValidationError(format!(
                "vswr.stop must be within [1, 5], got {}",
                self.stop
            )));
        }
        if !(1.0..=10.0).contains(&self.restart) {
            return Err(ConfigError::ValidationError(format!(
                "vswr.restart must be within [1, 10], got {}",
                self.restart
            )));
        }
        if self.restart < self.stop {
            return Err(ConfigError::ValidationError(format!(
                "vswr.restart ({}) must not be below vswr.stop ({})",
                self.restart, self.stop
            )));
        }
        Ok(())
    }
}

/// Auto-matching loop timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AmsConfig {
    /// Loop period in milliseconds.
    pub interval_ms: u64,
    /// Terminal timeout in milliseconds (0 = run until stopped).
    pub timeout_ms: u64,
    /// Emit status once every N loop ticks.
    pub log_interval: u32,
    /// Start the loop as soon as the simulator starts.
    pub auto_start: bool,
}

impl Default for AmsConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10,
            timeout_ms: 0,
            log_interval: 10,
            auto_start: false,
        }
    }
}

/// Periodic report streams. A period of 0 disables the stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Input/output impedance stream period (ms).
    pub impedance_ms: u64,
    /// Motor position stream period (ms).
    pub motor_position_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            impedance_ms: 0,
            motor_position_ms: 100,
        }
    }
}

/// Per-motor configuration for a variable vacuum capacitor drive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MotorConfig {
    /// Motor name (unique identifier, used for state persistence).
    pub name: String,

    /// Mechanical minimum position (steps).
    #[serde(default)]
    pub min_value: i32,

    /// Mechanical maximum position (steps).
    #[serde(default = "default_max_value")]
    pub max_value: i32,

    /// Lowest commandable position (steps).
    #[serde(default = "default_lower_limit")]
    pub lower_limit: i32,

    /// Highest commandable position (steps).
    #[serde(default = "default_upper_limit")]
    pub upper_limit: i32,

    /// Capacitance at `min_value` (pF).
    #[serde(default)]
    pub min_cap_pf: f64,

    /// Capacitance at `max_value` (pF).
    #[serde(default = "default_max_cap_pf")]
    pub max_cap_pf: f64,

    /// Normalized cubic fit `[a0, a1, a2, a3]` (pF). All zero = uncalibrated.
    #[serde(default)]
    pub fit_coeffs: [f64; 4],

    /// Travel speed while moving.
    #[serde(default = "default_rpm")]
    pub rpm: u32,

    /// Steps per second produced by one RPM.
    #[serde(default = "default_steps_per_rpm_sec")]
    pub steps_per_rpm_sec: u32,

    /// Position at startup when no persisted state exists (steps).
    #[serde(default = "default_initial_position")]
    pub initial_position: i32,
}

fn default_max_value() -> i32 {
    64000
}

fn default_lower_limit() -> i32 {
    4000
}

fn default_upper_limit() -> i32 {
    60000
}

fn default_max_cap_pf() -> f64 {
    1000.0
}

fn default_rpm() -> u32 {
    100
}

fn default_steps_per_rpm_sec() -> u32 {
    100
}

fn default_initial_position() -> i32 {
    32000
}

impl MotorConfig {
    /// Reference drive with the given name and start position.
    pub fn with_position(name: &str, initial_position: i32) -> Self {
        Self {
            name: name.to_string(),
            min_value: 0,
            max_value: default_max_value(),
            lower_limit: default_lower_limit(),
            upper_limit: default_upper_limit(),
            min_cap_pf: 0.0,
            max_cap_pf: default_max_cap_pf(),
            fit_coeffs: [0.0; 4],
            rpm: default_rpm(),
            steps_per_rpm_sec: default_steps_per_rpm_sec(),
            initial_position,
        }
    }

    /// True when any fit coefficient is non-zero.
    pub fn is_fit_calibrated(&self) -> bool {
        self.fit_coeffs.iter().any(|c| *c != 0.0)
    }

    /// Validate the motor configuration.
    ///
    /// # Validation Rules
    /// 1. `name` not empty
    /// 2. `min_value` < `max_value`
    /// 3. `min_value` <= `lower_limit` < `upper_limit` <= `max_value`
    /// 4. `min_cap_pf` < `max_cap_pf`
    /// 5. `initial_position` within [`min_value`, `max_value`]
    /// 6. `steps_per_rpm_sec` > 0 and `rpm` > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "Motor has empty name".to_string(),
            ));
        }
        if self.min_value >= self.max_value {
            return Err(ConfigError::ValidationError(format!(
                "Motor '{}': min_value ({}) must be below max_value ({})",
                self.name, self.min_value, self.max_value
            )));
        }
        if self.lower_limit < self.min_value
            || self.upper_limit > self.max_value
            || self.lower_limit >= self.upper_limit
        {
            return Err(ConfigError::ValidationError(format!(
                "Motor '{}': limits [{}, {}] must be ordered and inside [{}, {}]",
                self.name, self.lower_limit, self.upper_limit, self.min_value, self.max_value
            )));
        }
        if self.min_cap_pf >= self.max_cap_pf {
            return Err(ConfigError::ValidationError(format!(
                "Motor '{}': min_cap_pf ({}) must be below max_cap_pf ({})",
                self.name, self.min_cap_pf, self.max_cap_pf
            )));
        }
        if self.initial_position < self.min_value || self.initial_position > self.max_value {
            return Err(ConfigError::ValidationError(format!(
                "Motor '{}': initial_position {} outside [{}, {}]",
                self.name, self.initial_position, self.min_value, self.max_value
            )));
        }
        if self.rpm == 0 {
            return Err(ConfigError::ValidationError(format!(
                "Motor '{}': rpm must be greater than 0",
                self.name
            )));
        }
        if self.steps_per_rpm_sec == 0 {
            return Err(ConfigError::ValidationError(format!(
                "Motor '{}': steps_per_rpm_sec must be greater than 0",
                self.name
            )));
        }
        Ok(())
    }
}
