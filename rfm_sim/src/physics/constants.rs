//! Circuit constants in SI units.

use rfm::matcher::config::CircuitConfig;
use std::f64::consts::PI;

const NANO: f64 = 1e-9;
const MICRO: f64 = 1e-6;
const PICO: f64 = 1e-12;

/// Converts picofarads to farads.
#[inline]
pub fn pf(value: f64) -> f64 {
    value * PICO
}

/// Fixed element values of the five-stage matching network.
///
/// Built once from [`CircuitConfig`]; immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitConstants {
    /// Operating frequency (Hz)
    pub frequency: f64,
    /// Angular frequency ω = 2πf (rad/s)
    pub omega: f64,
    pub lp: f64,
    pub cp: f64,
    pub lb0: f64,
    pub rb0: f64,
    pub cb0: f64,
    pub rc0: f64,
    pub lc0: f64,
    pub cc0: f64,
    pub cc1: f64,
    pub cd0: f64,
    pub re0: f64,
    pub le0: f64,
    /// Reference impedance (Ω)
    pub z0: f64,
}

impl CircuitConstants {
    /// Convert engineering-unit configuration to SI.
    pub fn from_config(config: &CircuitConfig) -> Self {
        Self {
            frequency: config.freq_hz,
            omega: 2.0 * PI * config.freq_hz,
            lp: config.lp_nh * NANO,
            cp: pf(config.cp_pf),
            lb0: config.lb0_nh * NANO,
            rb0: config.rb0_ohm,
            cb0: pf(config.cb0_pf),
            rc0: config.rc0_ohm,
            lc0: config.lc0_uh * MICRO,
            cc0: pf(config.cc0_pf),
            cc1: pf(config.cc1_pf),
            cd0: pf(config.cd0_pf),
            re0: config.re0_ohm,
            le0: config.le0_nh * NANO,
            z0: config.z0_ohm,
        }
    }
}

impl Default for CircuitConstants {
    fn default() -> Self {
        Self::from_config(&CircuitConfig::default())
    }
}
