//! Reverse network evaluator (load → source).
//!
//! Walks the fixed topology from the plasma load to the measurement port:
//!
//! ```text
//! ZE = Zp + RE0 + jωLE0
//! ZD = (ZE ‖ CD0) + VVC1
//! ZC = (ZD ‖ CC1) + ((RC0 + jωLC0) ‖ CC0)
//! ZB = VVC0 + ((RB0 + jωLB0) ‖ CB0)
//! ZA = ZC ‖ ZB
//! Zm = jωLp + (ZA ‖ Cp)
//! ```
//!
//! [`NetworkSimulator`] turns the resulting impedance into a sensor sample
//! under a constant forward-power assumption and applies uniform
//! multiplicative noise to every reported scalar.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rfm::consts::MIN_SENSE_RESISTANCE_OHM;
use rfm::matcher::config::SimulatorConfig;
use rfm::matcher::types::SensorReading;
use tracing::debug;

use super::constants::{CircuitConstants, pf};
use super::impedance::Impedance;

/// Node impedances produced by one reverse walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkNodes {
    pub a: Impedance,
    pub b: Impedance,
    pub c: Impedance,
    pub d: Impedance,
    pub e: Impedance,
    /// Impedance at the measurement port.
    pub input: Impedance,
}

/// Branch B: VVC0 in series with the `(RB0 + jωLB0) ‖ CB0` tank.
pub fn branch_b(k: &CircuitConstants, vvc0_pf: f64) -> Impedance {
    let w = k.omega;
    let tank = (Impedance::resistor(k.rb0) + Impedance::inductor(k.lb0, w))
        .parallel(Impedance::capacitor(k.cb0, w));
    Impedance::capacitor(pf(vvc0_pf), w) + tank
}

/// Walk load → node C through stages E and D with the live VVC1 value.
pub fn node_c_from_load(k: &CircuitConstants, load: Impedance, vvc1_pf: f64) -> Impedance {
    let w = k.omega;
    let ze = load + Impedance::new(k.re0, w * k.le0);
    let zd = ze.parallel(Impedance::capacitor(k.cd0, w)) + Impedance::capacitor(pf(vvc1_pf), w);
    node_c_from_d(k, zd)
}

fn node_c_from_d(k: &CircuitConstants, zd: Impedance) -> Impedance {
    let w = k.omega;
    let tank = (Impedance::resistor(k.rc0) + Impedance::inductor(k.lc0, w))
        .parallel(Impedance::capacitor(k.cc0, w));
    zd.parallel(Impedance::capacitor(k.cc1, w)) + tank
}

/// Full reverse walk for the given load and capacitor values (pF).
pub fn reverse_chain(
    k: &CircuitConstants,
    load: Impedance,
    vvc0_pf: f64,
    vvc1_pf: f64,
) -> NetworkNodes {
    let w = k.omega;
    let e = load + Impedance::new(k.re0, w * k.le0);
    let d = e.parallel(Impedance::capacitor(k.cd0, w)) + Impedance::capacitor(pf(vvc1_pf), w);
    let c = node_c_from_d(k, d);
    let b = branch_b(k, vvc0_pf);
    let a = c.parallel(b);
    let input = Impedance::inductor(k.lp, w) + a.parallel(Impedance::capacitor(k.cp, w));
    NetworkNodes {
        a,
        b,
        c,
        d,
        e,
        input,
    }
}

/// Source of sensor samples for the auto-matching loop.
pub trait ImpedanceProbe {
    /// Sample the input port with the given capacitor values (pF).
    fn input_reading(&mut self, vvc0_pf: f64, vvc1_pf: f64) -> SensorReading;

    /// Sample the load side, if an output sensor exists.
    fn output_reading(&mut self) -> Option<SensorReading>;
}

/// Simulated V/I sensors on both sides of the matching network.
pub struct NetworkSimulator {
    constants: CircuitConstants,
    plasma: Impedance,
    forward_power_w: f64,
    noise: f64,
    rng: StdRng,
}

impl NetworkSimulator {
    /// Create a noiseless simulator.
    pub fn new(constants: CircuitConstants, plasma: Impedance, forward_power_w: f64) -> Self {
        Self {
            constants,
            plasma,
            forward_power_w,
            noise: 0.0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Enable relative uniform noise of ±`noise` on every reported scalar.
    ///
    /// `seed = None` seeds from OS entropy.
    pub fn with_noise(mut self, noise: f64, seed: Option<u64>) -> Self {
        self.noise = noise;
        self.rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self
    }

    /// Build from the simulator configuration.
    pub fn from_config(config: &SimulatorConfig) -> Self {
        let constants = CircuitConstants::from_config(&config.circuit);
        let plasma = Impedance::new(config.plasma.r, config.plasma.x);
        debug!(
            "Network simulator: plasma={:.2}{:+.2}j Ω, noise={}, power={}W",
            plasma.r(),
            plasma.x(),
            config.simulation.noise,
            config.simulation.forward_power_w
        );
        Self::new(constants, plasma, config.simulation.forward_power_w)
            .with_noise(config.simulation.noise, config.simulation.seed)
    }

    /// Circuit constants in use.
    pub fn constants(&self) -> &CircuitConstants {
        &self.constants
    }

    /// Current load impedance.
    pub fn plasma(&self) -> Impedance {
        self.plasma
    }

    /// Replace the load impedance.
    pub fn set_plasma(&mut self, plasma: Impedance) {
        self.plasma = plasma;
    }

    /// Exact node impedances for the given capacitor values (pF).
    pub fn nodes(&self, vvc0_pf: f64, vvc1_pf: f64) -> NetworkNodes {
        reverse_chain(&self.constants, self.plasma, vvc0_pf, vvc1_pf)
    }

    /// Exact (noiseless) input-port impedance.
    pub fn input_impedance_exact(&self, vvc0_pf: f64, vvc1_pf: f64) -> Impedance {
        self.nodes(vvc0_pf, vvc1_pf).input
    }

    /// Sensor sample at the input port.
    pub fn calculate_input_impedance(&mut self, vvc0_pf: f64, vvc1_pf: f64) -> SensorReading {
        let z = self.input_impedance_exact(vvc0_pf, vvc1_pf);
        self.reading(z)
    }

    /// Sensor sample at the load.
    pub fn calculate_output_impedance(&mut self) -> SensorReading {
        self.reading(self.plasma)
    }

    /// Derive V/I at constant forward power, then apply noise.
    fn reading(&mut self, z: Impedance) -> SensorReading {
        let current = (self.forward_power_w / z.r().max(MIN_SENSE_RESISTANCE_OHM)).sqrt();
        let voltage = z.magnitude() * current;
        SensorReading {
            r: self.jitter(z.r()),
            x: self.jitter(z.x()),
            v: self.jitter(voltage),
            i: self.jitter(current),
            phase_deg: self.jitter(z.phase_deg()),
        }
    }

    fn jitter(&mut self, value: f64) -> f64 {
        if self.noise <= 0.0 {
            return value;
        }
        value * (1.0 + self.rng.gen_range(-self.noise..=self.noise))
    }
}

impl ImpedanceProbe for NetworkSimulator {
    fn input_reading(&mut self, vvc0_pf: f64, vvc1_pf: f64) -> SensorReading {
        self.calculate_input_impedance(vvc0_pf, vvc1_pf)
    }

    fn output_reading(&mut self) -> Option<SensorReading> {
        Some(self.calculate_output_impedance())
    }
}
