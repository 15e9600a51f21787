//! Motor position integrator for the variable vacuum capacitors.
//!
//! Each `MotorSimulator` is a discrete fixed-tick model of a stepper drive:
//! - **Idle**: `position == target`, `rpm == 0`
//! - **Moving**: `position != target`, `rpm > 0`
//!
//! Every tick moves `min(|remaining|, floor(rpm · steps_per_rpm_sec · tick_ms / 1000))`
//! steps toward the target; `rpm` drops to zero on the tick that arrives.
//!
//! The motor also owns its capacitance curve (step → pF) and its inverse.

use rfm::matcher::config::MotorConfig;
use rfm::matcher::types::MotorReport;
use tracing::{debug, trace, warn};

/// Newton–Raphson iteration cap for the capacitance inverse.
pub const NEWTON_MAX_ITERATIONS: usize = 20;

/// Newton–Raphson convergence tolerance (pF).
pub const NEWTON_TOLERANCE_PF: f64 = 0.1;

/// Simulated stepper drive of one variable vacuum capacitor.
#[derive(Debug, Clone)]
pub struct MotorSimulator {
    /// Motor configuration
    config: MotorConfig,
    /// Current position (steps)
    position: i32,
    /// Commanded position (steps)
    target: i32,
    /// Current speed, 0 while idle
    rpm: u32,
}

impl MotorSimulator {
    /// Create a motor resting at its configured initial position.
    pub fn new(config: MotorConfig) -> Self {
        let position = config
            .initial_position
            .clamp(config.min_value, config.max_value);
        Self {
            config,
            position,
            target: position,
            rpm: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &MotorConfig {
        &self.config
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    pub fn is_moving(&self) -> bool {
        self.position != self.target
    }

    /// Command a new target, clamped to `[lower_limit, upper_limit]`.
    ///
    /// Returns the target actually applied.
    pub fn move_to(&mut self, target: i32) -> i32 {
        let clamped = target.clamp(self.config.lower_limit, self.config.upper_limit);
        if clamped != target {
            warn!(
                "Motor {}: target {} clamped to {} (limits [{}, {}])",
                self.config.name, target, clamped, self.config.lower_limit, self.config.upper_limit
            );
        }
        self.target = clamped;
        self.rpm = if self.position == clamped {
            0
        } else {
            self.config.rpm
        };
        debug!(
            "Motor {}: move {} -> {} at {} rpm",
            self.config.name, self.position, clamped, self.rpm
        );
        clamped
    }

    /// Re-base the position counter. Stops any motion.
    pub fn set_origin(&mut self, position: i32) {
        let position = position.clamp(self.config.min_value, self.config.max_value);
        self.position = position;
        self.target = position;
        self.rpm = 0;
        debug!("Motor {}: origin set to {}", self.config.name, position);
    }

    /// Steps covered in one tick at the current speed.
    pub fn steps_per_update(&self, tick_ms: u64) -> i32 {
        let steps =
            u64::from(self.rpm) * u64::from(self.config.steps_per_rpm_sec) * tick_ms / 1000;
        i32::try_from(steps).unwrap_or(i32::MAX)
    }

    /// Advance one tick. Returns true when the position changed.
    pub fn update(&mut self, tick_ms: u64) -> bool {
        let remaining = self.target - self.position;
        if remaining == 0 {
            self.rpm = 0;
            return false;
        }

        let step = remaining.abs().min(self.steps_per_update(tick_ms));
        if step == 0 {
            return false;
        }

        self.position += step * remaining.signum();
        if self.position == self.target {
            self.rpm = 0;
        }

        trace!(
            "Motor {}: pos={}, target={}, rpm={}",
            self.config.name, self.position, self.target, self.rpm
        );
        true
    }

    /// Capacitance (pF) at a step position.
    ///
    /// Uses the normalized cubic fit when calibrated, linear interpolation
    /// between `min_cap_pf` and `max_cap_pf` otherwise.
    pub fn capacitance_at(&self, step: i32) -> f64 {
        let x = self.normalize(step);
        if self.config.is_fit_calibrated() {
            self.fit(x)
        } else {
            self.config.min_cap_pf
                + x.clamp(0.0, 1.0) * (self.config.max_cap_pf - self.config.min_cap_pf)
        }
    }

    /// Capacitance (pF) at the current position.
    pub fn capacitance(&self) -> f64 {
        self.capacitance_at(self.position)
    }

    /// True when `cap_pf` lies within `[min_cap_pf, max_cap_pf]`.
    pub fn accepts_capacitance(&self, cap_pf: f64) -> bool {
        cap_pf >= self.config.min_cap_pf && cap_pf <= self.config.max_cap_pf
    }

    /// Step position that produces `cap_pf`, clamped to the commandable limits.
    pub fn position_for_capacitance(&self, cap_pf: f64) -> i32 {
        let lower = self.normalize(self.config.lower_limit);
        let upper = self.normalize(self.config.upper_limit);

        let x = if self.config.is_fit_calibrated() {
            self.newton(cap_pf, lower, upper)
        } else {
            let span = self.config.max_cap_pf - self.config.min_cap_pf;
            ((cap_pf - self.config.min_cap_pf) / span).clamp(lower, upper)
        };

        self.denormalize(x)
            .clamp(self.config.lower_limit, self.config.upper_limit)
    }

    /// Position as a percentage of the mechanical range, clamped to 0..=100.
    pub fn position_percent(&self) -> f64 {
        (self.normalize(self.position) * 100.0).clamp(0.0, 100.0)
    }

    /// Snapshot for the motor position stream.
    pub fn report(&self) -> MotorReport {
        MotorReport {
            name: self.config.name.clone(),
            position: self.position,
            target: self.target,
            percent: self.position_percent(),
            cap_pf: self.capacitance(),
            moving: self.is_moving(),
        }
    }

    fn span(&self) -> f64 {
        f64::from(self.config.max_value - self.config.min_value)
    }

    fn normalize(&self, step: i32) -> f64 {
        f64::from(step - self.config.min_value) / self.span()
    }

    fn denormalize(&self, x: f64) -> i32 {
        let step = f64::from(self.config.min_value) + x * self.span();
        step.round() as i32
    }

    fn fit(&self, x: f64) -> f64 {
        let [a0, a1, a2, a3] = self.config.fit_coeffs;
        ((a3 * x + a2) * x + a1) * x + a0
    }

    fn fit_slope(&self, x: f64) -> f64 {
        let [_, a1, a2, a3] = self.config.fit_coeffs;
        (3.0 * a3 * x + 2.0 * a2) * x + a1
    }

    /// Bounded Newton–Raphson on the normalized fit, starting mid-range.
    fn newton(&self, cap_pf: f64, lower: f64, upper: f64) -> f64 {
        let mut x = (lower + upper) / 2.0;
        for _ in 0..NEWTON_MAX_ITERATIONS {
            let error = self.fit(x) - cap_pf;
            if error.abs() < NEWTON_TOLERANCE_PF {
                break;
            }
            let slope = self.fit_slope(x);
            if slope.abs() < 1e-12 {
                break;
            }
            x = (x - error / slope).clamp(lower, upper);
        }
        x
    }
}
