//! System-wide constants for the RFM workspace.
//!
//! Single source of truth for reference impedance, sentinels, default
//! timing and default paths. Imported by all crates.

/// Reference (characteristic) impedance in ohms.
pub const Z0_OHM: f64 = 50.0;

/// VSWR reported when the reflection coefficient is degenerate (|Γ| ≥ 1).
pub const VSWR_SENTINEL: f64 = 999.0;

/// Number of motor-driven vacuum capacitors in the network (VVC0, VVC1).
pub const MOTOR_COUNT: usize = 2;

/// Default motor integrator tick in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 20;

/// Default scheduler resolution in milliseconds.
pub const DEFAULT_CYCLE_MS: u64 = 5;

/// Default forward power assumed at the measurement point (W).
pub const DEFAULT_FORWARD_POWER_W: f64 = 1000.0;

/// Default relative amplitude of the uniform sensor noise (±0.1 %).
pub const DEFAULT_NOISE: f64 = 0.001;

/// Smallest resistance used when deriving current from forward power.
pub const MIN_SENSE_RESISTANCE_OHM: f64 = 0.1;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rfm/rfm.toml";

/// Canonical service name used in logging.
pub const SIM_SERVICE_NAME: &str = "rfm_sim";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(Z0_OHM > 0.0);
        assert!(VSWR_SENTINEL > 1.0);
        assert_eq!(MOTOR_COUNT, 2);
        assert!(DEFAULT_TICK_MS > 0);
        assert!(DEFAULT_CYCLE_MS > 0 && DEFAULT_CYCLE_MS <= DEFAULT_TICK_MS);
        assert!(DEFAULT_NOISE >= 0.0 && DEFAULT_NOISE < 0.01);
    }
}
