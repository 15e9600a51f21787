//! Matcher report and event types.
//!
//! This module defines the data the simulator core pushes to its sink:
//! - `SensorReading` - One simulated V/I sensor sample
//! - `ImpedanceNodes` - Full node dump of the matching network
//! - `MotorReport` - Per-motor position snapshot
//! - `AmsMode` / `AmsEvent` - Auto-matching loop state and transitions
//! - `SimEvent` - Envelope for everything above

use serde::{Deserialize, Serialize};

/// Simulated sensor sample at one port of the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Resistance (Ω)
    pub r: f64,
    /// Reactance (Ω)
    pub x: f64,
    /// RMS voltage (V)
    pub v: f64,
    /// RMS current (A)
    pub i: f64,
    /// Impedance phase angle (degrees)
    pub phase_deg: f64,
}

impl SensorReading {
    /// Impedance magnitude |Z| in ohms.
    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.r.hypot(self.x)
    }
}

/// Node impedances of the network from the input port down to the load.
///
/// Produced by the forward solver for diagnostics. Every field is finite;
/// degenerate stages report zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceNodes {
    pub ra: f64,
    pub xa: f64,
    pub rb: f64,
    pub xb: f64,
    pub rc: f64,
    pub xc: f64,
    pub rd: f64,
    pub xd: f64,
    pub re: f64,
    pub xe: f64,
    /// Implied load resistance.
    pub rp: f64,
    /// Implied load reactance.
    pub xp: f64,
    /// VSWR of the measured input impedance.
    pub vswr: f64,
}

/// Position snapshot for one motor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorReport {
    pub name: String,
    /// Current position (steps)
    pub position: i32,
    /// Commanded target (steps)
    pub target: i32,
    /// Position as a percentage of the mechanical range
    pub percent: f64,
    /// Capacitance at the current position (pF)
    pub cap_pf: f64,
    pub moving: bool,
}

/// Auto-matching loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmsMode {
    /// Match reached; watching for drift past the restart threshold.
    Monitoring,
    /// Actively commanding motors toward a goal.
    Matching,
}

/// Transition or status emitted by the auto-matching loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AmsEvent {
    Started { interval_ms: u64, timeout_ms: u64 },
    /// VSWR fell to or below the stop threshold.
    Matched { vswr: f64 },
    /// VSWR drifted above the restart threshold while monitoring.
    Restart { vswr: f64 },
    /// Motors commanded toward the selected goal branch.
    Run {
        branch: u8,
        vswr: f64,
        step0: i32,
        step1: i32,
    },
    /// Neither goal branch was feasible this tick.
    NoValidGoal { vswr: f64 },
    Status {
        mode: AmsMode,
        vswr: f64,
        reading: SensorReading,
    },
    /// Loop ran past its timeout and stopped.
    Timeout { elapsed_ms: u64 },
    Stopped,
}

impl AmsEvent {
    /// Short upper-case tag used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            AmsEvent::Started { .. } => "STARTED",
            AmsEvent::Matched { .. } => "MATCHED",
            AmsEvent::Restart { .. } => "RESTART",
            AmsEvent::Run { .. } => "RUN",
            AmsEvent::NoValidGoal { .. } => "NO_VALID_GOAL",
            AmsEvent::Status { .. } => "STATUS",
            AmsEvent::Timeout { .. } => "TIMEOUT",
            AmsEvent::Stopped => "STOPPED",
        }
    }
}

/// Everything the simulator core pushes to its response sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SimEvent {
    /// Input-port sensor sample.
    InputImpedance(SensorReading),
    /// Load-side sensor sample.
    OutputImpedance(SensorReading),
    MotorPositions(Vec<MotorReport>),
    Ams(AmsEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_magnitude() {
        let reading = SensorReading {
            r: 3.0,
            x: -4.0,
            ..Default::default()
        };
        assert!((reading.magnitude() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_ams_event_labels() {
        assert_eq!(AmsEvent::Matched { vswr: 1.01 }.label(), "MATCHED");
        assert_eq!(AmsEvent::Stopped.label(), "STOPPED");
        assert_eq!(AmsEvent::Timeout { elapsed_ms: 5 }.label(), "TIMEOUT");
    }

    #[test]
    fn test_sim_event_json_shape() {
        let event = SimEvent::Ams(AmsEvent::Matched { vswr: 1.01 });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "ams");
        assert_eq!(value["data"]["event"], "matched");
        assert_eq!(value["data"]["vswr"], 1.01);

        let stopped = serde_json::to_value(SimEvent::Ams(AmsEvent::Stopped)).unwrap();
        assert_eq!(stopped["data"]["event"], "stopped");
    }

    #[test]
    fn test_ams_mode_serializes_lowercase() {
        let json = serde_json::to_string(&AmsMode::Monitoring).unwrap();
        assert_eq!(json, "\"monitoring\"");
    }
}
