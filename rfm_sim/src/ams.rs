//! Auto-matching supervisory loop.
//!
//! Two states, evaluated once per loop tick:
//! - **Matching**: if VSWR ≤ `stop`, switch to Monitoring and emit `Matched`;
//!   otherwise solve for goals and command both motors to the selected branch.
//! - **Monitoring**: if VSWR > `restart`, switch to Matching and emit `Restart`.
//!
//! A non-zero timeout ends the loop with a terminal `Timeout` event. Status is
//! emitted once every `log_interval` ticks.
//!
//! The loop holds an enable flag shared through [`AutoMatcher::enable_flag`].
//! Clearing the flag from anywhere stops the loop at the next tick boundary.

use rfm::consts::MOTOR_COUNT;
use rfm::matcher::config::SimulatorConfig;
use rfm::matcher::sink::ResponseSink;
use rfm::matcher::types::{AmsEvent, AmsMode, SensorReading, SimEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::motor::MotorSimulator;
use crate::physics::impedance::{Impedance, vswr};
use crate::physics::network::{ImpedanceProbe, node_c_from_load};
use crate::physics::solver::ForwardSolver;

/// Ticks between diagnostic trace lines.
const TRACE_EVERY_TICKS: u64 = 100;

/// Thresholds that do not change between runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmsSettings {
    pub vswr_stop: f64,
    pub vswr_restart: f64,
    /// Use the output sensor to derive node C above this VSWR.
    pub output_assist_above: f64,
    /// Emit status every N ticks.
    pub log_interval: u32,
    /// Reference impedance for VSWR.
    pub z0: f64,
}

impl AmsSettings {
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self {
            vswr_stop: config.vswr.stop,
            vswr_restart: config.vswr.restart,
            output_assist_above: config.vswr.output_assist_above,
            log_interval: config.ams.log_interval,
            z0: config.circuit.z0_ohm,
        }
    }
}

/// Per-run state. Exists only between `start` and stop/timeout.
#[derive(Debug, Clone, Copy)]
struct AmsState {
    mode: AmsMode,
    started_at_ms: u64,
    interval_ms: u64,
    timeout_ms: u64,
    log_counter: u32,
}

/// The auto-matching loop.
#[derive(Debug)]
pub struct AutoMatcher {
    settings: AmsSettings,
    enabled: Arc<AtomicBool>,
    state: Option<AmsState>,
    tick_count: u64,
}

impl AutoMatcher {
    pub fn new(settings: AmsSettings) -> Self {
        Self {
            settings,
            enabled: Arc::new(AtomicBool::new(false)),
            state: None,
            tick_count: 0,
        }
    }

    pub fn settings(&self) -> &AmsSettings {
        &self.settings
    }

    /// Shared enable flag. Storing `false` stops the loop at the next tick.
    pub fn enable_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }

    /// Start (or restart) the loop in Matching mode.
    ///
    /// `timeout_ms == 0` runs until stopped.
    pub fn start(
        &mut self,
        interval_ms: u64,
        timeout_ms: u64,
        now_ms: u64,
        sink: &mut dyn ResponseSink,
    ) {
        let interval_ms = interval_ms.max(1);
        if self.state.is_some() {
            info!("AMS restarted");
        }
        self.state = Some(AmsState {
            mode: AmsMode::Matching,
            started_at_ms: now_ms,
            interval_ms,
            timeout_ms,
            log_counter: 0,
        });
        self.tick_count = 0;
        self.enabled.store(true, Ordering::SeqCst);
        info!(
            "AMS started: interval={}ms, timeout={}ms, stop={}, restart={}",
            interval_ms, timeout_ms, self.settings.vswr_stop, self.settings.vswr_restart
        );
        sink.send(&SimEvent::Ams(AmsEvent::Started {
            interval_ms,
            timeout_ms,
        }));
    }

    /// Stop the loop. Idempotent.
    pub fn stop(&mut self, sink: &mut dyn ResponseSink) {
        self.enabled.store(false, Ordering::SeqCst);
        if self.state.take().is_some() {
            info!("AMS stopped after {} ticks", self.tick_count);
            sink.send(&SimEvent::Ams(AmsEvent::Stopped));
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some() && self.enabled.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> Option<AmsMode> {
        self.state.map(|s| s.mode)
    }

    /// Loop period of the current run.
    pub fn interval_ms(&self) -> Option<u64> {
        self.state.map(|s| s.interval_ms)
    }

    /// Evaluate one loop tick.
    pub fn tick(
        &mut self,
        now_ms: u64,
        probe: &mut dyn ImpedanceProbe,
        solver: &ForwardSolver,
        motors: &mut [MotorSimulator; MOTOR_COUNT],
        sink: &mut dyn ResponseSink,
    ) {
        let Some(mut state) = self.state else {
            return;
        };
        if !self.enabled.load(Ordering::SeqCst) {
            self.stop(sink);
            return;
        }

        let elapsed_ms = now_ms.saturating_sub(state.started_at_ms);
        if state.timeout_ms > 0 && elapsed_ms >= state.timeout_ms {
            warn!("AMS timeout after {}ms", elapsed_ms);
            self.state = None;
            self.enabled.store(false, Ordering::SeqCst);
            sink.send(&SimEvent::Ams(AmsEvent::Timeout { elapsed_ms }));
            return;
        }

        let vvc0_pf = motors[0].capacitance();
        let vvc1_pf = motors[1].capacitance();
        let reading = probe.input_reading(vvc0_pf, vvc1_pf);
        let vswr = vswr(Impedance::new(reading.r, reading.x), self.settings.z0);

        state.log_counter += 1;
        let report_due = state.log_counter >= self.settings.log_interval.max(1);
        if report_due {
            state.log_counter = 0;
            sink.send(&SimEvent::Ams(AmsEvent::Status {
                mode: state.mode,
                vswr,
                reading,
            }));
        }

        match state.mode {
            AmsMode::Matching if vswr <= self.settings.vswr_stop => {
                state.mode = AmsMode::Monitoring;
                info!("AMS matched: VSWR={:.4}", vswr);
                sink.send(&SimEvent::Ams(AmsEvent::Matched { vswr }));
            }
            AmsMode::Matching => {
                self.command_goals(
                    &reading, vswr, vvc0_pf, vvc1_pf, probe, solver, motors, sink, report_due,
                );
            }
            AmsMode::Monitoring if vswr > self.settings.vswr_restart => {
                state.mode = AmsMode::Matching;
                info!("AMS restart: VSWR={:.4}", vswr);
                sink.send(&SimEvent::Ams(AmsEvent::Restart { vswr }));
            }
            AmsMode::Monitoring => {}
        }

        self.tick_count += 1;
        if self.tick_count % TRACE_EVERY_TICKS == 0 {
            debug!(
                "AMS: {} ticks, mode={:?}, elapsed={}ms, VSWR={:.4}",
                self.tick_count, state.mode, elapsed_ms, vswr
            );
        }

        self.state = Some(state);
    }

    #[allow(clippy::too_many_arguments)]
    fn command_goals(
        &self,
        reading: &SensorReading,
        vswr: f64,
        vvc0_pf: f64,
        vvc1_pf: f64,
        probe: &mut dyn ImpedanceProbe,
        solver: &ForwardSolver,
        motors: &mut [MotorSimulator; MOTOR_COUNT],
        sink: &mut dyn ResponseSink,
        report_due: bool,
    ) {
        let node_c = if vswr > self.settings.output_assist_above {
            probe
                .output_reading()
                .filter(|out| out.r != 0.0 || out.x != 0.0)
                .map(|out| {
                    node_c_from_load(solver.constants(), Impedance::new(out.r, out.x), vvc1_pf)
                })
        } else {
            None
        };

        let goals = solver.solve_goals(
            reading.r, reading.x, vvc0_pf, vvc1_pf, node_c, &motors[0], &motors[1],
        );

        match goals.select() {
            Some((branch, goal)) => {
                motors[0].move_to(goal.step0);
                motors[1].move_to(goal.step1);
                if report_due {
                    sink.send(&SimEvent::Ams(AmsEvent::Run {
                        branch,
                        vswr,
                        step0: goal.step0,
                        step1: goal.step1,
                    }));
                }
            }
            None => {
                if report_due {
                    debug!(
                        "AMS: no valid goal (discriminant={:.4e}, VSWR={:.4})",
                        goals.discriminant, vswr
                    );
                    sink.send(&SimEvent::Ams(AmsEvent::NoValidGoal { vswr }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::constants::CircuitConstants;
    use crate::sink::RecordingSink;
    use rfm::matcher::config::MotorConfig;

    /// Probe that always reports the same input impedance.
    struct FixedProbe {
        r: f64,
        x: f64,
        samples: usize,
    }

    impl ImpedanceProbe for FixedProbe {
        fn input_reading(&mut self, _vvc0_pf: f64, _vvc1_pf: f64) -> SensorReading {
            self.samples += 1;
            SensorReading {
                r: self.r,
                x: self.x,
                ..Default::default()
            }
        }

        fn output_reading(&mut self) -> Option<SensorReading> {
            None
        }
    }

    fn settings() -> AmsSettings {
        AmsSettings {
            vswr_stop: 1.02,
            vswr_restart: 1.04,
            output_assist_above: 2.0,
            log_interval: 1000,
            z0: 50.0,
        }
    }

    fn motors() -> [MotorSimulator; MOTOR_COUNT] {
        [
            MotorSimulator::new(MotorConfig::with_position("vvc0", 32000)),
            MotorSimulator::new(MotorConfig::with_position("vvc1", 17600)),
        ]
    }

    #[test]
    fn test_matched_transitions_once() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let mut motors = motors();
        let mut probe = FixedProbe { r: 50.5, x: 0.0, samples: 0 };
        let sink = RecordingSink::new();
        let mut out = sink.clone();
        let mut ams = AutoMatcher::new(settings());

        ams.start(10, 0, 0, &mut out);
        assert_eq!(ams.mode(), Some(AmsMode::Matching));

        for now in [10, 20, 30, 40] {
            ams.tick(now, &mut probe, &solver, &mut motors, &mut out);
        }

        assert_eq!(ams.mode(), Some(AmsMode::Monitoring));
        let matched = sink
            .events()
            .iter()
            .filter(|e| matches!(e, SimEvent::Ams(AmsEvent::Matched { .. })))
            .count();
        assert_eq!(matched, 1);
        assert!(!motors[0].is_moving());
    }

    #[test]
    fn test_restart_above_threshold() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let mut motors = motors();
        let sink = RecordingSink::new();
        let mut out = sink.clone();
        let mut ams = AutoMatcher::new(settings());
        ams.start(10, 0, 0, &mut out);

        let mut probe = FixedProbe { r: 50.0, x: 0.0, samples: 0 };
        ams.tick(10, &mut probe, &solver, &mut motors, &mut out);
        assert_eq!(ams.mode(), Some(AmsMode::Monitoring));

        // Between the thresholds stays in Monitoring.
        probe.r = 51.5;
        ams.tick(20, &mut probe, &solver, &mut motors, &mut out);
        assert_eq!(ams.mode(), Some(AmsMode::Monitoring));

        probe.r = 60.0;
        ams.tick(30, &mut probe, &solver, &mut motors, &mut out);
        assert_eq!(ams.mode(), Some(AmsMode::Matching));
        assert!(
            sink.events()
                .iter()
                .any(|e| matches!(e, SimEvent::Ams(AmsEvent::Restart { .. })))
        );
    }

    #[test]
    fn test_timeout_is_terminal() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let mut motors = motors();
        let mut probe = FixedProbe { r: 5.0, x: 3.0, samples: 0 };
        let sink = RecordingSink::new();
        let mut out = sink.clone();
        let mut ams = AutoMatcher::new(settings());

        ams.start(10, 50, 100, &mut out);
        ams.tick(140, &mut probe, &solver, &mut motors, &mut out);
        assert!(ams.is_running());
        ams.tick(150, &mut probe, &solver, &mut motors, &mut out);
        assert!(!ams.is_running());
        assert_eq!(ams.mode(), None);
        assert_eq!(probe.samples, 1);

        let events = sink.events();
        assert_eq!(
            events.last(),
            Some(&SimEvent::Ams(AmsEvent::Timeout { elapsed_ms: 50 }))
        );

        // Further ticks and stops are no-ops.
        ams.tick(160, &mut probe, &solver, &mut motors, &mut out);
        ams.stop(&mut out);
        assert_eq!(sink.events().len(), events.len());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let sink = RecordingSink::new();
        let mut out = sink.clone();
        let mut ams = AutoMatcher::new(settings());
        ams.stop(&mut out);
        assert!(sink.events().is_empty());

        ams.start(10, 0, 0, &mut out);
        ams.stop(&mut out);
        ams.stop(&mut out);
        let stopped = sink
            .events()
            .iter()
            .filter(|e| matches!(e, SimEvent::Ams(AmsEvent::Stopped)))
            .count();
        assert_eq!(stopped, 1);
        assert!(!ams.is_running());
    }

    #[test]
    fn test_enable_flag_stops_at_next_tick() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let mut motors = motors();
        let mut probe = FixedProbe { r: 5.0, x: 3.0, samples: 0 };
        let sink = RecordingSink::new();
        let mut out = sink.clone();
        let mut ams = AutoMatcher::new(settings());

        ams.start(10, 0, 0, &mut out);
        ams.enable_flag().store(false, Ordering::SeqCst);
        assert!(!ams.is_running());

        ams.tick(10, &mut probe, &solver, &mut motors, &mut out);
        assert_eq!(probe.samples, 0);
        assert_eq!(ams.mode(), None);
        assert_eq!(
            sink.events().last(),
            Some(&SimEvent::Ams(AmsEvent::Stopped))
        );
    }

    #[test]
    fn test_status_throttled_by_log_interval() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let mut motors = motors();
        let mut probe = FixedProbe { r: 50.0, x: 0.0, samples: 0 };
        let sink = RecordingSink::new();
        let mut out = sink.clone();
        let mut ams = AutoMatcher::new(AmsSettings {
            log_interval: 4,
            ..settings()
        });

        ams.start(10, 0, 0, &mut out);
        for tick in 1..=12 {
            ams.tick(tick * 10, &mut probe, &solver, &mut motors, &mut out);
        }
        let status = sink
            .events()
            .iter()
            .filter(|e| matches!(e, SimEvent::Ams(AmsEvent::Status { .. })))
            .count();
        assert_eq!(status, 3);
    }

    #[test]
    fn test_mismatch_commands_motors() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let constants = *solver.constants();
        let mut motors = motors();
        let zm = crate::physics::network::reverse_chain(
            &constants,
            Impedance::new(9.0, 10.0),
            motors[0].capacitance(),
            motors[1].capacitance(),
        )
        .input;
        let mut probe = FixedProbe {
            r: zm.r(),
            x: zm.x(),
            samples: 0,
        };
        let sink = RecordingSink::new();
        let mut out = sink.clone();
        let mut ams = AutoMatcher::new(AmsSettings {
            log_interval: 1,
            ..settings()
        });

        ams.start(10, 0, 0, &mut out);
        ams.tick(10, &mut probe, &solver, &mut motors, &mut out);

        assert!(motors[0].is_moving());
        assert!(motors[1].is_moving());
        assert!((motors[0].target() - 19521).abs() <= 5, "{}", motors[0].target());
        assert!(sink.events().iter().any(|e| matches!(
            e,
            SimEvent::Ams(AmsEvent::Run { branch: 0, .. })
        )));
    }

    #[test]
    fn test_no_valid_goal_leaves_motors_idle() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let narrow = |name: &str| {
            let mut config = MotorConfig::with_position(name, 32000);
            config.min_cap_pf = 999.0;
            config
        };
        let mut motors = [
            MotorSimulator::new(narrow("vvc0")),
            MotorSimulator::new(narrow("vvc1")),
        ];
        let mut probe = FixedProbe { r: 0.69, x: -8.83, samples: 0 };
        let sink = RecordingSink::new();
        let mut out = sink.clone();
        let mut ams = AutoMatcher::new(AmsSettings {
            log_interval: 1,
            ..settings()
        });

        ams.start(10, 0, 0, &mut out);
        ams.tick(10, &mut probe, &solver, &mut motors, &mut out);

        assert!(!motors[0].is_moving());
        assert!(!motors[1].is_moving());
        assert!(sink.events().iter().any(|e| matches!(
            e,
            SimEvent::Ams(AmsEvent::NoValidGoal { .. })
        )));
    }

    /// Probe with a fixed input reading and a fixed load-side reading.
    struct LoadSideProbe {
        input: SensorReading,
        output: SensorReading,
    }

    impl ImpedanceProbe for LoadSideProbe {
        fn input_reading(&mut self, _vvc0_pf: f64, _vvc1_pf: f64) -> SensorReading {
            self.input
        }

        fn output_reading(&mut self) -> Option<SensorReading> {
            Some(self.output)
        }
    }

    fn reading(r: f64, x: f64) -> SensorReading {
        SensorReading {
            r,
            x,
            ..Default::default()
        }
    }

    #[test]
    fn test_negative_discriminant_issues_no_target() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let mut motors = motors();
        let load = Impedance::new(100.0, 300.0);

        // This load puts node C far above the goal resistance.
        let node_c = node_c_from_load(solver.constants(), load, motors[1].capacitance());
        assert!(solver.discriminant(node_c.r()) < 0.0);

        let mut probe = LoadSideProbe {
            input: reading(0.69, -8.83),
            output: reading(load.r(), load.x()),
        };
        let sink = RecordingSink::new();
        let mut out = sink.clone();
        let mut ams = AutoMatcher::new(AmsSettings {
            log_interval: 1,
            ..settings()
        });

        ams.start(10, 0, 0, &mut out);
        ams.tick(10, &mut probe, &solver, &mut motors, &mut out);

        assert_eq!(motors[0].target(), 32000);
        assert_eq!(motors[1].target(), 17600);
        assert!(!motors[0].is_moving() && !motors[1].is_moving());
        assert!(sink.events().iter().any(|e| matches!(
            e,
            SimEvent::Ams(AmsEvent::NoValidGoal { .. })
        )));
        assert!(
            !sink
                .events()
                .iter()
                .any(|e| matches!(e, SimEvent::Ams(AmsEvent::Run { .. })))
        );
    }

    #[test]
    fn test_zero_output_reading_is_not_used() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let input = crate::physics::network::reverse_chain(
            solver.constants(),
            Impedance::new(9.0, 10.0),
            500.0,
            275.0,
        )
        .input;

        let mut with_zero = motors();
        let mut probe = LoadSideProbe {
            input: reading(input.r(), input.x()),
            output: SensorReading::default(),
        };
        let mut ams = AutoMatcher::new(settings());
        let mut sink = RecordingSink::new();
        ams.start(10, 0, 0, &mut sink);
        ams.tick(10, &mut probe, &solver, &mut with_zero, &mut sink);

        let mut input_only = motors();
        let mut fixed = FixedProbe {
            r: input.r(),
            x: input.x(),
            samples: 0,
        };
        let mut ams = AutoMatcher::new(settings());
        ams.start(10, 0, 0, &mut sink);
        ams.tick(10, &mut fixed, &solver, &mut input_only, &mut sink);

        assert!(with_zero[0].is_moving());
        assert_eq!(with_zero[0].target(), input_only[0].target());
        assert_eq!(with_zero[1].target(), input_only[1].target());
    }
}
