//! Simulator core and scheduler loop.
//!
//! `SimCore` owns every piece of mutable simulator state and drives it from
//! one thread. All periodic work (motor integrator, report streams, AMS) is
//! a timer on the same scheduler, so motor and loop state are never shared
//! across threads.

use rfm::consts::MOTOR_COUNT;
use rfm::matcher::config::SimulatorConfig;
use rfm::matcher::sink::{ResponseSink, SimError};
use rfm::matcher::types::{ImpedanceNodes, SensorReading, SimEvent};
use rfm::config::Validate;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::ams::{AmsSettings, AutoMatcher};
use crate::motor::MotorSimulator;
use crate::physics::constants::CircuitConstants;
use crate::physics::goals::MatchingGoals;
use crate::physics::impedance::calculate_vswr;
use crate::physics::network::NetworkSimulator;
use crate::physics::solver::ForwardSolver;
use crate::state::{PersistedState, StatePersistence};

/// Fixed-period timer on the scheduler's millisecond clock.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTimer {
    period_ms: u64,
    next_due_ms: u64,
}

impl PeriodicTimer {
    /// Timer first due one period after `now_ms`.
    pub fn new(period_ms: u64, now_ms: u64) -> Self {
        let period_ms = period_ms.max(1);
        Self {
            period_ms,
            next_due_ms: now_ms + period_ms,
        }
    }

    /// True once per elapsed period. Missed periods are skipped, not replayed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_due_ms {
            return false;
        }
        self.next_due_ms += self.period_ms;
        if self.next_due_ms <= now_ms {
            self.next_due_ms = now_ms + self.period_ms;
        }
        true
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }
}

/// Timing statistics for scheduler loop monitoring.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimingStats {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Cycles whose work exceeded the cycle time
    pub overruns: u64,
    /// Maximum observed cycle time
    pub max_cycle_time_us: u64,
    /// Sum of cycle times for average calculation
    pub total_cycle_time_us: u64,
}

impl TimingStats {
    pub fn avg_cycle_time_us(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.total_cycle_time_us / self.cycle_count
        }
    }
}

/// Single-threaded matcher simulator.
pub struct SimCore {
    config: SimulatorConfig,
    network: NetworkSimulator,
    solver: ForwardSolver,
    motors: [MotorSimulator; MOTOR_COUNT],
    ams: AutoMatcher,
    sink: Box<dyn ResponseSink>,
    persistence: Option<StatePersistence>,
    /// Running flag for scheduler loop control
    running: Arc<AtomicBool>,
    cycle_time: Duration,
    stats: TimingStats,
    /// Scheduler clock of the last `step`
    now_ms: u64,
    motor_timer: PeriodicTimer,
    motor_stream: Option<PeriodicTimer>,
    impedance_stream: Option<PeriodicTimer>,
    ams_timer: Option<PeriodicTimer>,
}

impl SimCore {
    /// Create a simulator from a validated configuration.
    ///
    /// Restores persisted motor positions when a state file is configured,
    /// and starts the AMS when `ams.auto_start` is set.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid.
    pub fn new(config: SimulatorConfig, sink: Box<dyn ResponseSink>) -> Result<Self, SimError> {
        config.validate()?;

        let constants = CircuitConstants::from_config(&config.circuit);
        let network = NetworkSimulator::from_config(&config);
        let solver = ForwardSolver::new(constants);

        let motors: [MotorSimulator; MOTOR_COUNT] = config
            .motors
            .iter()
            .cloned()
            .map(MotorSimulator::new)
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|v: Vec<MotorSimulator>| {
                SimError::InitFailed(format!("Expected {} motors, got {}", MOTOR_COUNT, v.len()))
            })?;

        let persistence = config
            .simulation
            .state_file
            .as_ref()
            .map(StatePersistence::new);

        let stream = config.stream;
        let mut core = Self {
            ams: AutoMatcher::new(AmsSettings::from_config(&config)),
            cycle_time: Duration::from_millis(config.simulation.cycle_ms),
            motor_timer: PeriodicTimer::new(config.simulation.tick_ms, 0),
            motor_stream: (stream.motor_position_ms > 0)
                .then(|| PeriodicTimer::new(stream.motor_position_ms, 0)),
            impedance_stream: (stream.impedance_ms > 0)
                .then(|| PeriodicTimer::new(stream.impedance_ms, 0)),
            ams_timer: None,
            config,
            network,
            solver,
            motors,
            sink,
            persistence,
            running: Arc::new(AtomicBool::new(false)),
            stats: TimingStats::default(),
            now_ms: 0,
        };

        core.restore_state();

        info!(
            "SimCore created: tick={}ms, cycle={}ms, motors=[{}, {}]",
            core.config.simulation.tick_ms,
            core.config.simulation.cycle_ms,
            core.motors[0].name(),
            core.motors[1].name()
        );

        if core.config.ams.auto_start {
            let ams = core.config.ams;
            core.start_ams(ams.interval_ms, ams.timeout_ms);
        }

        Ok(core)
    }

    fn restore_state(&mut self) {
        let Some(persistence) = self.persistence.as_ref() else {
            return;
        };
        match persistence.load() {
            Ok(Some(state)) => {
                let restored = state.apply(&mut self.motors);
                info!("Restored {} motor positions", restored);
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable state file: {}", e),
        }
    }

    /// Run every timer due at `now_ms`, in order: motor integrator, motor
    /// stream, impedance stream, AMS.
    pub fn step(&mut self, now_ms: u64) {
        self.now_ms = now_ms;

        if self.motor_timer.poll(now_ms) {
            self.update_motor_positions();
        }

        if self.motor_stream.as_mut().is_some_and(|t| t.poll(now_ms)) {
            let reports = self.motors.iter().map(MotorSimulator::report).collect();
            self.sink.send(&SimEvent::MotorPositions(reports));
        }

        if self.impedance_stream.as_mut().is_some_and(|t| t.poll(now_ms)) {
            let input = self.calculate_input_impedance();
            let output = self.calculate_output_impedance();
            self.sink.send(&SimEvent::InputImpedance(input));
            self.sink.send(&SimEvent::OutputImpedance(output));
        }

        if self.ams_timer.as_mut().is_some_and(|t| t.poll(now_ms)) {
            self.ams.tick(
                now_ms,
                &mut self.network,
                &self.solver,
                &mut self.motors,
                self.sink.as_mut(),
            );
            if !self.ams.is_running() {
                self.ams_timer = None;
            }
        }
    }

    /// Run the scheduler loop against the wall clock.
    ///
    /// Blocks until the running flag is cleared or `limit` elapses.
    pub fn run(&mut self, limit: Option<Duration>) -> Result<(), SimError> {
        info!(
            "Starting scheduler loop (cycle_time={}ms)...",
            self.cycle_time.as_millis()
        );
        self.running.store(true, Ordering::SeqCst);

        let origin = Instant::now();
        let base_ms = self.now_ms;

        while self.running.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();
            let elapsed = cycle_start.duration_since(origin);
            if limit.is_some_and(|limit| elapsed >= limit) {
                info!("Run limit of {:?} reached", elapsed);
                break;
            }

            self.step(base_ms + elapsed.as_millis() as u64);

            let cycle_time_us = cycle_start.elapsed().as_micros() as u64;
            self.stats.cycle_count += 1;
            self.stats.total_cycle_time_us += cycle_time_us;
            self.stats.max_cycle_time_us = self.stats.max_cycle_time_us.max(cycle_time_us);

            if cycle_time_us > self.cycle_time.as_micros() as u64 {
                self.stats.overruns += 1;
                if self.stats.overruns <= 10 || self.stats.overruns % 1000 == 0 {
                    warn!(
                        "Cycle overrun #{}: took {}us (target {}us)",
                        self.stats.overruns,
                        cycle_time_us,
                        self.cycle_time.as_micros()
                    );
                }
            }

            let spent = cycle_start.elapsed();
            if spent < self.cycle_time {
                std::thread::sleep(self.cycle_time - spent);
            }

            if self.stats.cycle_count % 1000 == 0 {
                debug!(
                    "Scheduler: {} cycles, avg={}us, max={}us, overruns={}",
                    self.stats.cycle_count,
                    self.stats.avg_cycle_time_us(),
                    self.stats.max_cycle_time_us,
                    self.stats.overruns
                );
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            "Scheduler loop stopped after {} cycles (overruns: {})",
            self.stats.cycle_count, self.stats.overruns
        );
        Ok(())
    }

    /// Stop the loop, stop the AMS, persist motor positions, flush the sink.
    pub fn shutdown(&mut self) -> Result<(), SimError> {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        self.stop_ams();

        if let Some(persistence) = self.persistence.as_ref() {
            persistence.save(&PersistedState::capture(&self.motors))?;
        }

        self.sink.flush()
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> TimingStats {
        self.stats
    }

    /// Scheduler clock of the last step (ms).
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn network(&self) -> &NetworkSimulator {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut NetworkSimulator {
        &mut self.network
    }

    pub fn solver(&self) -> &ForwardSolver {
        &self.solver
    }

    pub fn motors(&self) -> &[MotorSimulator; MOTOR_COUNT] {
        &self.motors
    }

    pub fn ams(&self) -> &AutoMatcher {
        &self.ams
    }

    /// Live capacitor values (pF) of both motors.
    pub fn capacitances(&self) -> (f64, f64) {
        (self.motors[0].capacitance(), self.motors[1].capacitance())
    }

    /// Sensor sample at the input port for the live capacitor values.
    pub fn calculate_input_impedance(&mut self) -> SensorReading {
        let (vvc0, vvc1) = self.capacitances();
        self.network.calculate_input_impedance(vvc0, vvc1)
    }

    /// Sensor sample at the load.
    pub fn calculate_output_impedance(&mut self) -> SensorReading {
        self.network.calculate_output_impedance()
    }

    pub fn calculate_vswr(&self, r: f64, x: f64) -> f64 {
        calculate_vswr(r, x, self.config.circuit.z0_ohm)
    }

    /// Full node dump for a measured input impedance.
    pub fn calculate_all_impedances(
        &self,
        rm: f64,
        xm: f64,
        vvc0_pf: f64,
        vvc1_pf: f64,
    ) -> ImpedanceNodes {
        self.solver.all_impedances(rm, xm, vvc0_pf, vvc1_pf)
    }

    /// Matching goals for a measured input impedance, validated against the live motors.
    pub fn calculate_matching_goals(
        &self,
        rm: f64,
        xm: f64,
        vvc0_pf: f64,
        vvc1_pf: f64,
    ) -> MatchingGoals {
        self.solver.calculate_matching_goals(
            rm,
            xm,
            vvc0_pf,
            vvc1_pf,
            &self.motors[0],
            &self.motors[1],
        )
    }

    /// Advance every motor by one integrator tick. Returns true if any moved.
    pub fn update_motor_positions(&mut self) -> bool {
        let tick_ms = self.config.simulation.tick_ms;
        self.motors
            .iter_mut()
            .fold(false, |changed, motor| motor.update(tick_ms) || changed)
    }

    pub fn is_any_motor_moving(&self) -> bool {
        self.motors.iter().any(MotorSimulator::is_moving)
    }

    /// Operator command: move a motor to a step position (clamped to its limits).
    pub fn move_motor(&mut self, index: usize, target: i32) -> Result<i32, SimError> {
        let motor = self
            .motors
            .get_mut(index)
            .ok_or(SimError::InvalidMotor(index))?;
        Ok(motor.move_to(target))
    }

    /// Operator command: re-base a motor's position counter.
    pub fn set_motor_origin(&mut self, index: usize, position: i32) -> Result<(), SimError> {
        let motor = self
            .motors
            .get_mut(index)
            .ok_or(SimError::InvalidMotor(index))?;
        motor.set_origin(position);
        Ok(())
    }

    /// Start the AMS at the current scheduler time.
    pub fn start_ams(&mut self, interval_ms: u64, timeout_ms: u64) {
        self.ams
            .start(interval_ms, timeout_ms, self.now_ms, self.sink.as_mut());
        let interval = self.ams.interval_ms().unwrap_or(interval_ms);
        self.ams_timer = Some(PeriodicTimer::new(interval, self.now_ms));
    }

    /// Stop the AMS. Idempotent.
    pub fn stop_ams(&mut self) {
        self.ams.stop(self.sink.as_mut());
        self.ams_timer = None;
    }

    pub fn is_ams_running(&self) -> bool {
        self.ams.is_running()
    }
}
