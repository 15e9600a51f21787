//! Simulator integration tests.
//!
//! Drives `SimCore` on a synthetic clock and checks the network solvers,
//! motor integrator, AMS loop and persistence end to end.

use rfm::matcher::config::SimulatorConfig;
use rfm::matcher::types::{AmsEvent, AmsMode, SimEvent};
use rfm_sim::core::SimCore;
use rfm_sim::physics::constants::CircuitConstants;
use rfm_sim::physics::impedance::{Impedance, vswr};
use rfm_sim::physics::network::reverse_chain;
use rfm_sim::physics::solver::ForwardSolver;
use rfm_sim::sink::RecordingSink;

/// Helper: default bench without sensor noise or motor stream.
fn quiet_config() -> SimulatorConfig {
    let mut config = SimulatorConfig::default();
    config.simulation.noise = 0.0;
    config.stream.motor_position_ms = 0;
    config
}

fn new_core(config: SimulatorConfig) -> (SimCore, RecordingSink) {
    let sink = RecordingSink::new();
    let core = SimCore::new(config, Box::new(sink.clone())).expect("create core");
    (core, sink)
}

/// Step the scheduler every 5 ms over `(from, to]`.
fn advance(core: &mut SimCore, from: u64, to: u64) {
    let mut now = from;
    while now < to {
        now += 5;
        core.step(now);
    }
}

fn ams_events(sink: &RecordingSink) -> Vec<AmsEvent> {
    sink.events()
        .into_iter()
        .filter_map(|e| match e {
            SimEvent::Ams(ams) => Some(ams),
            _ => None,
        })
        .collect()
}

fn exact_vswr(core: &SimCore) -> f64 {
    let (vvc0, vvc1) = core.capacitances();
    vswr(core.network().input_impedance_exact(vvc0, vvc1), 50.0)
}

#[test]
fn test_forward_solver_recovers_load() {
    let constants = CircuitConstants::default();
    let solver = ForwardSolver::new(constants);

    let loads = [(9.0, 10.0), (20.0, -5.0), (3.0, 30.0), (50.0, 0.0)];
    let caps = [(500.0, 275.0), (300.0, 150.0), (800.0, 400.0)];

    for (r, x) in loads {
        for (vvc0, vvc1) in caps {
            let zm = reverse_chain(&constants, Impedance::new(r, x), vvc0, vvc1).input;
            let nodes = solver.all_impedances(zm.r(), zm.x(), vvc0, vvc1);
            assert!(
                (nodes.rp - r).abs() < 1e-4 && (nodes.xp - x).abs() < 1e-4,
                "load ({r}, {x}) at ({vvc0}, {vvc1}) recovered as ({}, {})",
                nodes.rp,
                nodes.xp
            );
            assert!((nodes.vswr - vswr(zm, 50.0)).abs() < 1e-9);
        }
    }
}

#[test]
fn test_input_reading_within_noise_band() {
    let (mut core, _) = new_core(SimulatorConfig::default());
    let exact = core.network().input_impedance_exact(500.0, 275.0);
    assert!((exact.r() - 0.6881).abs() < 1e-3);

    for _ in 0..100 {
        let reading = core.calculate_input_impedance();
        assert!((reading.r - exact.r()).abs() <= 0.001 * exact.r().abs() + 1e-12);
        assert!((reading.x - exact.x()).abs() <= 0.001 * exact.x().abs() + 1e-12);
    }
}

#[test]
fn test_motor_reaches_target_in_thirty_ticks() {
    let (mut core, _) = new_core(quiet_config());
    assert_eq!(core.move_motor(0, 38000).unwrap(), 38000);

    advance(&mut core, 0, 580);
    assert_eq!(core.motors()[0].position(), 37800);
    assert_eq!(core.motors()[0].rpm(), 100);

    advance(&mut core, 580, 600);
    assert_eq!(core.motors()[0].position(), 38000);
    assert_eq!(core.motors()[0].rpm(), 0);
    assert!(!core.is_any_motor_moving());
}

#[test]
fn test_move_beyond_limit_is_clamped() {
    let (mut core, _) = new_core(quiet_config());
    assert_eq!(core.move_motor(1, 70000).unwrap(), 60000);
    assert_eq!(core.motors()[1].target(), 60000);
}

#[test]
fn test_ams_matches_reference_load() {
    let mut config = quiet_config();
    config.ams.auto_start = true;
    let (mut core, sink) = new_core(config);
    assert!(exact_vswr(&core) > 10.0);

    advance(&mut core, 0, 10_000);

    let events = ams_events(&sink);
    assert!(matches!(events.first(), Some(AmsEvent::Started { .. })));
    let matched = events
        .iter()
        .filter(|e| matches!(e, AmsEvent::Matched { .. }))
        .count();
    assert!(matched >= 1, "no MATCHED in {} AMS events", events.len());
    assert!(
        events.iter().any(|e| matches!(e, AmsEvent::Run { .. })),
        "motors were never commanded"
    );

    assert!(core.is_ams_running());
    assert!(exact_vswr(&core) < 1.1, "final VSWR {}", exact_vswr(&core));

    core.stop_ams();
    assert!(!core.is_ams_running());
    assert_eq!(ams_events(&sink).last(), Some(&AmsEvent::Stopped));
}

#[test]
fn test_ams_stays_monitoring_when_matched() {
    let mut config = quiet_config();
    config.ams.auto_start = true;
    let (mut core, sink) = new_core(config);
    advance(&mut core, 0, 10_000);
    assert_eq!(core.ams().mode(), Some(AmsMode::Monitoring));

    let before = ams_events(&sink).len();
    advance(&mut core, 10_000, 11_000);
    let after: Vec<_> = ams_events(&sink).into_iter().skip(before).collect();
    assert!(
        !after.iter().any(|e| matches!(e, AmsEvent::Restart { .. })),
        "unexpected restart: {after:?}"
    );
}

#[test]
fn test_unreachable_goal_leaves_motors_idle() {
    let mut config = quiet_config();
    config.ams.auto_start = true;
    config.ams.log_interval = 1;
    config.motors[0].min_cap_pf = 999.0;
    let (mut core, sink) = new_core(config);

    advance(&mut core, 0, 200);

    assert!(!core.is_any_motor_moving());
    assert_eq!(core.motors()[0].position(), 32000);
    assert_eq!(core.motors()[1].position(), 17600);
    assert!(
        ams_events(&sink)
            .iter()
            .any(|e| matches!(e, AmsEvent::NoValidGoal { .. }))
    );
}

#[test]
fn test_streams_emit_at_their_periods() {
    let mut config = quiet_config();
    config.stream.motor_position_ms = 100;
    config.stream.impedance_ms = 250;
    let (mut core, sink) = new_core(config);

    advance(&mut core, 0, 1000);

    let events = sink.events();
    let positions = events
        .iter()
        .filter(|e| matches!(e, SimEvent::MotorPositions(_)))
        .count();
    let inputs = events
        .iter()
        .filter(|e| matches!(e, SimEvent::InputImpedance(_)))
        .count();
    let outputs = events
        .iter()
        .filter(|e| matches!(e, SimEvent::OutputImpedance(_)))
        .count();
    assert_eq!(positions, 10);
    assert_eq!(inputs, 4);
    assert_eq!(outputs, 4);
}

#[test]
fn test_positions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("rfm_state.bin");

    let mut config = quiet_config();
    config.simulation.state_file = Some(state_file.clone());

    {
        let (mut core, _) = new_core(config.clone());
        core.move_motor(0, 40000).unwrap();
        advance(&mut core, 0, 1000);
        assert_eq!(core.motors()[0].position(), 40000);
        core.shutdown().unwrap();
    }
    assert!(state_file.exists());

    let (core, _) = new_core(config);
    assert_eq!(core.motors()[0].position(), 40000);
    assert_eq!(core.motors()[0].target(), 40000);
    assert_eq!(core.motors()[1].position(), 17600);
}

#[test]
fn test_matching_goals_from_live_reading() {
    let (mut core, _) = new_core(quiet_config());
    let (vvc0, vvc1) = core.capacitances();
    assert!((vvc0 - 500.0).abs() < 1e-9);
    assert!((vvc1 - 275.0).abs() < 1e-9);

    let reading = core.calculate_input_impedance();
    let goals = core.calculate_matching_goals(reading.r, reading.x, vvc0, vvc1);
    let (branch, goal) = goals.select().expect("feasible goal");
    assert_eq!(branch, 0);
    assert!((goal.vvc0_pf - 305.02).abs() < 0.05);
    assert!((goal.vvc1_pf - 145.08).abs() < 0.05);
    assert!((goal.step0 - 19521).abs() <= 5);

    let nodes = core.calculate_all_impedances(reading.r, reading.x, vvc0, vvc1);
    assert!((nodes.rp - 9.0).abs() < 1e-4);
    assert!((nodes.xp - 10.0).abs() < 1e-4);
}
