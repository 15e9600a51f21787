//! Matching-goal solver.
//!
//! Finds the VVC0/VVC1 values that place node A at the impedance seen
//! through the input stage when the port is terminated in Z0. Requiring
//! `ZC ‖ ZB = ZA_goal` with fixed `RB` is quadratic in the unknown
//! reactances; its discriminant is a quadratic in `RC` whose coefficients
//! are precomputed. A negative discriminant means no real solution this
//! tick; otherwise two branches (`∓√D`) are converted to capacitances and
//! then to motor steps.

use tracing::trace;

use super::constants::pf;
use super::impedance::{Impedance, guarded_ratio};
use super::solver::ForwardSolver;
use crate::motor::MotorSimulator;

/// One candidate solution.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GoalCandidate {
    /// Target VVC0 capacitance (pF)
    pub vvc0_pf: f64,
    /// Target VVC1 capacitance (pF)
    pub vvc1_pf: f64,
    /// Motor 0 step position for `vvc0_pf`
    pub step0: i32,
    /// Motor 1 step position for `vvc1_pf`
    pub step1: i32,
    /// Both capacitances finite and inside both motors' capacitance range
    pub valid: bool,
}

/// Result of one goal evaluation. Ephemeral; recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingGoals {
    pub ra_goal: f64,
    pub xa_goal: f64,
    pub discriminant: f64,
    /// Branch 0 (`−√D` for XB) and branch 1 (`+√D`).
    pub branches: [GoalCandidate; 2],
}

impl MatchingGoals {
    /// Preferred feasible branch: 0 if valid, else 1 if valid, else none.
    pub fn select(&self) -> Option<(u8, GoalCandidate)> {
        self.branches
            .iter()
            .position(|b| b.valid)
            .map(|index| (index as u8, self.branches[index]))
    }

    pub fn any_valid(&self) -> bool {
        self.branches.iter().any(|b| b.valid)
    }
}

impl ForwardSolver {
    /// Discriminant of the node-A constraint for a given node-C resistance.
    pub fn discriminant(&self, rc: f64) -> f64 {
        let c = self.coefficients();
        4.0 * (c.disc_const + c.disc_rc * rc + c.disc_rc2 * rc * rc)
    }

    /// Goals from a measured input impedance and the live capacitor values.
    pub fn calculate_matching_goals(
        &self,
        rm: f64,
        xm: f64,
        vvc0_pf: f64,
        vvc1_pf: f64,
        motor0: &MotorSimulator,
        motor1: &MotorSimulator,
    ) -> MatchingGoals {
        self.solve_goals(rm, xm, vvc0_pf, vvc1_pf, None, motor0, motor1)
    }

    /// Goals with an optional externally derived node C.
    ///
    /// When `node_c` is given (from the output sensor), it replaces the
    /// node C derived from the input reading.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_goals(
        &self,
        rm: f64,
        xm: f64,
        vvc0_pf: f64,
        vvc1_pf: f64,
        node_c: Option<Impedance>,
        motor0: &MotorSimulator,
        motor1: &MotorSimulator,
    ) -> MatchingGoals {
        let c = self.coefficients();
        let w = self.constants().omega;
        let (ra_goal, xa_goal, rb) = (c.ra_goal, c.xa_goal, c.rb_const);

        let zb = self.calculate_zb(vvc0_pf);
        let zc = node_c.unwrap_or_else(|| {
            let za = self.calculate_za(rm, xm);
            self.calculate_zc(za, zb)
        });
        let zd = self.calculate_zd(zc);
        let rc = zc.r();

        let mut goals = MatchingGoals {
            ra_goal,
            xa_goal,
            discriminant: self.discriminant(rc),
            branches: [GoalCandidate::default(); 2],
        };

        let denom_xb = 2.0 * (ra_goal - rc);
        let denom_xc = ra_goal - rb;
        if !goals.discriminant.is_finite()
            || goals.discriminant < 0.0
            || denom_xb.abs() < 1e-12
            || denom_xc.abs() < 1e-12
        {
            trace!(
                "No goal: discriminant={:.4e}, denom_xb={:.4e}, denom_xc={:.4e}",
                goals.discriminant, denom_xb, denom_xc
            );
            return goals;
        }

        let root = goals.discriminant.sqrt();

        for (branch, sign) in [(0usize, -1.0), (1, 1.0)] {
            let xb_goal = guarded_ratio(-2.0 * rc * xa_goal + sign * root, denom_xb);
            let xc_goal = guarded_ratio(-rb * xa_goal - sign * root / 2.0, denom_xc);
            let xd_goal = self.calculate_zd(Impedance::new(rc, xc_goal)).x();

            let vvc0_goal = retune(vvc0_pf, w, zb.x(), xb_goal);
            let vvc1_goal = retune(vvc1_pf, w, zd.x(), xd_goal);

            let finite = vvc0_goal.is_finite() && vvc1_goal.is_finite();
            let valid = finite
                && [vvc0_goal, vvc1_goal].iter().all(|cap| {
                    motor0.accepts_capacitance(*cap) && motor1.accepts_capacitance(*cap)
                });

            goals.branches[branch] = GoalCandidate {
                vvc0_pf: vvc0_goal,
                vvc1_pf: vvc1_goal,
                step0: if finite {
                    motor0.position_for_capacitance(vvc0_goal)
                } else {
                    motor0.position()
                },
                step1: if finite {
                    motor1.position_for_capacitance(vvc1_goal)
                } else {
                    motor1.position()
                },
                valid,
            };
        }

        trace!(
            "Goals: D={:.4e}, b0=({:.2}, {:.2}) valid={}, b1=({:.2}, {:.2}) valid={}",
            goals.discriminant,
            goals.branches[0].vvc0_pf,
            goals.branches[0].vvc1_pf,
            goals.branches[0].valid,
            goals.branches[1].vvc0_pf,
            goals.branches[1].vvc1_pf,
            goals.branches[1].valid
        );
        goals
    }
}

/// Capacitance (pF) that shifts a series capacitor's reactance from `x_now`
/// to `x_goal`. NaN when no finite capacitance does.
fn retune(current_pf: f64, omega: f64, x_now: f64, x_goal: f64) -> f64 {
    let c = pf(current_pf);
    let denom = 1.0 + c * omega * (x_now - x_goal);
    if denom.abs() < 1e-12 {
        return f64::NAN;
    }
    current_pf / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::constants::CircuitConstants;
    use crate::physics::impedance::vswr;
    use crate::physics::network::reverse_chain;
    use rfm::matcher::config::MotorConfig;

    fn motors() -> (MotorSimulator, MotorSimulator) {
        (
            MotorSimulator::new(MotorConfig::with_position("vvc0", 32000)),
            MotorSimulator::new(MotorConfig::with_position("vvc1", 17600)),
        )
    }

    #[test]
    fn test_reference_goal_branch_zero() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let (m0, m1) = motors();
        let zm = reverse_chain(solver.constants(), Impedance::new(9.0, 10.0), 500.0, 275.0).input;

        let goals = solver.calculate_matching_goals(zm.r(), zm.x(), 500.0, 275.0, &m0, &m1);
        assert!(goals.discriminant > 0.0);

        let (branch, goal) = goals.select().unwrap();
        assert_eq!(branch, 0);
        assert!((goal.vvc0_pf - 305.02).abs() < 0.05, "vvc0 = {}", goal.vvc0_pf);
        assert!((goal.vvc1_pf - 145.08).abs() < 0.05, "vvc1 = {}", goal.vvc1_pf);

        let matched = reverse_chain(
            solver.constants(),
            Impedance::new(9.0, 10.0),
            goal.vvc0_pf,
            goal.vvc1_pf,
        )
        .input;
        assert!(vswr(matched, 50.0) < 1.02);
    }

    #[test]
    fn test_negative_discriminant_invalidates_both() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let (m0, m1) = motors();
        let goals = solver.solve_goals(
            1.0,
            -8.0,
            500.0,
            275.0,
            Some(Impedance::new(1000.0, 0.0)),
            &m0,
            &m1,
        );
        assert!(goals.discriminant < 0.0);
        assert!(!goals.branches[0].valid);
        assert!(!goals.branches[1].valid);
        assert!(goals.select().is_none());
    }

    #[test]
    fn test_out_of_range_capacitance_invalidates_branch() {
        let solver = ForwardSolver::new(CircuitConstants::default());
        let mut narrow = MotorConfig::with_position("vvc0", 32000);
        narrow.min_cap_pf = 600.0;
        let m0 = MotorSimulator::new(narrow);
        let (_, m1) = motors();
        let zm = reverse_chain(solver.constants(), Impedance::new(9.0, 10.0), 500.0, 275.0).input;

        let goals = solver.calculate_matching_goals(zm.r(), zm.x(), 500.0, 275.0, &m0, &m1);
        assert!(!goals.branches[0].valid);
        if let Some((branch, goal)) = goals.select() {
            assert_eq!(branch, 1);
            assert!(goal.vvc0_pf >= 600.0);
        }
    }

    #[test]
    fn test_select_falls_back_to_branch_one() {
        let candidate = GoalCandidate {
            vvc0_pf: 100.0,
            vvc1_pf: 200.0,
            step0: 6400,
            step1: 12800,
            valid: true,
        };
        let goals = MatchingGoals {
            ra_goal: 0.0,
            xa_goal: 0.0,
            discriminant: 1.0,
            branches: [GoalCandidate::default(), candidate],
        };
        assert_eq!(goals.select(), Some((1, candidate)));
        assert!(goals.any_valid());
    }
}
