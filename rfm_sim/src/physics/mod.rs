//! Matching-network physics.
//!
//! - [`impedance`] - Complex impedance with guarded division
//! - [`constants`] - Circuit element values
//! - [`network`] - Reverse evaluator (load to input) with sensor noise
//! - [`solver`] - Forward solver (input to load) on precomputed coefficients
//! - [`goals`] - Matching-goal solver

pub mod constants;
pub mod goals;
pub mod impedance;
pub mod network;
pub mod solver;

pub use constants::CircuitConstants;
pub use goals::{GoalCandidate, MatchingGoals};
pub use impedance::{Impedance, calculate_vswr, vswr};
pub use network::{ImpedanceProbe, NetworkSimulator};
pub use solver::ForwardSolver;
