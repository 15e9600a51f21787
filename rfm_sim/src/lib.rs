//! # RFM Simulator Library
//!
//! Emulator of an L-type RF impedance-matching network with two motorized
//! vacuum variable capacitors (VVC0, VVC1) and an auto-matching loop.
//!
//! # Module Structure
//!
//! - [`physics`] - Impedance arithmetic, reverse/forward network solvers, matching goals
//! - [`motor`] - Stepper motor integrator and capacitance curve
//! - [`ams`] - Auto-matching state machine
//! - [`core`] - SimCore scheduler
//! - [`sink`] - Response sink implementations
//! - [`state`] - Motor position persistence
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       SimCore (scheduler)                    │
//! │  motor tick ─► motor stream ─► impedance stream ─► AMS tick  │
//! └──────┬──────────────────┬───────────────────────┬────────────┘
//!        ▼                  ▼                       ▼
//!  MotorSimulator ×2  NetworkSimulator        AutoMatcher
//!  (steps ↔ pF)       (load → input + noise)  (ForwardSolver + goals)
//!                                                   │
//!                                                   ▼
//!                                             ResponseSink
//! ```

pub mod ams;
pub mod core;
pub mod motor;
pub mod physics;
pub mod sink;
pub mod state;

pub use crate::ams::{AmsSettings, AutoMatcher};
pub use crate::core::{SimCore, TimingStats};
pub use crate::motor::MotorSimulator;
pub use crate::sink::{JsonLineSink, RecordingSink, TracingSink};
pub use crate::state::{PersistedState, StatePersistence};
