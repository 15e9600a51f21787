//! Prelude module for common re-exports.
//!
//! Consumers can do `use rfm_common::prelude::*;` and get the most
//! important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use rfm_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig, Validate};
pub use crate::matcher::config::{MotorConfig, SimulatorConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MOTOR_COUNT, VSWR_SENTINEL, Z0_OHM};

// ─── Reports & Events ───────────────────────────────────────────────
pub use crate::matcher::sink::{ResponseSink, SimError};
pub use crate::matcher::types::{AmsEvent, AmsMode, SensorReading, SimEvent};

