//! Motor position persistence.
//!
//! Saves the step counters of both motors across restarts. State is
//! persisted using bincode with a format version and a save timestamp.

use rfm::matcher::sink::SimError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::motor::MotorSimulator;

/// Persisted state for a single motor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistedMotorState {
    /// Motor name (for matching on load)
    pub name: String,
    /// Last known position (steps)
    pub position: i32,
}

/// Persisted state for all motors.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PersistedState {
    /// Version of state format
    pub version: u32,
    pub motors: Vec<PersistedMotorState>,
    /// Timestamp of last save (Unix epoch seconds)
    pub saved_at: u64,
}

impl PersistedState {
    /// Current state format version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Snapshot the given motors.
    pub fn capture(motors: &[MotorSimulator]) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            motors: motors
                .iter()
                .map(|m| PersistedMotorState {
                    name: m.name().to_string(),
                    position: m.position(),
                })
                .collect(),
            saved_at: 0,
        }
    }

    /// Restore positions by motor name. Returns the number of motors restored.
    pub fn apply(&self, motors: &mut [MotorSimulator]) -> usize {
        let mut restored = 0;
        for motor in motors.iter_mut() {
            match self.motors.iter().find(|p| p.name == motor.name()) {
                Some(saved) => {
                    motor.set_origin(saved.position);
                    debug!("Restored motor {} at {}", saved.name, motor.position());
                    restored += 1;
                }
                None => debug!("No saved position for motor {}", motor.name()),
            }
        }
        restored
    }
}

/// State persistence manager.
pub struct StatePersistence {
    /// Path to state file
    path: PathBuf,
}

impl StatePersistence {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save state to file, stamping the current time.
    pub fn save(&self, state: &PersistedState) -> Result<(), SimError> {
        debug!("Saving state to {:?}", self.path);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SimError::PersistenceError(format!("Failed to create directory: {}", e))
            })?;
        }

        let mut state = state.clone();
        state.saved_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let file = File::create(&self.path).map_err(|e| {
            SimError::PersistenceError(format!("Failed to create state file: {}", e))
        })?;

        bincode::serialize_into(BufWriter::new(file), &state).map_err(|e| {
            SimError::PersistenceError(format!("Failed to serialize state: {}", e))
        })?;

        info!(
            "Saved state for {} motors to {:?}",
            state.motors.len(),
            self.path
        );
        Ok(())
    }

    /// Load state from file.
    ///
    /// A missing file or a different format version yields `Ok(None)`.
    pub fn load(&self) -> Result<Option<PersistedState>, SimError> {
        debug!("Loading state from {:?}", self.path);

        if !self.path.exists() {
            debug!("State file does not exist, starting fresh");
            return Ok(None);
        }

        let file = File::open(&self.path).map_err(|e| {
            SimError::PersistenceError(format!("Failed to open state file: {}", e))
        })?;

        let state: PersistedState =
            bincode::deserialize_from(BufReader::new(file)).map_err(|e| {
                SimError::PersistenceError(format!("Failed to deserialize state: {}", e))
            })?;

        if state.version != PersistedState::CURRENT_VERSION {
            warn!(
                "State file version {} differs from current {}, starting fresh",
                state.version,
                PersistedState::CURRENT_VERSION
            );
            return Ok(None);
        }

        info!(
            "Loaded state for {} motors from {:?} (saved at {})",
            state.motors.len(),
            self.path,
            state.saved_at
        );
        Ok(Some(state))
    }

    pub fn delete(&self) -> Result<(), SimError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                SimError::PersistenceError(format!("Failed to delete state file: {}", e))
            })?;
            info!("Deleted state file {:?}", self.path);
        }
        Ok(())
    }
}
