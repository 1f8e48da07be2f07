// chaff/src/persist.rs
//
// The one piece of state that survives restarts: the weekly-drift seed and
// the last session end. The seed keeps the drift phase stable across
// restarts (a phase jump on every reboot would itself be a signature);
// everything else is deliberately fresh entropy.

use std::path::Path;

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftState {
    pub drift_seed:       u32, // 31-bit
    pub last_session_end: f64,
}

impl DriftState {
    fn fresh() -> Self {
        Self {
            drift_seed:       rand::thread_rng().gen_range(0..(1u32 << 31)),
            last_session_end: 0.0,
        }
    }

    /// Load from `path`, re-randomising the seed when the file is absent or
    /// unreadable.
    pub fn load_or_init(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<DriftState>(&raw) {
                Ok(state) => {
                    info!(seed = state.drift_seed, "loaded timing state from {}", path.display());
                    state
                }
                Err(e) => {
                    warn!("corrupt timing state at {}: {e}; re-seeding", path.display());
                    Self::fresh()
                }
            },
            Err(_) => {
                let state = Self::fresh();
                info!(seed = state.drift_seed, "no timing state at {}, seeded fresh", path.display());
                state
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)
            .with_context(|| format!("writing timing state to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = DriftState { drift_seed: 12345, last_session_end: 1_700_000_000.5 };
        state.save(&path).unwrap();
        let loaded = DriftState::load_or_init(&path);
        assert_eq!(loaded.drift_seed, 12345);
        assert_eq!(loaded.last_session_end, 1_700_000_000.5);
    }

    #[test]
    fn missing_file_reseeds() {
        let dir = tempfile::tempdir().unwrap();
        let state = DriftState::load_or_init(&dir.path().join("nope.json"));
        assert!(state.drift_seed < (1 << 31));
        assert_eq!(state.last_session_end, 0.0);
    }

    #[test]
    fn corrupt_file_reseeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let state = DriftState::load_or_init(&path);
        assert_eq!(state.last_session_end, 0.0);
    }
}
