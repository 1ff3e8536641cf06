//! Discovery checkpoint persistence
//!
//! The collector records how many listing steps it has completed so a
//! restarted run resumes where it left off instead of replaying the whole
//! pagination. Re-walking a page would be harmless (inserts are idempotent)
//! but wasteful.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointState {
    steps_completed: u64,
}

/// File-backed count of completed discovery steps
#[derive(Debug)]
pub struct CollectorCheckpoint {
    path: PathBuf,
    state: CheckpointState,
}

impl CollectorCheckpoint {
    /// Loads the checkpoint, starting fresh if the file is missing or corrupt
    pub fn load(path: &Path) -> Self {
        let state = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        "Could not parse collector checkpoint {}: {}; starting fresh",
                        path.display(),
                        e
                    );
                    CheckpointState::default()
                }
            },
            Err(_) => CheckpointState::default(),
        };

        Self {
            path: path.to_path_buf(),
            state,
        }
    }

    pub fn steps_completed(&self) -> u64 {
        self.state.steps_completed
    }

    /// Records that all steps up to `step` are done and persists the file
    ///
    /// The write goes through a temp file and a rename so a crash mid-write
    /// can never leave a truncated checkpoint behind.
    pub fn advance_to(&mut self, step: u64) -> io::Result<()> {
        if step <= self.state.steps_completed {
            return Ok(());
        }
        self.state.steps_completed = step;
        self.save()
    }

    fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string(&self.state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
