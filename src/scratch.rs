//! Worker-scoped scratch files for external validation.
//!
//! The external grammar parser only consumes files, so artifacts are
//! materialized on disk just long enough to be checked. Each handle embeds
//! the process id and the worker id that leased it, so two concurrently
//! running workers never resolve to the same path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// Identity of a pool worker; scopes scratch-file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// A uniquely named scratch path owned for the duration of one task.
///
/// Dropping the handle removes any file left behind, so the path is clean on
/// every exit path including parser failures.
#[derive(Debug)]
pub struct ScratchHandle {
    path: PathBuf,
}

impl ScratchHandle {
    pub fn new(dir: &Path, worker: WorkerId) -> Self {
        let name = format!("planforge_{}_{}.pddl", std::process::id(), worker);
        Self {
            path: dir.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `content` to the scratch path, overwriting any previous round.
    pub fn materialize(&self, content: &str) -> Result<&Path> {
        fs::write(&self.path, content)?;
        Ok(&self.path)
    }

    /// Remove the scratch file. Safe to call when nothing was materialized.
    pub fn cleanup(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl Drop for ScratchHandle {
    fn drop(&mut self) {
        self.cleanup();
    }
}
