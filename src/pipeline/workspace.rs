//! Per-run temporary directory
//!
//! The process working directory is never changed; tools get the workspace
//! as their own working directory and absolute paths into it, so removing
//! the directory cannot pull the ground out from under the caller.

use crate::structs::{CorrError, Result};
use rand::Rng;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const PREFIX: &str = "tmp_dir_";
const MAX_ATTEMPTS: usize = 16;

/// Temporary directory owned by one orchestrator run
///
/// Dropping it removes the directory unless it was created with `keep`.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    keep: bool,
    created: bool,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `parent`
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn create(parent: &Path, keep: bool) -> Result<Self> {
        Self::create_with(parent, keep, random_name)
    }

    /// Create using `next_name` to draw candidate names, retrying on collision
    ///
    /// # Errors
    /// Returns error if every candidate already exists or creation fails
    pub fn create_with(
        parent: &Path,
        keep: bool,
        mut next_name: impl FnMut() -> String,
    ) -> Result<Self> {
        fs::create_dir_all(parent)?;

        for _ in 0..MAX_ATTEMPTS {
            let path = parent.join(next_name());
            match fs::create_dir(&path) {
                Ok(()) => {
                    info!("Creating temporary directory {}", path.display());
                    return Ok(Self {
                        path,
                        keep,
                        created: true,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    warn!("{} already exists, drawing a new name", path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CorrError::Workspace(format!(
            "no free directory name under {} after {MAX_ATTEMPTS} attempts",
            parent.display()
        )))
    }

    /// Name a workspace without touching the filesystem (dry runs)
    #[must_use]
    pub fn plan(parent: &Path) -> Self {
        Self {
            path: parent.join(random_name()),
            keep: true,
            created: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_kept(&self) -> bool {
        self.keep
    }

    /// Tear the workspace down, reporting failures instead of swallowing them
    ///
    /// # Errors
    /// Returns error if the directory cannot be removed
    pub fn close(mut self) -> Result<()> {
        let removed = self.remove();
        self.created = false;
        removed
    }

    fn remove(&self) -> Result<()> {
        if !self.created {
            return Ok(());
        }
        if self.keep {
            info!("Keeping temporary directory {}", self.path.display());
            return Ok(());
        }
        info!("Temporary directory and file clean-up");
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CorrError::Workspace(format!(
                "cannot remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("{e}");
        }
    }
}

fn random_name() -> String {
    let token: u64 = rand::rng().random();
    format!("{PREFIX}{token:016x}")
}
