//! Working directory handling.
//!
//! The annotation tool writes its listings into the current directory, so
//! each raw data file is processed from inside its own directory. The
//! process-wide working directory is only ever changed through
//! [`WorkdirGuard`], which puts the previous one back when dropped, and
//! through the interrupt handler, which restores the directory captured at
//! start-up before exiting.

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use tracing::{debug, warn};

use crate::error::CovinfoError;
use crate::Result;

/// Exit status used when the run is interrupted.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

/// Restores the previous working directory when dropped.
#[derive(Debug)]
#[must_use = "the working directory is restored as soon as the guard is dropped"]
pub struct WorkdirGuard {
    original: PathBuf,
}

impl WorkdirGuard {
    /// Change into `dir`, remembering the current directory.
    pub fn enter(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let original = env::current_dir()?;
        env::set_current_dir(dir).map_err(|source| CovinfoError::FileRead {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!("entered {}", dir.display());
        Ok(Self { original })
    }

    /// Directory that will be restored.
    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        if let Err(e) = restore_workdir(&self.original) {
            warn!("{e}");
        }
    }
}

/// Change back to `original`.
pub fn restore_workdir(original: &Path) -> Result<()> {
    env::set_current_dir(original).map_err(|source| {
        CovinfoError::Configuration(format!(
            "cannot restore working directory '{}': {source}",
            original.display()
        ))
    })
}

/// Install a Ctrl-C handler that restores the current working directory and exits.
///
/// Can only be installed once per process.
pub fn install_interrupt_handler() -> Result<()> {
    let original = env::current_dir()?;
    ctrlc::set_handler(move || {
        if let Err(e) = restore_workdir(&original) {
            eprintln!("Error: {e}");
        }
        eprintln!("Interrupted");
        process::exit(INTERRUPT_EXIT_CODE);
    })
    .map_err(|e| CovinfoError::Configuration(format!("cannot install interrupt handler: {e}")))
}

/// Serializes tests that change the process-wide working directory.
#[cfg(test)]
pub(crate) static CWD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
