//! Scoped mutators for process-global state (POSIX only!).
//!
//! Each guard saves the state it is about to mutate and restores it in
//! `Drop`, so restoration runs on every exit path, including unwinding
//! panics. The environment table and working directory are shared by
//! the whole process: a guard assumes exclusive ownership of them for
//! its lifetime, and the guards are not safe to use from multiple
//! threads at once. Tests that use them should serialize (e.g. behind a
//! mutex or with `--test-threads=1`).

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Environment variable naming the active virtual environment root.
pub const VIRTUAL_ENV_VAR: &str = "VIRTUAL_ENV";

/// Environment variable naming the venv's interpreter launcher.
pub const PYVENV_LAUNCHER_VAR: &str = "__PYVENV_LAUNCHER__";

// SAFETY for all set_var/remove_var calls in this module: the guards'
// documented contract is exclusive single-threaded ownership of the
// environment table for their lifetime.

/// Scoped guard that changes the working directory and changes back.
pub struct CurrentDirGuard {
    saved: PathBuf,
}

impl CurrentDirGuard {
    /// Change to `target`, remembering the current directory.
    pub fn change(target: impl AsRef<Path>) -> Result<CurrentDirGuard> {
        let saved = env::current_dir()?;
        env::set_current_dir(target)?;
        Ok(CurrentDirGuard { saved })
    }
}

impl Drop for CurrentDirGuard {
    fn drop(&mut self) {
        // Nothing useful to do with a failure during unwinding
        let _ = env::set_current_dir(&self.saved);
    }
}

/// Scoped guard that prepends a directory to PATH.
pub struct PathGuard {
    saved: Option<OsString>,
}

impl PathGuard {
    /// Put `dir` at the front of PATH, remembering the prior value.
    pub fn prepend(dir: impl AsRef<Path>) -> PathGuard {
        let saved = env::var_os("PATH");
        let prefixed = match &saved {
            Some(current) => {
                let mut joined = OsString::from(dir.as_ref());
                joined.push(":");
                joined.push(current);
                joined
            }
            None => dir.as_ref().into(),
        };
        unsafe {
            env::set_var("PATH", prefixed);
        }
        PathGuard { saved }
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        unsafe {
            match self.saved.take() {
                Some(value) => env::set_var("PATH", value),
                None => env::remove_var("PATH"),
            }
        }
    }
}

/// Scoped activation of a virtual environment (POSIX only!).
///
/// Sets the venv marker variables and exposes `<venv>/bin` at the front
/// of PATH. On drop the *complete* prior environment is restored from a
/// snapshot, not just the keys that were touched, so anything the
/// activated scope exported is discarded too.
pub struct VenvActivation {
    snapshot: HashMap<OsString, OsString>,
    _path: PathGuard,
}

impl VenvActivation {
    /// Activate the venv rooted at `venv_dir`.
    pub fn activate(venv_dir: impl AsRef<Path>) -> VenvActivation {
        let snapshot: HashMap<OsString, OsString> = env::vars_os().collect();
        let venv_dir = venv_dir.as_ref();
        unsafe {
            env::set_var(VIRTUAL_ENV_VAR, venv_dir);
            env::set_var(
                PYVENV_LAUNCHER_VAR,
                format!("{}/bin/python", venv_dir.display()),
            );
        }
        let path = PathGuard::prepend(venv_dir.join("bin"));
        VenvActivation {
            snapshot,
            _path: path,
        }
    }
}

impl Drop for VenvActivation {
    fn drop(&mut self) {
        unsafe {
            for (key, _) in env::vars_os() {
                env::remove_var(&key);
            }
            for (key, value) in self.snapshot.drain() {
                env::set_var(key, value);
            }
        }
        // The PathGuard field drops afterwards; its saved PATH is the
        // same pre-activation value the snapshot just restored.
    }
}
