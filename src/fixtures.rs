//! Reusable fixtures for integration suites.
//!
//! A fixture here is an RAII value: its scope is the binding's lifetime
//! and its teardown is `Drop`, so cleanup happens whether the test
//! passed or failed. Creating a venv is relatively expensive, so share
//! one across as wide a scope as the suite allows.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::commands::{VenvStyle, create_venv_cmd};
use crate::env::VenvActivation;
use crate::process::run;

/// A disposable virtual environment in its own temporary directory.
///
/// The whole tree is removed when the fixture drops.
///
/// # Example
/// ```no_run
/// use pypiserver_testing::VenvFixture;
///
/// let venv = VenvFixture::create().unwrap();
/// assert!(venv.bin_dir().join("pip").exists());
/// // dropped here; the directory is gone
/// ```
#[derive(Debug)]
pub struct VenvFixture {
    // Held for its Drop: removes the tree containing the venv.
    _root: TempDir,
    venv_dir: PathBuf,
}

impl VenvFixture {
    /// Create a venv with the default interpreter and invocation style.
    pub fn create() -> Result<VenvFixture> {
        Self::builder().create()
    }

    /// Start configuring a venv fixture.
    pub fn builder() -> VenvFixtureBuilder {
        VenvFixtureBuilder {
            python: None,
            style: None,
            args: Vec::new(),
        }
    }

    /// Get the venv's root directory.
    pub fn path(&self) -> &Path {
        &self.venv_dir
    }

    /// Get the venv's executable directory (POSIX layout).
    pub fn bin_dir(&self) -> PathBuf {
        self.venv_dir.join("bin")
    }

    /// Get the venv's interpreter launcher.
    pub fn interpreter(&self) -> PathBuf {
        self.bin_dir().join("python")
    }

    /// Activate this venv for the lifetime of the returned guard.
    pub fn activate(&self) -> VenvActivation {
        VenvActivation::activate(&self.venv_dir)
    }
}

/// Builder for [`VenvFixture`].
pub struct VenvFixtureBuilder {
    python: Option<String>,
    style: Option<VenvStyle>,
    args: Vec<String>,
}

impl VenvFixtureBuilder {
    /// Select the interpreter, as a basename (like "python3.11") or a
    /// full path. Defaults to [`crate::commands::default_python`].
    pub fn python(mut self, python: impl Into<String>) -> Self {
        self.python = Some(python.into());
        self
    }

    /// Select the invocation style. Defaults to [`VenvStyle::resolved`].
    pub fn style(mut self, style: VenvStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Append an extra argument for the venv-creation tool.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Create the venv.
    pub fn create(self) -> Result<VenvFixture> {
        let root = TempDir::new().context("failed to create venv scratch directory")?;
        let venv_dir = root.path().join("venv");
        let style = self.style.unwrap_or_else(VenvStyle::resolved);
        let cmd = create_venv_cmd(&venv_dir, self.python.as_deref(), style, &self.args);
        run(&cmd).with_context(|| format!("failed to create venv at {}", venv_dir.display()))?;
        Ok(VenvFixture {
            _root: root,
            venv_dir,
        })
    }
}

/// A venv fixture that is active for as long as it lives.
///
/// Composes a [`VenvFixture`] with a [`VenvActivation`] whose lifetime
/// matches the fixture's. Field order matters: the environment is
/// restored before the venv tree is removed.
pub struct ActiveVenv {
    _activation: VenvActivation,
    venv: VenvFixture,
}

impl ActiveVenv {
    /// Create and activate a venv with the defaults.
    pub fn create() -> Result<ActiveVenv> {
        Ok(Self::from_venv(VenvFixture::create()?))
    }

    /// Activate an existing venv fixture, taking ownership of it.
    pub fn from_venv(venv: VenvFixture) -> ActiveVenv {
        let activation = venv.activate();
        ActiveVenv {
            _activation: activation,
            venv,
        }
    }

    /// Get the venv's root directory.
    pub fn path(&self) -> &Path {
        self.venv.path()
    }

    /// Get the underlying venv fixture.
    pub fn venv(&self) -> &VenvFixture {
        &self.venv
    }
}

/// Get the path to the bundled sample package source tree.
///
/// The package is a minimal installable project used by upload tests:
/// build an sdist or wheel from it, then push the artifact at the index
/// under test.
pub fn sample_package_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/simple_pkg")
}
