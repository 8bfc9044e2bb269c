//! Testing infrastructure for pypiserver integration tests.
//!
//! This crate provides the glue used by integration suites that drive a
//! live package index:
//! - `commands`: argument-vector builders for pip, twine, pypiserver, and
//!   venv creation
//! - `process`: synchronous and background subprocess execution
//! - `env`: scoped guards for PATH, venv activation, and the working
//!   directory
//! - `fixtures`: disposable virtual environments and bundled sample data

pub mod commands;
pub mod env;
pub mod error;
pub mod fixtures;
pub mod process;

pub use error::{Error, Result};
pub use fixtures::{ActiveVenv, VenvFixture};
pub use process::BackgroundProcess;
