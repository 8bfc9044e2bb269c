//! Synchronous and background subprocess execution.
//!
//! [`run`] covers the common case: start a command, wait for it, and
//! fail the test if it exits nonzero. [`BackgroundProcess`] starts a
//! command without waiting, for long-running collaborators like the
//! index server itself; the caller owns the handle and is responsible
//! for polling or terminating it.

use std::io;
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::time::Duration;

use crate::error::{Error, Result};

/// Options for [`run_with`] and [`BackgroundProcess::spawn_with`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Fail with [`Error::CommandFailed`] on a nonzero exit status.
    pub check: bool,
    /// Capture stdout and stderr instead of inheriting them.
    pub capture: bool,
    /// Working directory for the child, if different from the parent's.
    pub current_dir: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub envs: Vec<(String, String)>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            check: true,
            capture: false,
            current_dir: None,
            envs: Vec::new(),
        }
    }
}

/// Outcome of a completed [`run`].
#[derive(Debug)]
pub struct RunOutput {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    /// Captured stdout, present when capture was requested.
    pub stdout: Option<String>,
    /// Captured stderr, present when capture was requested.
    pub stderr: Option<String>,
}

impl RunOutput {
    /// Check if the command exited with code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Get captured stdout, or an empty string if nothing was captured.
    pub fn stdout(&self) -> &str {
        self.stdout.as_deref().unwrap_or("")
    }

    /// Get captured stderr, or an empty string if nothing was captured.
    pub fn stderr(&self) -> &str {
        self.stderr.as_deref().unwrap_or("")
    }

    /// Parse captured stdout as JSON.
    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(self.stdout())?)
    }
}

/// Run a command and wait for it to complete.
///
/// Equivalent to [`run_with`] with default options: a nonzero exit
/// status is an error, and output is inherited rather than captured.
pub fn run<S: AsRef<str>>(cmd: &[S]) -> Result<RunOutput> {
    run_with(cmd, &RunOptions::default())
}

/// Run a command and wait for it to complete, with explicit options.
///
/// Captured streams are decoded as UTF-8 (lossily). When
/// `options.check` is set and the child exits nonzero, the returned
/// [`Error::CommandFailed`] carries the exit code, the command tokens,
/// and whatever output was captured.
pub fn run_with<S: AsRef<str>>(cmd: &[S], options: &RunOptions) -> Result<RunOutput> {
    let tokens = to_tokens(cmd);
    let mut command = build_command(&tokens, options)?;

    let (code, stdout, stderr) = if options.capture {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let output = command.output()?;
        (
            output.status.code(),
            Some(String::from_utf8_lossy(&output.stdout).to_string()),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        )
    } else {
        let status = command.status()?;
        (status.code(), None, None)
    };

    let output = RunOutput {
        code,
        stdout,
        stderr,
    };
    if options.check && !output.success() {
        return Err(Error::CommandFailed {
            command: tokens,
            code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    Ok(output)
}

/// A background process handle.
///
/// There is no built-in join or cancellation beyond [`wait_timeout`]
/// and [`kill`]; dropping the handle kills the child so a failing test
/// cannot leak a server process.
///
/// [`wait_timeout`]: BackgroundProcess::wait_timeout
/// [`kill`]: BackgroundProcess::kill
pub struct BackgroundProcess {
    child: Child,
}

impl BackgroundProcess {
    /// Spawn a command without waiting for it, inheriting stdio.
    pub fn spawn<S: AsRef<str>>(cmd: &[S]) -> Result<Self> {
        Self::spawn_with(cmd, &RunOptions::default())
    }

    /// Spawn a command without waiting, with piped stdout and stderr.
    ///
    /// This allows reading the process output while it's running.
    ///
    /// # Example
    /// ```no_run
    /// # use std::io::{BufRead, BufReader};
    /// # use pypiserver_testing::commands::pypiserver_cmd;
    /// # use pypiserver_testing::process::BackgroundProcess;
    /// let cmd = pypiserver_cmd("/srv/pkgs", None, &[] as &[&str]);
    /// let mut server = BackgroundProcess::spawn_piped(&cmd).unwrap();
    ///
    /// if let Some(stdout) = server.stdout() {
    ///     let reader = BufReader::new(stdout);
    ///     for line in reader.lines().take(5) {
    ///         println!("{:?}", line);
    ///     }
    /// }
    /// ```
    pub fn spawn_piped<S: AsRef<str>>(cmd: &[S]) -> Result<Self> {
        let options = RunOptions {
            capture: true,
            ..RunOptions::default()
        };
        Self::spawn_with(cmd, &options)
    }

    /// Spawn a command without waiting, with explicit options.
    ///
    /// `options.capture` selects piped stdio; `options.check` is
    /// meaningless here and ignored, since nothing waits on the exit
    /// status.
    pub fn spawn_with<S: AsRef<str>>(cmd: &[S], options: &RunOptions) -> Result<Self> {
        let tokens = to_tokens(cmd);
        let mut command = build_command(&tokens, options)?;
        if options.capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        let child = command.spawn()?;
        Ok(Self { child })
    }

    /// Check whether the process has exited, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Wait for the process to exit, up to `timeout`.
    ///
    /// Returns `Ok(None)` if the process is still running when the
    /// timeout elapses.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<ExitStatus>> {
        // Simple polling implementation
        let start = std::time::Instant::now();
        loop {
            match self.child.try_wait()? {
                Some(status) => return Ok(Some(status)),
                None => {
                    if start.elapsed() > timeout {
                        return Ok(None);
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }

    /// Kill the process.
    pub fn kill(&mut self) -> Result<()> {
        Ok(self.child.kill()?)
    }

    /// Get the process ID.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Get mutable access to the process's stdout.
    ///
    /// Returns `None` unless the process was spawned with piped stdio.
    pub fn stdout(&mut self) -> Option<&mut ChildStdout> {
        self.child.stdout.as_mut()
    }

    /// Get mutable access to the process's stderr.
    ///
    /// Returns `None` unless the process was spawned with piped stdio.
    pub fn stderr(&mut self) -> Option<&mut ChildStderr> {
        self.child.stderr.as_mut()
    }
}

impl Drop for BackgroundProcess {
    fn drop(&mut self) {
        // Ensure the child is killed when the handle goes out of scope
        let _ = self.child.kill();
    }
}

fn to_tokens<S: AsRef<str>>(cmd: &[S]) -> Vec<String> {
    cmd.iter().map(|token| token.as_ref().to_string()).collect()
}

fn build_command(tokens: &[String], options: &RunOptions) -> Result<Command> {
    let (program, args) = tokens.split_first().ok_or_else(|| {
        Error::Io(io::Error::new(io::ErrorKind::InvalidInput, "empty command"))
    })?;
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = &options.current_dir {
        command.current_dir(dir);
    }
    for (key, value) in &options.envs {
        command.env(key, value);
    }
    Ok(command)
}
