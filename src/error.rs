use std::fmt;

/// Result type for pypiserver-testing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur when running subprocesses
#[derive(Debug)]
pub enum Error {
    /// IO operation failed
    Io(std::io::Error),
    /// A subprocess exited with a nonzero status while `check` was set
    CommandFailed {
        /// The command that was run, as the token vector handed to the runner
        command: Vec<String>,
        /// Exit code, or `None` if the process was terminated by a signal
        code: Option<i32>,
        /// Captured stdout, if capture was requested
        stdout: Option<String>,
        /// Captured stderr, if capture was requested
        stderr: Option<String>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::CommandFailed { command, code, .. } => match code {
                Some(code) => {
                    write!(f, "command {:?} exited with code {}", command, code)
                }
                None => write!(f, "command {:?} was terminated by a signal", command),
            },
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::CommandFailed { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
