//! Builders for the external commands the integration tests drive.
//!
//! Each builder is a pure token producer: it assembles an argument vector
//! suitable for [`crate::process::run`] or
//! [`crate::process::BackgroundProcess`] and performs no I/O itself.
//!
//! Try to keep definitions alphabetical to make them easy to find.

use once_cell::sync::Lazy;
use std::path::Path;

/// Index endpoint used when the caller supplies no index argument.
pub const DEFAULT_INDEX_URL: &str = "http://localhost:8080";

/// Placeholder username appended by [`twine_cmd`] when `-u` is absent.
pub const DEFAULT_USERNAME: &str = "username";

/// Placeholder password appended by [`twine_cmd`] when `-p` is absent.
pub const DEFAULT_PASSWORD: &str = "password";

/// Flags pip accepts for selecting an index.
const INDEX_FLAG_ALIASES: [&str; 3] = ["-i", "--index", "--index-url"];

/// Pip operations that fetch from an index.
const INDEX_OPERATIONS: [&str; 3] = ["install", "download", "search"];

static RESOLVED_VENV_STYLE: Lazy<VenvStyle> = Lazy::new(VenvStyle::from_env);

static RESOLVED_PYTHON: Lazy<String> =
    Lazy::new(|| std::env::var("PYPISERVER_TEST_PYTHON").unwrap_or_else(|_| "python3".to_string()));

/// Invocation convention for creating a virtual environment.
///
/// Two historical conventions exist; rather than sniffing the interpreter
/// at call time, the convention is an explicit value. The process-wide
/// default is resolved once, see [`VenvStyle::resolved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenvStyle {
    /// `<python> -m venv <dir>` (the stdlib module)
    Module,
    /// `virtualenv -p <python> <dir>` (the standalone tool)
    Virtualenv,
}

impl VenvStyle {
    /// Get the process-wide default style.
    ///
    /// Resolved once per process: `PYPISERVER_TEST_VENV_STYLE=virtualenv`
    /// selects the standalone tool, anything else the stdlib module.
    pub fn resolved() -> VenvStyle {
        *RESOLVED_VENV_STYLE
    }

    fn from_env() -> VenvStyle {
        match std::env::var("PYPISERVER_TEST_VENV_STYLE") {
            Ok(value) if value.eq_ignore_ascii_case("virtualenv") => VenvStyle::Virtualenv,
            _ => VenvStyle::Module,
        }
    }
}

/// Build a command to create a venv at `venv_dir`.
///
/// `python` selects the interpreter, either as a basename (like
/// "python3.11") or a full path; `None` falls back to
/// [`default_python`]. Extra arguments for the creation tool are
/// appended after the target directory.
pub fn create_venv_cmd<S: AsRef<str>>(
    venv_dir: impl AsRef<Path>,
    python: Option<&str>,
    style: VenvStyle,
    args: &[S],
) -> Vec<String> {
    let python = match python {
        Some(python) => python.to_string(),
        None => default_python(),
    };
    let mut cmd = match style {
        VenvStyle::Module => vec![python, "-m".to_string(), "venv".to_string()],
        VenvStyle::Virtualenv => vec!["virtualenv".to_string(), "-p".to_string(), python],
    };
    cmd.push(venv_dir.as_ref().display().to_string());
    cmd.extend(args.iter().map(|arg| arg.as_ref().to_string()));
    cmd
}

/// Get the interpreter used when a builder is given no explicit one.
///
/// Resolved once per process, like [`VenvStyle::resolved`]: honors
/// `PYPISERVER_TEST_PYTHON`, falling back to `python3`.
pub fn default_python() -> String {
    RESOLVED_PYTHON.clone()
}

/// Build a command to run pip.
///
/// The supplied arguments pass through verbatim. If they request an
/// operation that fetches from an index (install/download/search) and
/// carry no index flag of their own, `-i <default_index>` is appended.
/// This is membership testing over the argument set, not positional
/// parsing, so flag order does not matter.
pub fn pip_cmd<S: AsRef<str>>(default_index: &str, args: &[S]) -> Vec<String> {
    let mut cmd = vec!["pip".to_string()];
    cmd.extend(args.iter().map(|arg| arg.as_ref().to_string()));
    let fetches = args
        .iter()
        .any(|arg| INDEX_OPERATIONS.contains(&arg.as_ref()));
    let has_index = args
        .iter()
        .any(|arg| INDEX_FLAG_ALIASES.contains(&arg.as_ref()));
    if fetches && !has_index {
        cmd.push("-i".to_string());
        cmd.push(default_index.to_string());
    }
    cmd
}

/// Build a command to run pypiserver against the package root `root`.
///
/// `subcommand` defaults to `run`; extra arguments pass through verbatim.
pub fn pypiserver_cmd<S: AsRef<str>>(
    root: impl AsRef<Path>,
    subcommand: Option<&str>,
    args: &[S],
) -> Vec<String> {
    let mut cmd = vec![
        "pypiserver".to_string(),
        subcommand.unwrap_or("run").to_string(),
        root.as_ref().display().to_string(),
    ];
    cmd.extend(args.iter().map(|arg| arg.as_ref().to_string()));
    cmd
}

/// Build a command to run twine against the repository at `repo_url`.
///
/// Appends `--repository-url <repo_url>`, and the placeholder credential
/// pairs for whichever of `-u`/`-p` the supplied arguments do not
/// already carry.
pub fn twine_cmd<S: AsRef<str>>(repo_url: &str, args: &[S]) -> Vec<String> {
    let mut cmd = vec!["twine".to_string()];
    cmd.extend(args.iter().map(|arg| arg.as_ref().to_string()));
    cmd.push("--repository-url".to_string());
    cmd.push(repo_url.to_string());
    if !args.iter().any(|arg| arg.as_ref() == "-u") {
        cmd.push("-u".to_string());
        cmd.push(DEFAULT_USERNAME.to_string());
    }
    if !args.iter().any(|arg| arg.as_ref() == "-p") {
        cmd.push("-p".to_string());
        cmd.push(DEFAULT_PASSWORD.to_string());
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_pip_install_appends_default_index() {
        let cmd = pip_cmd(DEFAULT_INDEX_URL, &["install", "foo"]);
        assert_eq!(
            cmd,
            vec!["pip", "install", "foo", "-i", "http://localhost:8080"]
        );
    }

    #[test]
    fn test_pip_appends_provided_index() {
        let cmd = pip_cmd("http://pypi.internal:9000", &["download", "foo"]);
        assert_eq!(
            cmd,
            vec!["pip", "download", "foo", "-i", "http://pypi.internal:9000"]
        );
    }

    #[test]
    fn test_pip_existing_index_flag_suppresses_default() {
        for alias in ["-i", "--index", "--index-url"] {
            let cmd = pip_cmd(DEFAULT_INDEX_URL, &["install", "foo", alias, "http://other"]);
            assert_eq!(cmd, vec!["pip", "install", "foo", alias, "http://other"]);
        }
    }

    #[test]
    fn test_pip_index_flag_position_does_not_matter() {
        let cmd = pip_cmd(DEFAULT_INDEX_URL, &["-i", "http://other", "install", "foo"]);
        assert_eq!(cmd, vec!["pip", "-i", "http://other", "install", "foo"]);
    }

    #[test]
    fn test_pip_non_fetch_operation_gets_no_index() {
        let cmd = pip_cmd(DEFAULT_INDEX_URL, &["freeze"]);
        assert_eq!(cmd, vec!["pip", "freeze"]);
        let cmd = pip_cmd(DEFAULT_INDEX_URL, &["uninstall", "foo", "-y"]);
        assert_eq!(cmd, vec!["pip", "uninstall", "foo", "-y"]);
    }

    #[test]
    fn test_pip_search_appends_default_index() {
        let cmd = pip_cmd(DEFAULT_INDEX_URL, &["search", "foo"]);
        assert_eq!(cmd, vec!["pip", "search", "foo", "-i", "http://localhost:8080"]);
    }

    #[test]
    fn test_pypiserver_default_subcommand() {
        let cmd = pypiserver_cmd("/srv/pkgs", None, &[] as &[&str]);
        assert_eq!(cmd, vec!["pypiserver", "run", "/srv/pkgs"]);
    }

    #[test]
    fn test_pypiserver_explicit_subcommand_and_args() {
        let cmd = pypiserver_cmd("/srv/pkgs", Some("update"), &["--dry-run"]);
        assert_eq!(cmd, vec!["pypiserver", "update", "/srv/pkgs", "--dry-run"]);
    }

    #[test]
    fn test_twine_appends_repository_and_default_credentials() {
        let cmd = twine_cmd(DEFAULT_INDEX_URL, &["upload", "dist/*"]);
        assert_eq!(
            cmd,
            vec![
                "twine",
                "upload",
                "dist/*",
                "--repository-url",
                "http://localhost:8080",
                "-u",
                "username",
                "-p",
                "password",
            ]
        );
    }

    #[test]
    fn test_twine_explicit_username_suppresses_default() {
        let cmd = twine_cmd(DEFAULT_INDEX_URL, &["upload", "dist/*", "-u", "me"]);
        assert!(!cmd.iter().any(|t| t == "username"));
        assert_eq!(cmd.last().map(String::as_str), Some("password"));
    }

    #[test]
    fn test_twine_explicit_password_suppresses_default() {
        let cmd = twine_cmd(DEFAULT_INDEX_URL, &["upload", "dist/*", "-p", "hunter2"]);
        assert!(!cmd.iter().any(|t| t == "password"));
        assert!(cmd.iter().any(|t| t == "username"));
    }

    #[test]
    fn test_create_venv_cmd_module_style() {
        let cmd = create_venv_cmd("/tmp/venv", Some("python3.11"), VenvStyle::Module, &[] as &[&str]);
        assert_eq!(cmd, vec!["python3.11", "-m", "venv", "/tmp/venv"]);
    }

    #[test]
    fn test_create_venv_cmd_virtualenv_style() {
        let cmd = create_venv_cmd("/tmp/venv", Some("python2.7"), VenvStyle::Virtualenv, &[] as &[&str]);
        assert_eq!(cmd, vec!["virtualenv", "-p", "python2.7", "/tmp/venv"]);
    }

    #[test]
    fn test_create_venv_cmd_appends_extra_args() {
        let cmd = create_venv_cmd(
            "/tmp/venv",
            Some("python3"),
            VenvStyle::Module,
            &["--copies", "--clear"],
        );
        assert_eq!(
            cmd,
            vec!["python3", "-m", "venv", "/tmp/venv", "--copies", "--clear"]
        );
    }

    #[test]
    fn test_create_venv_cmd_default_interpreter() {
        let cmd = create_venv_cmd("/tmp/venv", None, VenvStyle::Module, &[] as &[&str]);
        assert_eq!(cmd[0], default_python());
    }

    // The style variable is process-global, so the parsing tests
    // serialize and clean up after themselves.
    static STYLE_VAR_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_venv_style_from_env_selects_virtualenv_case_insensitively() {
        let _lock = STYLE_VAR_LOCK.lock().unwrap_or_else(|err| err.into_inner());
        for value in ["virtualenv", "VIRTUALENV", "VirtualEnv"] {
            unsafe {
                std::env::set_var("PYPISERVER_TEST_VENV_STYLE", value);
            }
            assert_eq!(VenvStyle::from_env(), VenvStyle::Virtualenv);
        }
        unsafe {
            std::env::remove_var("PYPISERVER_TEST_VENV_STYLE");
        }
    }

    #[test]
    fn test_venv_style_from_env_defaults_to_module() {
        let _lock = STYLE_VAR_LOCK.lock().unwrap_or_else(|err| err.into_inner());
        unsafe {
            std::env::remove_var("PYPISERVER_TEST_VENV_STYLE");
        }
        assert_eq!(VenvStyle::from_env(), VenvStyle::Module);
        unsafe {
            std::env::set_var("PYPISERVER_TEST_VENV_STYLE", "stdlib");
        }
        assert_eq!(VenvStyle::from_env(), VenvStyle::Module);
        unsafe {
            std::env::remove_var("PYPISERVER_TEST_VENV_STYLE");
        }
    }
}
