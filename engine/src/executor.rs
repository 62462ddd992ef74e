//! Sync execution.
//!
//! The dispatch loop only knows the [`SyncExecutor`] trait. [`RsyncExecutor`]
//! is the production implementation and shells out to rsync.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::mapping::{Mapping, Settings};

/// Default rsync executable.
pub const DEFAULT_RSYNC_PATH: &str = "/usr/bin/rsync";

/// Flags passed to rsync ahead of any configured arguments.
pub const DEFAULT_RSYNC_FLAGS: &[&str] = &["-avzh"];

/// Everything an executor needs to mirror one mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Source tree.
    pub source: PathBuf,

    /// Destination descriptor.
    pub target: String,

    /// Exclusions as configured.
    pub exclusions: Vec<String>,

    /// Extra arguments from the global settings.
    pub extra_args: Vec<String>,
}

impl SyncRequest {
    /// Build a request for a mapping.
    pub fn new(mapping: &Mapping, settings: &Settings) -> Self {
        Self {
            source: mapping.source.clone(),
            target: mapping.target.clone(),
            exclusions: mapping.exclusions.clone(),
            extra_args: settings.extra_args.clone(),
        }
    }
}

/// Result of a sync attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Whether the sync succeeded.
    pub success: bool,

    /// Exit code, when the process ran to completion.
    pub exit_code: Option<i32>,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Wall time in milliseconds.
    pub duration_ms: u64,

    /// Error message if the sync could not be started.
    pub error: Option<String>,
}

impl SyncOutcome {
    /// Create a successful outcome.
    pub fn success(duration_ms: u64) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            duration_ms,
            ..Default::default()
        }
    }

    /// Create a failed outcome.
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            duration_ms,
            ..Default::default()
        }
    }

    /// Add stdout to the outcome.
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Add stderr to the outcome.
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Set the exit code.
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }
}

/// Makes a target match its source.
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    /// Run one sync. Failures are reported in the outcome, never retried.
    async fn sync(&self, request: &SyncRequest) -> SyncOutcome;
}

/// Runs rsync as a child process.
#[derive(Debug, Clone)]
pub struct RsyncExecutor {
    /// Executable to run.
    program: PathBuf,

    /// Flags placed before the configured arguments.
    base_args: Vec<String>,
}

impl RsyncExecutor {
    /// Create an executor for the default rsync path.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_RSYNC_PATH),
            base_args: DEFAULT_RSYNC_FLAGS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Use a different executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the leading flags.
    pub fn with_base_args(mut self, args: Vec<String>) -> Self {
        self.base_args = args;
        self
    }

    /// Arguments for a request:
    /// `<flags> <extra args> --exclude=<e>... <source> <target>`.
    pub fn args(&self, request: &SyncRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(
            self.base_args.len() + request.extra_args.len() + request.exclusions.len() + 2,
        );

        args.extend(self.base_args.iter().map(OsString::from));
        args.extend(request.extra_args.iter().map(OsString::from));
        args.extend(
            request
                .exclusions
                .iter()
                .map(|exclusion| OsString::from(format!("--exclude={exclusion}"))),
        );
        args.push(request.source.clone().into_os_string());
        args.push(OsString::from(&request.target));
        args
    }

    /// Shell-quoted command line for logging.
    pub fn command_line(&self, request: &SyncRequest) -> String {
        let program = self.program.to_string_lossy().into_owned();
        let words: Vec<String> = std::iter::once(program)
            .chain(
                self.args(request)
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned()),
            )
            .collect();

        shlex::try_join(words.iter().map(String::as_str)).unwrap_or_else(|_| words.join(" "))
    }
}

impl Default for RsyncExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncExecutor for RsyncExecutor {
    async fn sync(&self, request: &SyncRequest) -> SyncOutcome {
        let start = Instant::now();
        info!("{}", self.command_line(request));

        let output = Command::new(&self.program)
            .args(self.args(request))
            .stdin(Stdio::null())
            .output()
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                debug!(
                    "{} exited with {} in {duration_ms}ms",
                    self.program.display(),
                    output.status
                );

                if output.status.success() {
                    SyncOutcome::success(duration_ms)
                        .with_stdout(stdout)
                        .with_stderr(stderr)
                } else {
                    SyncOutcome::failure(format!("rsync failed: {}", output.status), duration_ms)
                        .with_exit_code(output.status.code())
                        .with_stdout(stdout)
                        .with_stderr(stderr)
                }
            }
            Err(e) => SyncOutcome::failure(
                format!("failed to run {}: {e}", self.program.display()),
                duration_ms,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request() -> SyncRequest {
        SyncRequest {
            source: PathBuf::from("/home/dev/project/"),
            target: "host:/srv/project".to_string(),
            exclusions: vec!["build/".to_string(), ".autorsync".to_string()],
            extra_args: vec!["-e".to_string(), "ssh -p 2222".to_string()],
        }
    }

    #[test]
    fn test_request_from_mapping() {
        let mapping = Mapping::new("/src", "host:/dst", vec!["tmp".to_string()]);
        let settings = Settings::new(std::time::Duration::from_secs(1))
            .with_extra_args(vec!["--delete".to_string()]);

        let request = SyncRequest::new(&mapping, &settings);

        assert_eq!(request.source, PathBuf::from("/src"));
        assert_eq!(request.target, "host:/dst");
        assert_eq!(request.exclusions, vec!["tmp".to_string()]);
        assert_eq!(request.extra_args, vec!["--delete".to_string()]);
    }

    #[test]
    fn test_rsync_args_order() {
        let executor = RsyncExecutor::new();

        let args: Vec<String> = executor
            .args(&request())
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "-avzh",
                "-e",
                "ssh -p 2222",
                "--exclude=build/",
                "--exclude=.autorsync",
                "/home/dev/project/",
                "host:/srv/project",
            ]
        );
    }

    #[test]
    fn test_command_line_is_quoted() {
        let executor = RsyncExecutor::new();
        let line = executor.command_line(&request());

        let words = shlex::split(&line).unwrap();
        assert_eq!(words.first().map(String::as_str), Some("/usr/bin/rsync"));
        assert_eq!(words.len(), 8);
        assert!(words.contains(&"ssh -p 2222".to_string()));
    }

    #[tokio::test]
    async fn test_successful_run_captures_stdout() {
        let executor = RsyncExecutor::new()
            .with_program("echo")
            .with_base_args(Vec::new());

        let outcome = executor.sync(&request()).await;

        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.stdout.contains("host:/srv/project"));
    }

    #[tokio::test]
    async fn test_failed_run_is_reported() {
        let executor = RsyncExecutor::new().with_program("false");

        let outcome = executor.sync(&request()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(1));
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let executor = RsyncExecutor::new().with_program("/nonexistent/rsync-12345");

        let outcome = executor.sync(&request()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.error.unwrap().contains("failed to run"));
    }
}
