//! Compiler invocation against a snapshot of a document.
//!
//! Each run writes the buffer to a uniquely named temp file, runs
//! `<compiler> -c <file>` and hands back the captured stderr. The temp file
//! is owned by a guard that deletes it on every exit path, including when
//! the run's task is aborted.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use perl6_ls_types::CompilerSettings;
use tempfile::NamedTempFile;
use tokio::process::Command;

/// Rakudo colours error output unless this is `0`.
pub const COLOR_ENV: &str = "RAKUDO_ERROR_COLOR";

/// `-c` also runs `BEGIN` blocks, which can loop forever.
const CHECK_TIMEOUT_SECS: u64 = 30;

const SNAPSHOT_PREFIX: &str = "perl6-ls-";
const SNAPSHOT_SUFFIX: &str = ".p6";

/// Result of a completed compiler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Exit status zero: the document compiles.
    Clean,
    /// Non-zero exit with whatever the compiler printed on stderr.
    Failed { status: String, stderr: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("compiler '{command}' not found; set perl6.path to the Rakudo executable")]
    CompilerNotFound { command: String },
    #[error("failed to run compiler '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("compiler '{command}' did not finish within {CHECK_TIMEOUT_SECS}s")]
    TimedOut { command: String },
    #[error("failed to write document snapshot: {0}")]
    TempFile(std::io::Error),
}

impl RunError {
    /// Whether the compiler itself is unusable (as opposed to a per-run
    /// failure such as a full temp directory).
    #[must_use]
    pub fn is_invocation_error(&self) -> bool {
        matches!(self, Self::CompilerNotFound { .. } | Self::Spawn { .. })
    }
}

pub type CheckFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CheckOutcome, RunError>> + Send + 'a>>;

/// Runs the compiler in syntax-check mode.
pub trait CompilerRunner: Send + Sync {
    fn check<'a>(&'a self, text: &'a str, settings: &'a CompilerSettings) -> CheckFuture<'a>;
}

/// [`CompilerRunner`] that spawns the configured compiler process.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    temp_dir: Option<PathBuf>,
}

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write snapshots into `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_temp_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: Some(dir.into()),
        }
    }

    fn write_snapshot(&self, text: &str) -> Result<NamedTempFile, RunError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SNAPSHOT_PREFIX).suffix(SNAPSHOT_SUFFIX);
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(RunError::TempFile)?;

        file.write_all(text.as_bytes()).map_err(RunError::TempFile)?;
        file.flush().map_err(RunError::TempFile)?;
        Ok(file)
    }

    async fn run(&self, text: &str, settings: &CompilerSettings) -> Result<CheckOutcome, RunError> {
        // Dropping `snapshot` removes the file, whichever way this returns.
        let snapshot = self.write_snapshot(text)?;
        let compiler = resolve_compiler(settings.compiler())?;

        let mut cmd = compile_check_command(&compiler, settings, snapshot.path());
        tracing::debug!(
            compiler = %compiler.display(),
            file = %snapshot.path().display(),
            "Running compile check"
        );

        let output = tokio::time::timeout(Duration::from_secs(CHECK_TIMEOUT_SECS), cmd.output())
            .await
            .map_err(|_| RunError::TimedOut {
                command: settings.compiler().to_string(),
            })?
            .map_err(|source| RunError::Spawn {
                command: settings.compiler().to_string(),
                source,
            })?;

        Ok(outcome(output.status, &output.stderr))
    }
}

impl CompilerRunner for ProcessRunner {
    fn check<'a>(&'a self, text: &'a str, settings: &'a CompilerSettings) -> CheckFuture<'a> {
        Box::pin(self.run(text, settings))
    }
}

/// Resolve a bare command via `PATH`, or check an explicit path.
fn resolve_compiler(command: &str) -> Result<PathBuf, RunError> {
    which::which(command).map_err(|e| {
        tracing::debug!(command, "Compiler lookup failed: {e}");
        RunError::CompilerNotFound {
            command: command.to_string(),
        }
    })
}

fn compile_check_command(compiler: &Path, settings: &CompilerSettings, file: &Path) -> Command {
    let mut cmd = Command::new(compiler);
    for lib in settings.libs() {
        cmd.arg("-I").arg(lib);
    }
    cmd.arg("-c")
        .arg(file)
        .env(COLOR_ENV, "0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

fn outcome(status: ExitStatus, stderr: &[u8]) -> CheckOutcome {
    if status.success() {
        CheckOutcome::Clean
    } else {
        CheckOutcome::Failed {
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }
}
