//! Running invocations against the external encoder.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use promoreel_common::config::ToolPaths;

use crate::invocation::Invocation;

/// Why a single encoder run did not succeed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageFailure {
    /// The process could not be started at all.
    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    /// The process ran and exited unsuccessfully.
    #[error("{program} exited with {status}: {diagnostic}")]
    Exited {
        program: String,
        status: String,
        diagnostic: String,
    },
}

impl StageFailure {
    /// Diagnostic text to surface to the caller.
    pub fn diagnostic(&self) -> &str {
        match self {
            Self::Spawn { message, .. } => message,
            Self::Exited { diagnostic, .. } => diagnostic,
        }
    }
}

/// Runs one invocation to completion.
///
/// Implementations must not return before the output file is fully written
/// and closed. No retries: an unsuccessful run is final.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<(), StageFailure>;

    /// Program name used when rendering command lines.
    fn program(&self) -> &Path;
}

/// Executor backed by an `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegExecutor {
    program: PathBuf,
}

impl FfmpegExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_tools(tools: &ToolPaths) -> Self {
        Self::new(&tools.ffmpeg)
    }

    /// Whether the configured binary can be found.
    pub fn is_available(&self) -> bool {
        command_exists(&self.program.to_string_lossy())
    }
}

impl Default for FfmpegExecutor {
    fn default() -> Self {
        Self::from_tools(&ToolPaths::default())
    }
}

#[async_trait]
impl StageExecutor for FfmpegExecutor {
    async fn run(&self, invocation: &Invocation) -> Result<(), StageFailure> {
        let program = self.program.to_string_lossy().into_owned();
        let args = invocation.to_args();
        tracing::debug!(program = %program, args = ?args, "Running encoder");

        let start = std::time::Instant::now();
        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StageFailure::Spawn {
                program: program.clone(),
                message: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            tracing::warn!(
                program = %program,
                status = %output.status,
                output = %invocation.output.display(),
                "Encoder run failed"
            );
            return Err(StageFailure::Exited {
                program,
                status: output.status.to_string(),
                diagnostic: stderr,
            });
        }

        if !stderr.is_empty() {
            tracing::debug!(stderr = %stderr, "Encoder diagnostics");
        }
        tracing::info!(
            output = %invocation.output.display(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Encoder run finished"
        );
        Ok(())
    }

    fn program(&self) -> &Path {
        &self.program
    }
}

/// Whether `binary` resolves to an executable through the shell.
pub fn command_exists(binary: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v '{}' >/dev/null 2>&1", binary.replace('\'', "'\\''")))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
