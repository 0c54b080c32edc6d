//! Local process invoker
//!
//! Runs `<executable> <script> <image path>` and captures stdout and stderr
//! together. Both streams write into one anonymous file, so the combined
//! output keeps the order the process produced it in.

use crate::error::RelayError;
use crate::invoker::OcrInvoker;
use async_trait::async_trait;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Output of a finished subprocess
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// stdout and stderr, interleaved
    pub combined: String,
}

/// Spawn `executable args..`, wait at most `timeout`, return the merged output
///
/// The child is killed if the timeout elapses.
pub async fn run_merged(
    executable: &str,
    args: &[&Path],
    timeout: Duration,
) -> Result<ProcessOutput, RelayError> {
    let mut capture = tempfile::tempfile()
        .map_err(|e| RelayError::Internal(format!("Failed to create capture file: {}", e)))?;
    let stdout = clone_capture(&capture)?;
    let stderr = clone_capture(&capture)?;

    let mut child = Command::new(executable)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RelayError::Invocation {
            message: format!("Failed to start OCR process: {}", e),
            output: Some(format!("executable: {}", executable)),
        })?;

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status.map_err(|e| {
            RelayError::invocation(format!("Failed waiting for OCR process: {}", e))
        })?,
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill timed out process: {}", e);
            }
            return Err(RelayError::Invocation {
                message: format!("OCR process timed out after {}s", timeout.as_secs_f32()),
                output: read_capture(&mut capture).ok(),
            });
        }
    };

    let combined = read_capture(&mut capture)?;
    Ok(ProcessOutput { status, combined })
}

fn clone_capture(capture: &File) -> Result<File, RelayError> {
    capture
        .try_clone()
        .map_err(|e| RelayError::Internal(format!("Failed to share capture file: {}", e)))
}

fn read_capture(capture: &mut File) -> Result<String, RelayError> {
    let mut bytes = Vec::new();
    capture
        .seek(SeekFrom::Start(0))
        .and_then(|_| capture.read_to_end(&mut bytes))
        .map_err(|e| RelayError::Internal(format!("Failed to read process output: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Runs the OCR script as a subprocess
pub struct LocalProcessInvoker {
    executable: String,
    script_path: PathBuf,
    timeout: Duration,
}

impl LocalProcessInvoker {
    pub fn new(executable: impl Into<String>, script_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        let invoker = Self {
            executable: executable.into(),
            script_path: script_path.into(),
            timeout,
        };

        if !invoker.script_path.exists() {
            tracing::warn!(
                "OCR script {} does not exist yet; requests will fail until it does",
                invoker.script_path.display()
            );
        }

        invoker
    }
}

#[async_trait]
impl OcrInvoker for LocalProcessInvoker {
    fn name(&self) -> &'static str {
        "local"
    }

    fn description(&self) -> String {
        format!("{} {}", self.executable, self.script_path.display())
    }

    async fn invoke(&self, path: &Path, _filename: &str) -> Result<String, RelayError> {
        tracing::debug!(
            executable = %self.executable,
            script = %self.script_path.display(),
            "Running OCR process"
        );

        let output = run_merged(
            &self.executable,
            &[self.script_path.as_path(), path],
            self.timeout,
        )
        .await?;

        if !output.status.success() {
            return Err(RelayError::Invocation {
                message: format!("OCR process exited with {}", output.status),
                output: Some(output.combined),
            });
        }

        Ok(output.combined)
    }
}
