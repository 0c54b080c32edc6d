//! Best-effort face extraction
//!
//! Runs a second script on the staged upload to crop the portrait into an
//! output directory. Failures are logged and reported as `None`; they never
//! touch the OCR result.

use crate::config::FaceConfig;
use crate::invokers::local::run_merged;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

pub struct FaceExtractor {
    executable: String,
    script_path: PathBuf,
    output_dir: PathBuf,
    timeout: Duration,
}

impl FaceExtractor {
    pub fn new(config: &FaceConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            script_path: config.script_path.clone(),
            output_dir: config.output_dir.clone(),
            timeout: config.timeout,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Crop the face in `input`; returns where it was written, if anywhere
    pub async fn extract(&self, input: &Path) -> Option<PathBuf> {
        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            tracing::warn!(
                "Face extraction skipped, cannot create {}: {}",
                self.output_dir.display(),
                e
            );
            return None;
        }

        let output_path = self.output_dir.join(unique_face_name());
        let args = [self.script_path.as_path(), input, output_path.as_path()];

        let output = match run_merged(&self.executable, &args, self.timeout).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(executable = %self.executable, "Face extraction failed: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            tracing::warn!(
                output = %output.combined.trim(),
                "Face extraction exited with {}",
                output.status
            );
            return None;
        }

        if !output_path.exists() {
            tracing::info!(output = %output.combined.trim(), "No face extracted");
            return None;
        }

        tracing::info!("Extracted face to {}", output_path.display());
        Some(output_path)
    }
}

/// `extracted_face_<utc timestamp>_<random>.png`, unique without scanning the directory
fn unique_face_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "extracted_face_{}_{}.png",
        Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
        &id[..12]
    )
}
