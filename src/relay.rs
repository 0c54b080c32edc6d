//! Request orchestration: stage, invoke, decode, clean up

use crate::config::Config;
use crate::decoder::{self, OcrResult};
use crate::error::RelayError;
use crate::face::FaceExtractor;
use crate::invoker::OcrInvoker;
use crate::invokers::build_invoker;
use crate::storage::{StoreStats, TempFileStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

pub struct RelayService {
    store: TempFileStore,
    invoker: Arc<dyn OcrInvoker>,
    face: Option<FaceExtractor>,
}

impl RelayService {
    pub fn new(
        store: TempFileStore,
        invoker: Arc<dyn OcrInvoker>,
        face: Option<FaceExtractor>,
    ) -> Self {
        Self {
            store,
            invoker,
            face,
        }
    }

    /// Wire up the store, invoker and optional face extractor from configuration
    pub fn from_config(config: &Config) -> Result<Self, RelayError> {
        let invoker = build_invoker(config)?;
        let face = config.face.as_ref().map(|face| {
            tracing::info!(
                "Face extraction enabled ({}), writing to {}",
                face.script_path.display(),
                face.output_dir.display()
            );
            FaceExtractor::new(face)
        });

        Ok(Self::new(
            TempFileStore::new(config.temp_dir.clone()),
            invoker,
            face,
        ))
    }

    pub fn invoker(&self) -> &dyn OcrInvoker {
        self.invoker.as_ref()
    }

    pub fn face_extraction_enabled(&self) -> bool {
        self.face.is_some()
    }

    pub fn store_stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Run one upload through the OCR engine
    ///
    /// Only a failure to stage the upload is returned as `Err`. Invocation and
    /// decode failures come back as an `{"error": ...}` result. The staged file
    /// is deleted before returning, and by its drop guard on panic.
    pub async fn process_image(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<OcrResult, RelayError> {
        let span = tracing::info_span!("process_image", filename = %filename, bytes = bytes.len());
        self.process_image_inner(bytes, filename).instrument(span).await
    }

    async fn process_image_inner(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<OcrResult, RelayError> {
        let start = Instant::now();

        let handle = self.store.save(bytes, filename)?;
        tracing::debug!("File saved");

        let result = match self.invoker.invoke(handle.path(), filename).await {
            Ok(raw) => {
                tracing::debug!(output_len = raw.len(), "Invocation succeeded");
                decoder::decode(&raw)
            }
            Err(e) => {
                match &e {
                    RelayError::Invocation {
                        output: Some(output),
                        ..
                    } => tracing::warn!(output = %output.trim(), "Invocation failed: {}", e),
                    _ => tracing::warn!("Invocation failed: {}", e),
                }
                OcrResult::from(e)
            }
        };

        if let Some(face) = self.face.as_ref().filter(|_| !result.is_error()) {
            face.extract(handle.path()).await;
        }

        self.store.release(handle);
        tracing::debug!("Cleaned up");

        tracing::info!(
            "OCR relay finished in {}ms (error: {})",
            start.elapsed().as_millis(),
            result.is_error()
        );

        Ok(result)
    }
}
