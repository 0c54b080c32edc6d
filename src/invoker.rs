use crate::error::RelayError;
use async_trait::async_trait;
use std::path::Path;

/// Trait that every way of reaching the OCR engine implements
#[async_trait]
pub trait OcrInvoker: Send + Sync {
    /// Returns the invoker identifier (e.g., "local", "remote")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of where requests go
    fn description(&self) -> String;

    /// Run OCR on the staged file and return the engine's raw output
    ///
    /// `filename` is the name the client uploaded the image under.
    async fn invoke(&self, path: &Path, filename: &str) -> Result<String, RelayError>;
}
