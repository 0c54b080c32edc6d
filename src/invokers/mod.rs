//! OCR invoker implementations
//!
//! Exactly one invoker is built per process, selected by configuration.

pub mod local;
pub mod remote;

use crate::config::{Config, InvokerConfig};
use crate::error::RelayError;
use crate::invoker::OcrInvoker;
use std::sync::Arc;

pub use local::LocalProcessInvoker;
pub use remote::RemoteHttpInvoker;

/// Build the invoker the configuration asks for
pub fn build_invoker(config: &Config) -> Result<Arc<dyn OcrInvoker>, RelayError> {
    let invoker: Arc<dyn OcrInvoker> = match &config.invoker {
        InvokerConfig::LocalProcess {
            executable,
            script_path,
        } => Arc::new(LocalProcessInvoker::new(
            executable.clone(),
            script_path.clone(),
            config.timeout,
        )),
        InvokerConfig::RemoteHttp { base_url } => {
            Arc::new(RemoteHttpInvoker::new(base_url, config.timeout)?)
        }
    };

    tracing::info!(
        "Using {} invoker ({}), timeout {}s",
        invoker.name(),
        invoker.description(),
        config.timeout.as_secs()
    );

    Ok(invoker)
}
