//! Upload relay between an HTTP client and an external OCR engine
//!
//! An uploaded image is staged as a temporary file, handed to the OCR engine
//! (a local script or a remote service), and the engine's JSON is returned.

pub mod config;
pub mod decoder;
pub mod error;
pub mod face;
pub mod invoker;
pub mod invokers;
pub mod relay;
pub mod server;
pub mod storage;
