//! Logging infrastructure for loadgate
//!
//! This crate provides:
//! - `tracing` subscriber initialisation driven by [`LoggingConfig`]
//! - the diagnostics collaborator that receives free-text records about
//!   failed checks and dispatch errors during a run

pub mod diagnostics;
pub mod init;

// Re-export main types for convenience
pub use diagnostics::{DiagnosticKind, DiagnosticRecord, Diagnostics, MemoryDiagnostics, TracingDiagnostics};
pub use init::{init_logging_from_config, init_simple_tracing};
pub use loadgate_config::LoggingConfig;
