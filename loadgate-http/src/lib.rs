//! HTTP collaborator for loadgate
//!
//! The engine talks to the system under test through the [`HttpClient`]
//! trait only. Two implementations are provided: [`ReqwestClient`] for real
//! network traffic and [`MockBackend`], an in-process backend with a fixed
//! rule table used for deterministic runs.

pub mod client;
pub mod config;
pub mod errors;
pub mod mock;
pub mod response;
pub mod types;

// Re-export main types for convenience
pub use client::{HttpClient, HttpRequest, ReqwestClient};
pub use config::ClientSettings;
pub use errors::HttpError;
pub use mock::{MockBackend, MockRule};
pub use response::{Headers, ResponseRecord, Timings};
pub use types::{HttpMethod, HttpMethodError};
