//! Domain-driven configuration for loadgate runs
//!
//! A run is described declaratively: the ramp profile, the route table,
//! response checks and SLO thresholds, plus the ambient HTTP and logging
//! settings. Every domain validates itself so a malformed configuration is
//! rejected before any virtual user is spawned.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    checks::ChecksConfig,
    http::HttpConfig,
    load::{Executor, LoadConfig, StageConfig, ThinkTimeConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    routes::{DynamicSourceConfig, RouteConfig},
    LoadgateConfig, MockConfig, ScenarioKind, TargetKind,
};

// Re-export utilities
pub use domains::utils::serde_duration;
