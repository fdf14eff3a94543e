//! Configuration loading and environment variable handling

use crate::domains::LoadgateConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "LOADGATE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<LoadgateConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.from_yaml(&content)
    }

    /// Load configuration from YAML text with environment overrides
    pub fn from_yaml(&self, content: &str) -> ConfigResult<LoadgateConfig> {
        let mut config: LoadgateConfig = serde_yaml::from_str(content)?;

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config)?;

        // Validate all domains
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<LoadgateConfig> {
        let mut config = LoadgateConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<LoadgateConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut LoadgateConfig) -> ConfigResult<()> {
        self.apply_http_overrides(&mut config.http)?;
        self.apply_logging_overrides(&mut config.logging)?;

        if let Ok(target) = self.get_env_var("TARGET") {
            config.target = crate::domains::TargetKind::from_str(&target)
                .map_err(|e| self.override_error("TARGET", &target, e))?;
            log::debug!("target overridden from environment: {}", config.target);
        }

        Ok(())
    }

    /// Apply HTTP config overrides
    fn apply_http_overrides(&self, config: &mut crate::domains::http::HttpConfig) -> ConfigResult<()> {
        if let Ok(base_url) = self.get_env_var("HTTP_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(timeout) = self.get_env_var("HTTP_TIMEOUT") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| self.override_error("HTTP_TIMEOUT", &timeout, e))?;
            config.timeout = std::time::Duration::from_secs(seconds);
        }

        if let Ok(verify_ssl) = self.get_env_var("HTTP_VERIFY_SSL") {
            config.verify_ssl = verify_ssl
                .parse()
                .map_err(|e| self.override_error("HTTP_VERIFY_SSL", &verify_ssl, e))?;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|e| self.override_error("LOG_LEVEL", &log_level, e))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|e| self.override_error("LOG_FORMAT", &format, e))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(self.var_name(name))
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    fn override_error(&self, name: &str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
        ConfigError::Override {
            var: self.var_name(name),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
