//! Load profile configuration: executor, stages and grace periods

use crate::error::ConfigResult;
use crate::validation::{validate_positive_duration, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How virtual users are scheduled over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Executor {
    /// Follow `stages`, interpolating the VU count between stage targets
    #[default]
    RampingVus,
    /// Hold `vus` virtual users for `duration`
    ConstantVus,
}

/// One segment of a ramp profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// How long the stage lasts
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub duration: Duration,

    /// VU count reached at the end of the stage
    pub target: u64,
}

impl StageConfig {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Pause between two iterations of the same VU, drawn uniformly from `[min, max]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkTimeConfig {
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub min: Duration,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub max: Duration,
}

impl Default for ThinkTimeConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(3),
        }
    }
}

/// Load profile configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    #[serde(default)]
    pub executor: Executor,

    /// VUs alive when the first stage starts
    #[serde(default)]
    pub start_vus: u64,

    /// Ordered stages for the ramping executor
    #[serde(default)]
    pub stages: Vec<StageConfig>,

    /// Population for the constant executor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vus: Option<u64>,

    /// Run length for the constant executor
    #[serde(
        default,
        with = "crate::domains::utils::serde_duration_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,

    /// Grace given to VUs retired while ramping down
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_grace"
    )]
    pub graceful_ramp_down: Duration,

    /// Grace given to VUs still running once the last stage ends
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_grace"
    )]
    pub graceful_stop: Duration,

    /// How often the scheduler re-evaluates the target VU count
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_tick_interval"
    )]
    pub tick_interval: Duration,

    #[serde(default)]
    pub think_time: ThinkTimeConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            executor: Executor::RampingVus,
            start_vus: 0,
            stages: vec![
                StageConfig::new(Duration::from_secs(30), 20),
                StageConfig::new(Duration::from_secs(60), 20),
                StageConfig::new(Duration::from_secs(30), 0),
            ],
            vus: None,
            duration: None,
            graceful_ramp_down: default_grace(),
            graceful_stop: default_grace(),
            tick_interval: default_tick_interval(),
            think_time: ThinkTimeConfig::default(),
        }
    }
}

impl LoadConfig {
    /// A constant-population profile
    pub fn constant(vus: u64, duration: Duration) -> Self {
        Self {
            executor: Executor::ConstantVus,
            stages: Vec::new(),
            vus: Some(vus),
            duration: Some(duration),
            ..Default::default()
        }
    }

    /// A ramping profile over the given stages
    pub fn ramping(stages: Vec<StageConfig>) -> Self {
        Self {
            executor: Executor::RampingVus,
            stages,
            ..Default::default()
        }
    }

    /// Stages the scheduler actually runs, with the constant executor expanded
    /// into a single hold stage
    pub fn effective_stages(&self) -> Vec<StageConfig> {
        match self.executor {
            Executor::RampingVus => self.stages.clone(),
            Executor::ConstantVus => match (self.vus, self.duration) {
                (Some(vus), Some(duration)) => vec![StageConfig::new(duration, vus)],
                _ => Vec::new(),
            },
        }
    }

    /// VU count at the start of the first stage
    pub fn effective_start_vus(&self) -> u64 {
        match self.executor {
            Executor::RampingVus => self.start_vus,
            Executor::ConstantVus => self.vus.unwrap_or_default(),
        }
    }

    /// Sum of all stage durations
    pub fn total_duration(&self) -> Duration {
        self.effective_stages().iter().map(|s| s.duration).sum()
    }
}

impl Validatable for LoadConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.executor {
            Executor::RampingVus => {
                if self.stages.is_empty() {
                    return Err(self.validation_error("ramping-vus requires at least one stage"));
                }
                for (index, stage) in self.stages.iter().enumerate() {
                    if stage.duration.is_zero() {
                        return Err(self.validation_error(format!(
                            "stages[{}].duration must be a positive duration",
                            index
                        )));
                    }
                }
            }
            Executor::ConstantVus => {
                if self.vus.is_none() {
                    return Err(self.validation_error("constant-vus requires vus"));
                }
                match self.duration {
                    Some(duration) => validate_positive_duration(duration, "duration", self.domain_name())?,
                    None => return Err(self.validation_error("constant-vus requires duration")),
                }
            }
        }

        validate_positive_duration(self.tick_interval, "tick_interval", self.domain_name())?;

        if self.think_time.min > self.think_time.max {
            return Err(self.validation_error(format!(
                "think_time.min ({:?}) must not exceed think_time.max ({:?})",
                self.think_time.min, self.think_time.max
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "load"
    }
}

fn default_grace() -> Duration {
    Duration::from_secs(30)
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(100)
}
