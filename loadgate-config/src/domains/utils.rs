//! Utility functions and helpers for configuration

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Either whole seconds or a human readable span such as `"30s"` or `"2m"`
#[derive(Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Seconds(u64),
    Text(String),
}

impl DurationRepr {
    fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            DurationRepr::Seconds(secs) => Ok(Duration::from_secs(secs)),
            DurationRepr::Text(text) => humantime_serde::re::humantime::parse_duration(text.trim())
                .map_err(|e| E::custom(format!("invalid duration '{}': {}", text, e))),
        }
    }
}

/// Serde helper module for Duration, written as `"1m 30s"` and read from
/// either a humantime string or a plain number of seconds
pub mod serde_duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime_serde::serialize(duration, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        DurationRepr::deserialize(deserializer)?.into_duration()
    }
}

/// Serde helper module for optional Duration serialization
pub mod serde_duration_option {
    use super::*;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime_serde::serialize(duration, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<DurationRepr>::deserialize(deserializer)? {
            Some(repr) => repr.into_duration().map(Some),
            None => Ok(None),
        }
    }
}

/// Default functions for serde
pub fn default_true() -> bool {
    true
}

pub fn default_false() -> bool {
    false
}
