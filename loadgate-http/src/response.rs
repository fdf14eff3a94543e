//! Response records returned by every [`crate::HttpClient`]

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

/// Timing observations for a single request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    /// Time until the first response byte
    pub waiting: Duration,
    /// Total time including body transfer
    pub duration: Duration,
}

impl Timings {
    pub fn new(waiting: Duration, duration: Duration) -> Self {
        Self { waiting, duration }
    }
}

/// Response headers with case-insensitive lookup
///
/// Names are stored lowercased; the spelling of the first insertion is kept
/// for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, (String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        self.entries
            .entry(name.to_ascii_lowercase())
            .and_modify(|entry| entry.1 = value.clone())
            .or_insert((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate as (original name, value)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// What the engine sees of a completed request
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub timings: Timings,
}

impl ResponseRecord {
    pub fn new(status: u16, headers: Headers, body: Vec<u8>, timings: Timings) -> Self {
        Self {
            status,
            headers,
            body,
            timings,
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Body as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;

    #[test]
    fn test_header_lookup_ignores_case() {
        let headers: Headers = [("Content-Type", "application/json")].into_iter().collect();
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert!(headers.contains("Content-type"));
        assert!(!headers.contains("X-Request-Id"));
        assert_eq!(headers.iter().next(), Some(("Content-Type", "application/json")));
    }

    #[test]
    fn test_header_insert_replaces_value() {
        let mut headers = Headers::new();
        headers.insert("X-Trace", "a");
        headers.insert("x-trace", "b");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-TRACE"), Some("b"));
    }

    #[test]
    fn test_response_body_accessors() {
        let record = ResponseRecord::new(
            201,
            Headers::new(),
            br#"{"data":"ok"}"#.to_vec(),
            Timings::new(Duration::from_millis(3), Duration::from_millis(9)),
        );
        assert!(record.is_success());
        assert_eq!(record.text(), r#"{"data":"ok"}"#);
        let body: JsonValue = record.json().unwrap();
        assert_eq!(body["data"], "ok");
        assert!(record.timings.waiting <= record.timings.duration);
    }
}
