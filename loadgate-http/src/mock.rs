//! In-process mock backend
//!
//! Answers from a fixed rule table so runs can be exercised without a live
//! dependency. Timings are synthesized; with `simulate_latency` the backend
//! also sleeps for the synthesized duration.

use crate::client::{HttpClient, HttpRequest};
use crate::errors::HttpError;
use crate::response::{Headers, ResponseRecord, Timings};
use crate::types::HttpMethod;
use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::trace;

const MAX_WAITING_MS: f64 = 100.0;
const MAX_DURATION_MS: f64 = 200.0;

/// URL substring mapped to a canned status and payload
#[derive(Debug, Clone, PartialEq)]
pub struct MockRule {
    pub pattern: String,
    pub status: u16,
    pub body: JsonValue,
}

impl MockRule {
    pub fn new(pattern: impl Into<String>, status: u16, body: JsonValue) -> Self {
        Self {
            pattern: pattern.into(),
            status,
            body,
        }
    }
}

/// Mock backend implementing [`HttpClient`]
#[derive(Debug, Clone)]
pub struct MockBackend {
    rules: Vec<MockRule>,
    simulate_latency: bool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Backend with the standard rules: `/status/404` and `/status/500`
    pub fn new() -> Self {
        Self {
            rules: vec![
                MockRule::new("/status/404", 404, json!({ "error": "Not Found" })),
                MockRule::new("/status/500", 500, json!({ "error": "Server Error" })),
            ],
            simulate_latency: false,
        }
    }

    pub fn with_simulated_latency(mut self, enabled: bool) -> Self {
        self.simulate_latency = enabled;
        self
    }

    /// Add a rule; earlier rules win when several patterns match
    pub fn with_rule(mut self, rule: MockRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[MockRule] {
        &self.rules
    }

    pub async fn get(&self, url: &str) -> ResponseRecord {
        let (status, body) = match self.rules.iter().find(|rule| url.contains(&rule.pattern)) {
            Some(rule) => (rule.status, rule.body.clone()),
            None => (200, json!({ "data": "Mock response" })),
        };
        trace!("mock GET {} -> {}", url, status);
        self.respond(status, &body).await
    }

    /// Echo a JSON body back; a missing or unparsable body is an error
    pub async fn post(&self, url: &str, body: Option<&str>) -> Result<ResponseRecord, HttpError> {
        let received: JsonValue =
            serde_json::from_str(body.unwrap_or_default()).map_err(HttpError::MalformedBody)?;
        trace!("mock POST {}", url);
        let payload = json!({
            "data": "Mock POST response",
            "receivedBody": received,
        });
        Ok(self.respond(200, &payload).await)
    }

    async fn respond(&self, status: u16, payload: &JsonValue) -> ResponseRecord {
        let timings = synthesize_timings();
        if self.simulate_latency {
            tokio::time::sleep(timings.duration).await;
        }

        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");

        ResponseRecord::new(status, headers, payload.to_string().into_bytes(), timings)
    }
}

fn synthesize_timings() -> Timings {
    let mut rng = rand::thread_rng();
    let waiting = rng.gen_range(0.0..MAX_WAITING_MS);
    let duration = rng.gen_range(0.0..MAX_DURATION_MS);
    Timings::new(
        Duration::from_secs_f64(waiting / 1000.0),
        Duration::from_secs_f64(duration / 1000.0),
    )
}

#[async_trait]
impl HttpClient for MockBackend {
    async fn request(&self, request: HttpRequest) -> Result<ResponseRecord, HttpError> {
        match request.method {
            HttpMethod::Post => self.post(&request.url, request.body.as_deref()).await,
            HttpMethod::Put | HttpMethod::Patch if request.body.is_some() => {
                self.post(&request.url, request.body.as_deref()).await
            }
            _ => Ok(self.get(&request.url).await),
        }
    }

    async fn batch(&self, requests: Vec<HttpRequest>) -> Vec<Result<ResponseRecord, HttpError>> {
        join_all(requests.into_iter().map(|request| self.request(request))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_rules() {
        let mock = MockBackend::new();

        let not_found = mock.get("http://localhost/status/404").await;
        assert_eq!(not_found.status, 404);
        let body: JsonValue = not_found.json().unwrap();
        assert_eq!(body["error"], "Not Found");

        let server_error = mock.get("http://localhost/status/500").await;
        assert_eq!(server_error.status, 500);

        let ok = mock.get("http://localhost/anything/else").await;
        assert_eq!(ok.status, 200);
        assert_eq!(ok.json::<JsonValue>().unwrap()["data"], "Mock response");
        assert_eq!(ok.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_repeated_calls_are_stable() {
        let mock = MockBackend::new();
        for _ in 0..20 {
            assert_eq!(mock.get("/status/404").await.status, 404);
            assert_eq!(mock.get("/status/500").await.status, 500);
        }
    }

    #[tokio::test]
    async fn test_post_echoes_body() {
        let mock = MockBackend::new();
        let response = mock
            .post("http://localhost/post", Some(r#"{"name":"test","job":"tester"}"#))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        let body: JsonValue = response.json().unwrap();
        assert_eq!(body["data"], "Mock POST response");
        assert_eq!(body["receivedBody"]["name"], "test");
        assert_eq!(body["receivedBody"]["job"], "tester");
    }

    #[tokio::test]
    async fn test_post_rejects_malformed_body() {
        let mock = MockBackend::new();
        let err = mock.post("/post", Some("{not json")).await.unwrap_err();
        assert!(matches!(err, HttpError::MalformedBody(_)));

        let err = mock.post("/post", None).await.unwrap_err();
        assert!(matches!(err, HttpError::MalformedBody(_)));
    }

    #[tokio::test]
    async fn test_timings_are_bounded() {
        let mock = MockBackend::new();
        for _ in 0..50 {
            let response = mock.get("/get").await;
            assert!(response.timings.waiting < Duration::from_millis(100));
            assert!(response.timings.duration < Duration::from_millis(200));
        }
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let mock = MockBackend::new();
        let results = mock
            .batch(vec![
                HttpRequest::get("/status/500"),
                HttpRequest::post("/post", r#"{"k":1}"#),
                HttpRequest::get("/status/404"),
                HttpRequest::post("/post", "oops"),
                HttpRequest::get("/get"),
            ])
            .await;

        assert_eq!(results.len(), 5);
        assert_eq!(results[0].as_ref().unwrap().status, 500);
        assert_eq!(results[1].as_ref().unwrap().status, 200);
        assert_eq!(results[2].as_ref().unwrap().status, 404);
        assert!(matches!(results[3], Err(HttpError::MalformedBody(_))));
        assert_eq!(results[4].as_ref().unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_other_methods_follow_get_rules() {
        let mock = MockBackend::new();
        let deleted = mock
            .request(HttpRequest::new(HttpMethod::Delete, "/status/404"))
            .await
            .unwrap();
        assert_eq!(deleted.status, 404);

        let put = mock
            .request(HttpRequest::new(HttpMethod::Put, "/items/1").with_body(r#"{"v":2}"#))
            .await
            .unwrap();
        assert_eq!(put.json::<JsonValue>().unwrap()["receivedBody"]["v"], 2);
    }

    #[tokio::test]
    async fn test_custom_rule() {
        let mock = MockBackend::new().with_rule(MockRule::new("/teapot", 418, json!({})));
        assert_eq!(mock.get("/teapot").await.status, 418);
        assert_eq!(mock.rules().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_latency_sleeps() {
        let mock = MockBackend::new().with_simulated_latency(true);
        let started = tokio::time::Instant::now();
        let response = mock.get("/get").await;
        assert!(started.elapsed() >= response.timings.duration);
    }
}
