//! HTTP client trait and the reqwest-backed implementation

use crate::config::ClientSettings;
use crate::errors::HttpError;
use crate::response::{Headers, ResponseRecord, Timings};
use crate::types::HttpMethod;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A request as issued by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Only sent for methods that carry a body
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Overrides the client-wide timeout
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url).with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Anything the engine can send requests through
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(&self, request: HttpRequest) -> Result<ResponseRecord, HttpError>;

    /// Issue all requests concurrently; results keep the input order
    async fn batch(&self, requests: Vec<HttpRequest>) -> Vec<Result<ResponseRecord, HttpError>> {
        join_all(requests.into_iter().map(|request| self.request(request))).await
    }
}

/// Real network client
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
    settings: ClientSettings,
}

impl ReqwestClient {
    pub fn new(settings: ClientSettings) -> Result<Self, HttpError> {
        debug!(
            "Creating HTTP client with {}s timeout",
            settings.timeout.as_secs()
        );

        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(&settings.user_agent)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .redirect(reqwest::redirect::Policy::limited(
                settings.max_redirects as usize,
            ))
            .default_headers(header_map(
                settings
                    .default_headers
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            )?)
            .build()
            .map_err(|e| HttpError::ConfigError(e.to_string()))?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }
}

fn header_map<'a>(
    headers: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<HeaderMap, HttpError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name =
            HeaderName::from_str(name).map_err(|_| HttpError::InvalidHeader(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| HttpError::InvalidHeader(format!("{}: {}", name, value)))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(&self, request: HttpRequest) -> Result<ResponseRecord, HttpError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = self
            .client
            .request(reqwest::Method::from(request.method), url)
            .headers(header_map(
                request
                    .headers
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            )?);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if request.method.sends_body() {
            if let Some(body) = request.body {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body);
            }
        }

        trace!("Sending {} {}", request.method, request.url);
        let started = Instant::now();
        let response = builder.send().await?;
        let waiting = started.elapsed();

        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await?.to_vec();
        let duration = started.elapsed();

        debug!(
            "{} {} -> {} in {:?}",
            request.method, request.url, status, duration
        );

        Ok(ResponseRecord::new(
            status,
            headers,
            body,
            Timings::new(waiting, duration),
        ))
    }
}
