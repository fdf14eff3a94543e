//! Request dispatcher
//!
//! Turns a route into a concrete request, sends it through the HTTP
//! collaborator and records the transport-level metrics.

use crate::metrics::{names, MetricsRecorder, Tags};
use crate::routes::{Route, RouteError, RouteTable};
use futures::future::join_all;
use loadgate_http::{HttpClient, HttpError, HttpRequest, ResponseRecord};
use loadgate_logging::{DiagnosticRecord, Diagnostics};
use rand::RngCore;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// A single request that could not be completed
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("route '{route}' request failed: {source}")]
    Http {
        route: String,
        #[source]
        source: HttpError,
    },

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl DispatchError {
    /// Route the failed request belonged to, when known
    pub fn route(&self) -> Option<&str> {
        match self {
            DispatchError::Http { route, .. } => Some(route),
            DispatchError::Route(RouteError::Unknown(name)) => Some(name),
            DispatchError::Route(RouteError::MalformedTemplate { route, .. }) => Some(route),
            DispatchError::Route(_) => None,
        }
    }
}

/// One entry of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub route: String,
    pub body: Option<JsonValue>,
}

impl BatchRequest {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }
}

pub struct Dispatcher {
    routes: Arc<RouteTable>,
    client: Arc<dyn HttpClient>,
    diagnostics: Arc<dyn Diagnostics>,
    base_url: Option<String>,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        client: Arc<dyn HttpClient>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            routes,
            client,
            diagnostics,
            base_url: None,
        }
    }

    /// Base joined with relative route templates
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Build the concrete request for one invocation of `route`
    ///
    /// A caller-supplied body replaces the route's configured body. Bodies
    /// are only attached for methods that carry one.
    pub fn prepare(
        &self,
        route: &Route,
        body: Option<&JsonValue>,
        rng: &mut dyn RngCore,
    ) -> Result<HttpRequest, DispatchError> {
        let path = route.render(rng)?;
        let mut request = HttpRequest::new(route.method, self.join(&path));
        if route.method.sends_body() {
            if let Some(body) = body.or(route.body.as_ref()) {
                request = request.with_body(body.to_string());
            }
        }
        Ok(request)
    }

    fn join(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_string(),
        }
    }

    pub async fn dispatch<R: RngCore + Send>(
        &self,
        route: &Route,
        body: Option<&JsonValue>,
        rng: &mut R,
        recorder: &dyn MetricsRecorder,
    ) -> Result<ResponseRecord, DispatchError> {
        let request = match self.prepare(route, body, &mut *rng) {
            Ok(request) => request,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };
        self.send(route, request, recorder).await
    }

    /// Resolve `name` in the route table, then dispatch it
    pub async fn dispatch_named<R: RngCore + Send>(
        &self,
        name: &str,
        body: Option<&JsonValue>,
        rng: &mut R,
        recorder: &dyn MetricsRecorder,
    ) -> Result<ResponseRecord, DispatchError> {
        let route = match self.routes.resolve(name) {
            Ok(route) => route,
            Err(e) => {
                let e = DispatchError::from(e);
                self.report(&e);
                return Err(e);
            }
        };
        self.dispatch(route, body, rng, recorder).await
    }

    /// Issue every request concurrently; results keep submission order
    pub async fn batch<R: RngCore + Send>(
        &self,
        requests: &[BatchRequest],
        rng: &mut R,
        recorder: &dyn MetricsRecorder,
    ) -> Vec<Result<ResponseRecord, DispatchError>> {
        let prepared: Vec<_> = requests
            .iter()
            .map(|item| -> Result<_, DispatchError> {
                let route = self.routes.resolve(&item.route)?;
                let request = self.prepare(route, item.body.as_ref(), &mut *rng)?;
                Ok((route, request))
            })
            .collect();

        join_all(prepared.into_iter().map(|prepared| async move {
            match prepared {
                Ok((route, request)) => self.send(route, request, recorder).await,
                Err(e) => {
                    self.report(&e);
                    Err(e)
                }
            }
        }))
        .await
    }

    async fn send(
        &self,
        route: &Route,
        request: HttpRequest,
        recorder: &dyn MetricsRecorder,
    ) -> Result<ResponseRecord, DispatchError> {
        let mut tags: Tags = route.tags.clone();
        tags.insert(names::tag::ROUTE.to_string(), route.name.clone());
        tags.insert(names::tag::METHOD.to_string(), route.method.to_string());

        trace!("Dispatching {} {}", request.method, request.url);
        match self.client.request(request).await {
            Ok(response) => {
                tags.insert(names::tag::STATUS.to_string(), response.status.to_string());
                let failed = response.status >= 400 && response.status != route.expected_status;

                recorder.add(names::HTTP_REQS, &tags, 1);
                recorder.trend_duration(names::HTTP_REQ_DURATION, &tags, response.timings.duration);
                recorder.trend_duration(names::HTTP_REQ_WAITING, &tags, response.timings.waiting);
                recorder.rate(names::HTTP_REQ_FAILED, &tags, failed);
                Ok(response)
            }
            Err(source) => {
                tags.insert(names::tag::STATUS.to_string(), "0".to_string());
                recorder.add(names::HTTP_REQS, &tags, 1);
                recorder.rate(names::HTTP_REQ_FAILED, &tags, true);

                let e = DispatchError::Http {
                    route: route.name.clone(),
                    source,
                };
                self.report(&e);
                Err(e)
            }
        }
    }

    fn report(&self, error: &DispatchError) {
        self.diagnostics.record(DiagnosticRecord::dispatch_failed(
            error.route().unwrap_or("<unknown>"),
            error,
        ));
    }
}
