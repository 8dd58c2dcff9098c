//! Drives one request through the lifecycle.
//!
//! # Responsibilities
//! - Build `RequestState` and assign the request ID
//! - Run hook stages in order, reading the body between preParsing and preValidation
//! - Turn any failure into a JSON error reply without calling the handler
//! - Record per-request metrics and run onResponse
//!
//! # Design Decisions
//! - Hooks and body ingestion never call each other; only the dispatcher sequences them
//! - Hook and parser registration needs `&mut self`, so setup finishes before serving
//! - onResponse runs after the reply is built and its failures never change the reply

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, MethodRouter};
use futures_util::future::BoxFuture;
use tracing::Instrument;

use crate::body::{BodyIngestor, IncomingBody};
use crate::config::schema::CoreConfig;
use crate::dispatch::stages::{LifecycleHooks, Stage};
use crate::dispatch::state::{RequestState, REQUEST_ID_HEADER};
use crate::error::Error;
use crate::hooks::{HookChain, HookError, Interrupted};
use crate::observability::metrics::Metrics;

type BoxHandler =
    Arc<dyn for<'a> Fn(&'a mut RequestState) -> BoxFuture<'a, Result<Bytes, HookError>> + Send + Sync>;

/// A route handler plus its per-route options.
#[derive(Clone)]
pub struct Route {
    handler: BoxHandler,
    body_limit: Option<usize>,
}

impl Route {
    /// The handler receives the state after preHandler and returns the reply
    /// payload; status and headers go on `state.reply`.
    pub fn new<F>(handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestState) -> BoxFuture<'a, Result<Bytes, HookError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Arc::new(handler),
            body_limit: None,
        }
    }

    /// Override every parser's limit for this route.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    pub fn body_limit(&self) -> Option<usize> {
        self.body_limit
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

/// Owns the lifecycle hooks and the body ingestor for one server context.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    hooks: LifecycleHooks,
    ingestor: BodyIngestor,
    metrics: Metrics,
}

impl Dispatcher {
    /// The dispatcher follows the ingestor's metrics switch.
    pub fn new(ingestor: BodyIngestor) -> Self {
        Self {
            hooks: LifecycleHooks::new(),
            metrics: ingestor.metrics(),
            ingestor,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        let metrics = Metrics::from_config(&config.observability);
        Self::new(BodyIngestor::new(&config.body).with_metrics(metrics))
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut LifecycleHooks {
        &mut self.hooks
    }

    pub fn ingestor(&self) -> &BodyIngestor {
        &self.ingestor
    }

    pub fn ingestor_mut(&mut self) -> &mut BodyIngestor {
        &mut self.ingestor
    }

    /// Mount `route` behind this dispatcher as an axum method router.
    pub fn endpoint(self: &Arc<Self>, route: Route) -> MethodRouter {
        let dispatcher = Arc::clone(self);
        let route = Arc::new(route);
        any(move |request: Request<Body>| {
            let dispatcher = Arc::clone(&dispatcher);
            let route = Arc::clone(&route);
            async move { dispatcher.dispatch(&route, request).await }
        })
    }

    /// Run the full lifecycle for one request.
    pub async fn dispatch(&self, route: &Route, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let mut state = RequestState::from_parts(parts);
        let span = tracing::info_span!(
            "request",
            id = %state.id,
            method = %state.method,
            uri = %state.uri,
        );

        async move {
            let mut response = match self.respond(route, &mut state, body).await {
                Ok(response) => response,
                Err(error) => {
                    tracing::debug!(
                        status = error.status().as_u16(),
                        code = error.code(),
                        error = %error,
                        "Request failed"
                    );
                    error.into_response()
                }
            };

            if let Ok(id) = HeaderValue::from_str(&state.id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, id);
            }

            let status = response.status();
            self.metrics.record_request(status.as_u16());
            tracing::debug!(status = status.as_u16(), "Request completed");

            if let Err(error) = self.hooks.on_response.run(&mut state).await {
                self.metrics.record_hook_failure(Stage::OnResponse.as_str());
                tracing::warn!(error = %error, "onResponse hook failed");
            }

            response
        }
        .instrument(span)
        .await
    }

    async fn respond(
        &self,
        route: &Route,
        state: &mut RequestState,
        body: Body,
    ) -> Result<Response, Error> {
        self.run_stage(Stage::OnRequest, &self.hooks.on_request, state).await?;
        self.run_stage(Stage::PreParsing, &self.hooks.pre_parsing, state).await?;

        if state.expects_body() {
            let incoming = IncomingBody::from_parts(&state.headers, body);
            state.body = Some(self.ingestor.ingest(incoming, route.body_limit).await?);
        }

        self.run_stage(Stage::PreValidation, &self.hooks.pre_validation, state).await?;
        self.run_stage(Stage::PreHandler, &self.hooks.pre_handler, state).await?;

        let payload = (route.handler)(state).await.map_err(|error| {
            self.metrics.record_hook_failure(Stage::Handler.as_str());
            Error::Handler(error)
        })?;

        let payload = match self.hooks.on_send.run(state, payload).await {
            Ok(payload) => payload,
            Err(Interrupted { error, payload }) => {
                self.metrics.record_hook_failure(Stage::OnSend.as_str());
                tracing::debug!(
                    stage = %Stage::OnSend,
                    error = %error,
                    discarded_bytes = payload.len(),
                    "Hook chain stopped"
                );
                return Err(Error::Hook(error));
            }
        };

        let mut response = Response::new(Body::from(payload));
        *response.status_mut() = state.reply.status;
        response.headers_mut().extend(
            state
                .reply
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        Ok(response)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        chain: &HookChain<RequestState>,
        state: &mut RequestState,
    ) -> Result<(), Error> {
        chain.run(state).await.map_err(|error| {
            self.metrics.record_hook_failure(stage.as_str());
            tracing::debug!(stage = %stage, error = %error, "Hook chain stopped");
            Error::Hook(error)
        })
    }
}
