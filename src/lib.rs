//! # Tapline
//!
//! A Tower middleware that sits in front of an HTTP client and writes a
//! readable log block for every exchange that goes through it, without
//! changing what the client sends or what the caller receives.
//!
//! ## Features
//!
//! - **Transparent**: requests, responses and transport errors pass through
//!   unchanged; bodies that are read for logging are replayed frame for frame
//! - **Filterable**: ignore and allow lists of URL patterns, ignore first
//! - **Bounded**: long bodies are collapsed to head and tail, binary bodies
//!   are rendered as base64
//! - **Live configuration**: options can change while traffic flows and
//!   apply from the next call on
//!
//! ## Quick Start
//!
//! ```rust
//! use tapline::{AssumeLive, HttpLogLayer, LoggerConfig, TracingSink};
//! use axum::body::Body;
//! use axum::http::{Request, Response};
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//!
//! # #[tokio::main]
//! # async fn main() {
//! // Any client service speaking `Request<Body>` -> `Response<Body>` works here
//! let transport = service_fn(|_req: Request<Body>| async {
//!     Ok::<_, std::convert::Infallible>(Response::new(Body::from("pong")))
//! });
//!
//! let config = LoggerConfig::default()
//!     .log_request_headers(true)
//!     .ignore("/health")
//!     .unwrap()
//!     .sink(TracingSink);
//!
//! let client = ServiceBuilder::new()
//!     .layer(HttpLogLayer::new(config).with_connection_check(AssumeLive))
//!     .service(transport);
//!
//! let response = client
//!     .oneshot(Request::get("http://localhost/ping").body(Body::empty()).unwrap())
//!     .await
//!     .unwrap();
//! assert!(response.status().is_success());
//! # }
//! ```
//!
//! ## Changing options at runtime
//!
//! Keep a [`SharedConfig`] and hand a clone to the layer:
//!
//! ```rust
//! use tapline::{HttpLogLayer, LoggerConfig, SharedConfig, TracingSink};
//!
//! let shared = SharedConfig::new(LoggerConfig::default().sink(TracingSink));
//! let layer = HttpLogLayer::new(shared.clone());
//!
//! shared.update(|config| config.log_response_headers = true);
//! shared.detach_sink(); // every following call passes straight through
//! ```

use axum::body::Body;
use axum::http::{Request, Response};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::{debug, instrument};

pub use axum::http;

pub mod body_wrapper;
use body_wrapper::{capture_body, Capture};

pub mod config;
pub use config::{LoggerConfig, SharedConfig};

pub mod connection;
pub use connection::{AssumeLive, ConnectionCheck, Outcome, TransportReported};

pub mod error;
pub use error::ConfigError;

pub mod filter;
pub use filter::{Pattern, PatternSet};

pub mod format;
pub mod payload;

pub mod recorder;
pub use recorder::Recorder;
use recorder::logs_request_body;

pub mod sink;
pub use sink::{FanoutSink, Sink, TracingSink};

pub mod types;
use types::{BodyEncoding, ClientContext, Exchange, Payload, ResponseBody, ResponseSummary};

/// Tower layer that logs every exchange made through the wrapped client.
///
/// Services produced by one layer share its configuration and its
/// [`Recorder`], so their log blocks never interleave.
#[derive(Clone)]
pub struct HttpLogLayer {
    config: SharedConfig,
    recorder: Arc<Recorder>,
    check: Arc<dyn ConnectionCheck>,
}

impl HttpLogLayer {
    /// Create a layer reading its options from `config`.
    ///
    /// Pass a [`SharedConfig`] to keep the ability to change options later.
    /// The connection check defaults to [`TransportReported`].
    pub fn new(config: impl Into<SharedConfig>) -> Self {
        Self {
            config: config.into(),
            recorder: Arc::new(Recorder::new()),
            check: Arc::new(TransportReported),
        }
    }

    /// Replace the predicate deciding whether a call reached the network.
    pub fn with_connection_check<C: ConnectionCheck>(mut self, check: C) -> Self {
        self.check = Arc::new(check);
        self
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }
}

impl<S> Layer<S> for HttpLogLayer {
    type Service = HttpLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpLogService {
            inner,
            config: self.config.clone(),
            recorder: self.recorder.clone(),
            check: self.check.clone(),
        }
    }
}

/// Tower service wrapping an HTTP client.
///
/// Users typically don't interact with this type directly - it's created by
/// [`HttpLogLayer`].
#[derive(Clone)]
pub struct HttpLogService<S> {
    inner: S,
    config: SharedConfig,
    recorder: Arc<Recorder>,
    check: Arc<dyn ConnectionCheck>,
}

impl<S> Service<Request<Body>> for HttpLogService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let started = Instant::now();
        let config = self.config.snapshot();

        let context = ClientContext::from_request(&request);
        let url = context.url(request.uri());

        if !Recorder::admits(&config, &url) {
            return Box::pin(self.inner.call(request));
        }

        debug!(method = %request.method(), url = %url, "Capturing exchange");

        // The request body is read before delegating, so the ready service
        // moves into the future and a fresh clone stays behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let recorder = self.recorder.clone();
        let check = self.check.clone();

        Box::pin(async move {
            let method = request.method().clone();
            let path = request
                .uri()
                .path_and_query()
                .map(|p| p.as_str().to_string())
                .unwrap_or_else(|| "/".to_string());
            let request_headers = request.headers().clone();

            let (parts, body) = request.into_parts();
            let (body, request_capture) = if config.log_request_body && logs_request_body(&method) {
                capture_body(body, config.max_buffered_body).await
            } else {
                (body, Capture::Empty)
            };
            let request_body = match request_capture {
                Capture::Captured(bytes) => {
                    let encoding = BodyEncoding::detect(&request_headers, &bytes);
                    Some(Payload::new(bytes, encoding))
                }
                Capture::Empty | Capture::NotCapturable => None,
            };

            let result = inner.call(Request::from_parts(parts, body)).await;

            let live = check.is_live(match &result {
                Ok(response) => Outcome::Responded(response.status()),
                Err(e) => Outcome::Failed(e),
            });
            if !live {
                debug!("Connection was never established, not logging");
                return result;
            }

            let mut exchange = Exchange {
                context,
                method,
                path,
                request_headers,
                request_body,
                started,
                response: None,
            };

            match result {
                Ok(response) => {
                    let (parts, body) = response.into_parts();
                    let (body, response_body) = if config.log_response_body {
                        let (body, capture) = capture_body(body, config.max_buffered_body).await;
                        let captured = match capture {
                            Capture::Captured(bytes) => {
                                let encoding = BodyEncoding::detect(&parts.headers, &bytes);
                                ResponseBody::Captured(Payload::new(bytes, encoding))
                            }
                            Capture::Empty => ResponseBody::Captured(Payload::text("")),
                            Capture::NotCapturable => ResponseBody::NotCapturable,
                        };
                        (body, captured)
                    } else {
                        (body, ResponseBody::Skipped)
                    };

                    exchange.response = Some(ResponseSummary {
                        status: parts.status,
                        headers: parts.headers.clone(),
                        body: response_body,
                    });
                    recorder.record(&config, &exchange);

                    Ok(Response::from_parts(parts, body))
                }
                Err(e) => {
                    recorder.record(&config, &exchange);
                    Err(e)
                }
            }
        })
    }
}
