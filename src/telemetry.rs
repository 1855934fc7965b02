use anyhow::Context;
use axum::http::{HeaderValue, Request};
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{MakeRequestId, RequestId},
    trace::MakeSpan,
};
use tracing::{subscriber::set_global_default, Span, Subscriber};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Bunyan-formatted JSON logs written to `sink`, filtered by `RUST_LOG` when set.
pub fn get_subscriber<Sink>(
    name: impl Into<String>,
    default_env_filter: &str,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_env_filter));

    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(BunyanFormattingLayer::new(name.into(), sink))
}

pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) -> Result<(), anyhow::Error> {
    LogTracer::init().context("Failed to redirect log records to tracing")?;
    set_global_default(subscriber).context("Failed to install the global subscriber")
}

/// Runs CPU-heavy work such as password hashing off the async runtime,
/// inside the caller's span.
pub fn spawn_blocking_with_tracing<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let current_span = Span::current();
    tokio::task::spawn_blocking(move || current_span.in_scope(f))
}

#[derive(Clone, Copy, Debug)]
pub struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .map(RequestId::new)
            .map_err(|e| tracing::warn!(error = %e, "Failed to build request id"))
            .ok()
    }
}

/// Root span of every HTTP request.
#[derive(Clone, Copy, Debug)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok());

        tracing::info_span!(
            "HTTP request",
            request_id,
            method = %request.method(),
            path = request.uri().path(),
        )
    }
}
