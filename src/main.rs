use std::{sync::Arc, time::Duration};

use crate::endpoints::*;
use anyhow::Context;
use axum::{
    Router,
    extract::{DefaultBodyLimit, MatchedPath},
    response::Response,
    routing::get,
};
use config::Config;
use http::{HeaderValue, Method, header, header::USER_AGENT};
use opentelemetry::{global, trace::TracerProvider as _};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    attribute::OTEL_STATUS_CODE,
    trace::{
        HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, HTTP_ROUTE, NETWORK_PROTOCOL_VERSION,
        URL_FULL, USER_AGENT_ORIGINAL,
    },
};
use state::AppState;
use storage::Storage;
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::field::Empty;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod endpoints;
pub mod error;
pub mod services;
pub mod state;
pub mod statement_parsing;
pub mod storage;

const SERVICE_NAME: &str = env!("CARGO_CRATE_NAME");

#[tokio::main]
async fn main() {
    let config = Arc::new(Config::new().expect("config"));

    let tracer_provider = config
        .otel_exporter_otlp_endpoint
        .as_deref()
        .map(build_tracer_provider)
        .transpose()
        .expect("error creating trace exporter");

    let otel_layer = tracer_provider.as_ref().map(|provider| {
        OpenTelemetryLayer::new(provider.tracer(SERVICE_NAME)).with_location(false)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{SERVICE_NAME}=debug,tower_http=info,axum::rejection=trace").into()
            }),
        )
        .with(otel_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_line_number(false)
                .with_file(false),
        )
        .init();

    let storage = Storage::new(&config.s3).expect("storage");
    let state = AppState {
        config: config.clone(),
        storage,
    };

    let api = app(state).expect("app");

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("error binding listener");
    tracing::debug!(
        "listening on {}, upload policy {:?}",
        listener.local_addr().expect("local addr"),
        config.upload_policy
    );

    axum::serve(listener, api)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server");

    if let Some(provider) = tracer_provider {
        let _ = provider
            .shutdown()
            .map_err(|err| eprintln!("error shutting down tracer provider: {err:?}"));
    }
}

fn build_tracer_provider(endpoint: &str) -> anyhow::Result<SdkTracerProvider> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(3))
        .build()
        .context("error building span exporter")?;

    let provider = SdkTracerProvider::builder()
        .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::TraceIdRatioBased(0.5))
        .build();

    global::set_tracer_provider(provider.clone());

    return Ok(provider);
}

pub fn app(state: AppState) -> anyhow::Result<Router> {
    let cors = cors(&state.config)?;
    let max_upload_bytes = state.config.max_upload_bytes;

    let routes = Router::new()
        .route(
            "/upload",
            get(statements::latest).post(statements::upload),
        )
        .route("/openapi.json", get(openapi))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    let routes = match cors {
        Some(cors) => routes.layer(cors),
        None => routes,
    };

    let routes = routes.with_state(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &http::Request<axum::body::Body>| {
                let matched_path = request
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str)
                    .unwrap_or("{unknown}");

                tracing::info_span!(
                    "request",
                    otel.name = format!("{} {}", request.method(), matched_path),
                    { OTEL_STATUS_CODE } = Empty,
                    { HTTP_REQUEST_METHOD } = ?request.method(),
                    { HTTP_ROUTE } = %request.uri().path(),
                    { URL_FULL } = %request.uri(),
                    { NETWORK_PROTOCOL_VERSION } = ?request.version(),
                    { HTTP_RESPONSE_STATUS_CODE } = Empty,
                    { USER_AGENT_ORIGINAL } = %request.headers().get(USER_AGENT).and_then(|h| h.to_str().ok()).unwrap_or_default()
                )
            })
            .on_response(|response: &Response, _latency: Duration, span: &tracing::Span| {
                let status_code = response.status().as_u16();
                let outcome = if status_code < 400 { "ok" } else { "error" };
                span.record(OTEL_STATUS_CODE, outcome);
                span.record(HTTP_RESPONSE_STATUS_CODE, status_code);
            })
            .on_failure(|_, _, span: &tracing::Span| {
                span.record(OTEL_STATUS_CODE, "error");
            }),
    );

    return Ok(Router::new().nest("/api", routes));
}

fn cors(config: &Config) -> anyhow::Result<Option<CorsLayer>> {
    let Some(front_base_url) = &config.front_base_url else {
        return Ok(None);
    };

    let origin = front_base_url
        .parse::<HeaderValue>()
        .context("invalid FRONT_BASE_URL")?;

    let layer = CorsLayer::new()
        .allow_methods([Method::OPTIONS, Method::HEAD, Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ACCEPT_ENCODING,
            header::ACCEPT_LANGUAGE,
        ])
        .allow_origin(origin);

    return Ok(Some(layer));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("error installing ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("error installing signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health_check() -> &'static str {
    return "OK";
}
