use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer,
};
use tracing::{info, warn};

use audio_core::{PiperEngine, SpeechEngine};
use server::config::ServerConfig;
use server::metrics::AppMetrics;
use server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    info!("Starting speech streaming server...");

    // The engine is process-wide: models are expensive to load, so it is
    // built once here and shared by reference with every request.
    let mapfile = std::env::var("VOICES_MAPFILE").unwrap_or_else(|_| "models/voices.json".into());
    let engine: Arc<dyn SpeechEngine> =
        Arc::new(PiperEngine::from_mapfile(&mapfile).unwrap_or_else(|e| {
            warn!("Could not load {mapfile}: {e}, starting with no voices.");
            PiperEngine::new(HashMap::new())
        }));
    info!("Loaded {} voices", engine.voices().len());

    let config = ServerConfig::from_env();
    let state = AppState {
        engine,
        metrics: Arc::new(AppMetrics::new()),
        request_count: Arc::new(AtomicU64::new(0)),
        config: config.clone(),
    };
    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, request_timeout={}s",
        config.port, config.rate_limit_per_minute, config.request_timeout_secs
    );

    let cors = build_cors(&config);

    // Global rate limit; per-IP extraction is unreliable behind Docker or a
    // proxy, so all requests share one bucket.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(((config.rate_limit_per_minute / 60).max(1)) as u64)
            .burst_size(config.rate_limit_per_minute)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .unwrap(),
    );
    info!("Rate limiting: {} requests per minute", config.rate_limit_per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(cors)
        .into_inner();

    let app = app(state)
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT."))?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    request.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&request_id).unwrap(),
    );
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&request_id).unwrap(),
    );
    response
}

/// CORS configuration - environment-aware
fn build_cors(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false);

    match &config.cors_allowed_origins {
        Some(allowed) => {
            let origins: Vec<HeaderValue> = allowed
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
                base.allow_origin(tower_http::cors::Any)
            } else {
                info!("CORS configured for {} origin(s)", origins.len());
                base.allow_origin(tower_http::cors::AllowOrigin::list(origins))
            }
        }
        None => {
            warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
            base.allow_origin(tower_http::cors::Any)
        }
    }
}
