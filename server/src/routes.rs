use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::TryStreamExt;

use audio_core::{SpeechEngine, StreamRequest};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::{AppMetrics, EndpointMetricsResponse, MetricsResponse, SystemMetrics};
use crate::validation::validate_speak_request;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn SpeechEngine>,
    pub metrics: Arc<AppMetrics>,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Build the API router. Routes are mounted at the root and again under
/// `/api`; the middleware stack is layered on in `main`.
pub fn app(state: AppState) -> Router {
    let _ = START_TIME.get_or_init(Instant::now);

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/voices", get(list_voices))
        .route("/text", post(text_endpoint))
        .route("/stream", post(stream_mp3_endpoint))
        .route("/stream/pcm", post(stream_pcm_endpoint))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .with_state(state)
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.voices())
}

/// Convert text to speech and return one complete WAV file.
///
/// Buffers the whole utterance before responding; the `/stream` endpoints
/// are the progressive-playback paths.
pub async fn text_endpoint(
    State(state): State<AppState>,
    Json(req): Json<StreamRequest>,
) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();
    validate_speak_request(&req)?;

    let wav = audio_core::render_complete(state.engine.clone(), req)
        .await
        .map_err(|e| {
            state.metrics.text.record_error();
            ApiError::from(e)
        })?;

    state
        .metrics
        .text
        .record_request(started.elapsed().as_millis() as u64);
    state.metrics.text.record_bytes(wav.len() as u64);

    Ok(([(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}

/// Stream speech as MP3 chunks (128 kbps, mono, 24 kHz).
///
/// Playback can begin as chunks arrive; suits MediaSource-style consumers.
pub async fn stream_mp3_endpoint(
    State(state): State<AppState>,
    Json(req): Json<StreamRequest>,
) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();
    validate_speak_request(&req)?;

    let stream = audio_core::stream_mp3(state.engine.clone(), req).map_err(|e| {
        state.metrics.stream_mp3.record_error();
        ApiError::from(e)
    })?;

    let bytes_out = state.metrics.stream_mp3.bytes_out.clone();
    let stream = stream.inspect_ok(move |chunk| {
        bytes_out.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    });

    state
        .metrics
        .stream_mp3
        .record_request(started.elapsed().as_millis() as u64);

    Ok((
        [(header::CONTENT_TYPE, "audio/mpeg")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Stream speech as WAV: the unknown-length header first, then raw PCM.
///
/// Browsers that tolerate the max-length convention play this directly as
/// it arrives.
pub async fn stream_pcm_endpoint(
    State(state): State<AppState>,
    Json(req): Json<StreamRequest>,
) -> Result<Response, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();
    validate_speak_request(&req)?;

    let stream = audio_core::stream_pcm(state.engine.clone(), req).map_err(|e| {
        state.metrics.stream_pcm.record_error();
        ApiError::from(e)
    })?;

    let bytes_out = state.metrics.stream_pcm.bytes_out.clone();
    let stream = stream.inspect_ok(move |chunk| {
        bytes_out.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    });

    state
        .metrics
        .stream_pcm
        .record_request(started.elapsed().as_millis() as u64);

    Ok((
        [(header::CONTENT_TYPE, "audio/wav")],
        Body::from_stream(stream),
    )
        .into_response())
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    let mut system = sysinfo::System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let cpu_usage = system.global_cpu_info().cpu_usage();
    let memory_used = system.used_memory();
    let memory_total = system.total_memory();
    let memory_usage_percent = if memory_total > 0 {
        (memory_used as f64 / memory_total as f64 * 100.0) as f32
    } else {
        0.0
    };

    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    // System load (Unix-like systems only)
    let system_load = {
        #[cfg(unix)]
        {
            std::fs::read_to_string("/proc/loadavg")
                .ok()
                .and_then(|loadavg| {
                    loadavg
                        .split_whitespace()
                        .next()
                        .and_then(|s| s.parse::<f64>().ok())
                })
        }
        #[cfg(not(unix))]
        None
    };

    Json(MetricsResponse {
        timestamp: chrono::Utc::now(),
        system: SystemMetrics {
            cpu_usage_percent: cpu_usage,
            memory_used_mb: memory_used / 1024 / 1024,
            memory_total_mb: memory_total / 1024 / 1024,
            memory_usage_percent,
            request_count: state.request_count.load(Ordering::Relaxed),
            uptime_seconds: uptime,
            system_load,
        },
        endpoints: EndpointMetricsResponse {
            text: state.metrics.text.snapshot(),
            stream_pcm: state.metrics.stream_pcm.snapshot(),
            stream_mp3: state.metrics.stream_mp3.snapshot(),
        },
    })
}
