// Metrics collection and tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-endpoint counters.
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub bytes_out: Arc<AtomicU64>,
    total_latency_ms: Arc<AtomicU64>,
    latency_samples: Arc<Mutex<Vec<u64>>>,
}

impl EndpointMetrics {
    // Keep only the most recent samples for percentile calculation
    const MAX_SAMPLES: usize = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        if let Ok(mut samples) = self.latency_samples.lock() {
            samples.push(latency_ms);
            if samples.len() > Self::MAX_SAMPLES {
                samples.remove(0);
            }
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, n: u64) {
        self.bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EndpointStats {
        let request_count = self.request_count.load(Ordering::Relaxed);
        let avg_latency_ms = if request_count == 0 {
            0.0
        } else {
            self.total_latency_ms.load(Ordering::Relaxed) as f64 / request_count as f64
        };

        let sorted = {
            let mut samples = self
                .latency_samples
                .lock()
                .map(|s| s.clone())
                .unwrap_or_default();
            samples.sort_unstable();
            samples
        };

        EndpointStats {
            request_count,
            error_count: self.error_count.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            avg_latency_ms,
            p50_latency_ms: percentile(&sorted, 50),
            p95_latency_ms: percentile(&sorted, 95),
            p99_latency_ms: percentile(&sorted, 99),
        }
    }
}

fn percentile(sorted: &[u64], p: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = (sorted.len() * p / 100).min(sorted.len() - 1);
    sorted[index]
}

/// One [`EndpointMetrics`] per audio endpoint.
#[derive(Debug, Clone, Default)]
pub struct AppMetrics {
    pub text: EndpointMetrics,
    pub stream_pcm: EndpointMetrics,
    pub stream_mp3: EndpointMetrics,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub endpoints: EndpointMetricsResponse,
}

#[derive(Serialize)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub memory_usage_percent: f32,
    pub request_count: u64,
    pub uptime_seconds: u64,
    pub system_load: Option<f64>,
}

#[derive(Serialize)]
pub struct EndpointMetricsResponse {
    pub text: EndpointStats,
    pub stream_pcm: EndpointStats,
    pub stream_mp3: EndpointStats,
}

#[derive(Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub bytes_out: u64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
}
