//! Common utilities for integration tests

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::Router;

use audio_core::{AudioError, FrameSink, SpeechEngine, StreamRequest};
use server::config::ServerConfig;
use server::metrics::AppMetrics;
use server::{app, AppState};

/// Scripted engine: plays back fixed frames, optionally failing afterwards.
pub struct MockEngine {
    frames: Vec<Vec<f32>>,
    fail_after: bool,
}

impl MockEngine {
    pub fn with_frames(frames: Vec<Vec<f32>>) -> Self {
        Self {
            frames,
            fail_after: false,
        }
    }

    pub fn failing_after(frames: Vec<Vec<f32>>) -> Self {
        Self {
            frames,
            fail_after: true,
        }
    }
}

impl SpeechEngine for MockEngine {
    fn voices(&self) -> Vec<String> {
        vec!["af_bella".to_string()]
    }

    fn synthesize(&self, _request: &StreamRequest, out: &FrameSink) -> Result<(), AudioError> {
        for frame in &self.frames {
            if !out.send(frame.clone()) {
                return Ok(());
            }
        }
        if self.fail_after {
            return Err(AudioError::Synthesis(anyhow::anyhow!("engine gave up")));
        }
        Ok(())
    }
}

/// Create a test app over two frames of 100 and 150 samples.
pub fn create_test_app() -> Router {
    create_test_app_with(MockEngine::with_frames(vec![
        vec![0.25; 100],
        vec![-0.25; 150],
    ]))
}

pub fn create_test_app_with(engine: MockEngine) -> Router {
    let state = AppState {
        engine: Arc::new(engine),
        metrics: Arc::new(AppMetrics::new()),
        request_count: Arc::new(AtomicU64::new(0)),
        config: ServerConfig::default(),
    };
    app(state)
}
