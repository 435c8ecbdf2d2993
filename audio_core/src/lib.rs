//! Speech-audio streaming and framing pipeline.
//!
//! Takes the lazily-produced waveform frames of a synthesis engine and
//! repackages them for HTTP delivery: a complete WAV file, a progressively
//! playable WAV stream of unknown length, or a chunked MP3 stream.

pub mod engine;
pub mod error;
pub mod mp3;
pub mod pcm;
pub mod stream;
pub mod wav;

use serde::Deserialize;
use tokio::sync::mpsc;

pub use engine::PiperEngine;
pub use error::AudioError;
pub use mp3::{ChunkTranscoder, Mp3Transcoder};
pub use stream::{render_complete, stream_encoded, stream_mp3, stream_pcm};

/// Fixed output sample rate for every delivery mode.
pub const SAMPLE_RATE: u32 = 24_000;
pub const NUM_CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

pub const DEFAULT_VOICE: &str = "af_bella";
pub const DEFAULT_SPEED: f32 = 1.0;

/// Parameters of one pipeline run. Immutable once built; one request maps
/// to exactly one synthesis pass and one response body.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamRequest {
    pub text: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_speed() -> f32 {
    DEFAULT_SPEED
}

impl StreamRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: default_voice(),
            speed: DEFAULT_SPEED,
        }
    }

    /// Reject bad parameters before any engine work happens.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.text.trim().is_empty() {
            return Err(AudioError::Configuration(
                "text must not be empty".to_string(),
            ));
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(AudioError::Configuration(format!(
                "speed must be positive, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}

/// Hand-off point for frames produced on the synthesis thread.
pub struct FrameSink {
    tx: mpsc::Sender<Result<Vec<f32>, AudioError>>,
}

impl FrameSink {
    pub(crate) fn new(tx: mpsc::Sender<Result<Vec<f32>, AudioError>>) -> Self {
        Self { tx }
    }

    /// Deliver one waveform frame. Returns `false` once the consumer is
    /// gone; the engine should stop synthesizing at that point.
    ///
    /// Blocks while the channel is full, which is what bounds how far
    /// synthesis can run ahead of the transport.
    pub fn send(&self, frame: Vec<f32>) -> bool {
        self.tx.blocking_send(Ok(frame)).is_ok()
    }
}

/// The external synthesis engine, seen from the pipeline's side.
///
/// One process-wide instance is created at startup and shared across
/// requests behind an `Arc`; implementations must therefore be usable
/// concurrently.
pub trait SpeechEngine: Send + Sync {
    /// Voice identifiers this engine can speak with.
    fn voices(&self) -> Vec<String>;

    /// Synthesize `request`, pushing each waveform frame into `out` as it
    /// is produced. Called on a blocking thread; returns once the
    /// utterance is complete, an error occurs, or `out` reports the
    /// consumer has gone away.
    fn synthesize(&self, request: &StreamRequest, out: &FrameSink) -> Result<(), AudioError>;
}
