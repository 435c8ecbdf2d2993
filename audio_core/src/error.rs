use thiserror::Error;

/// Failure taxonomy for one pipeline run.
///
/// Out-of-range samples are not represented here: the quantizer clamps
/// them locally and the stream continues.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The synthesis engine could not produce further frames. Streams
    /// terminate at the last successfully emitted chunk.
    #[error("speech synthesis failed: {0}")]
    Synthesis(anyhow::Error),

    /// A PCM chunk could not be transcoded. The remaining stream is
    /// aborted rather than risking corrupt audio mid-playback.
    #[error("audio encoding failed: {0}")]
    Encoding(String),

    /// Writing the finite WAV container failed.
    #[error("wav write failed: {0}")]
    Wav(#[from] hound::Error),

    /// Invalid request parameters, rejected before any synthesis starts.
    #[error("invalid request: {0}")]
    Configuration(String),
}
