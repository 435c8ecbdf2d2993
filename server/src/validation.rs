use audio_core::StreamRequest;

use crate::error::ApiError;

/// Maximum text length for synthesis requests
const MAX_TEXT_LENGTH: usize = 5000;
/// Speed multiplier bounds accepted over HTTP
const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

/// Validate a synthesis request before it reaches the pipeline.
pub fn validate_speak_request(req: &StreamRequest) -> Result<(), ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if req.text.len() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }

    if !req.speed.is_finite() || req.speed < MIN_SPEED || req.speed > MAX_SPEED {
        return Err(ApiError::InvalidInput(format!(
            "Speed must be between {} and {}",
            MIN_SPEED, MAX_SPEED
        )));
    }

    if !is_valid_voice_id(&req.voice) {
        return Err(ApiError::InvalidInput(format!(
            "Invalid voice id: {}. Expected lowercase letters, digits and underscores",
            req.voice
        )));
    }

    Ok(())
}

/// Voice ids look like `af_bella`: short, lowercase, underscore-separated.
fn is_valid_voice_id(voice: &str) -> bool {
    !voice.is_empty()
        && voice.len() <= 64
        && voice
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
