//! Per-chunk MP3 transcoding.
//!
//! Every PCM chunk is encoded with a fresh LAME instance and flushed, so
//! each emitted unit decodes on its own and chunk N never waits on chunk
//! N-1's encoder state. The cost is a little compression efficiency and a
//! possible seam at chunk boundaries; a stateful encoder can be swapped in
//! through [`ChunkTranscoder`] without touching the stream assembler.

use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, MonoPcm, Quality};

use crate::error::AudioError;
use crate::{NUM_CHANNELS, SAMPLE_RATE};

/// Strategy seam between the stream assembler and the codec.
pub trait ChunkTranscoder: Send + Sync {
    /// Convert one PCM chunk into one independently decodable unit.
    fn transcode(&self, pcm: &[i16]) -> Result<Vec<u8>, AudioError>;
}

/// LAME-backed transcoder, constant bitrate, mono, pipeline sample rate.
pub struct Mp3Transcoder {
    bitrate: Bitrate,
    quality: Quality,
}

impl Mp3Transcoder {
    pub fn new(bitrate: Bitrate, quality: Quality) -> Self {
        Self { bitrate, quality }
    }
}

impl Default for Mp3Transcoder {
    fn default() -> Self {
        // 128 kbps CBR, the rate MediaSource consumers expect from us
        Self::new(Bitrate::Kbps128, Quality::Best)
    }
}

impl ChunkTranscoder for Mp3Transcoder {
    fn transcode(&self, pcm: &[i16]) -> Result<Vec<u8>, AudioError> {
        let mut builder = Builder::new()
            .ok_or_else(|| AudioError::Encoding("lame: failed to allocate encoder".to_string()))?;
        builder
            .set_num_channels(NUM_CHANNELS as u8)
            .map_err(|e| AudioError::Encoding(format!("lame channels: {e}")))?;
        builder
            .set_sample_rate(SAMPLE_RATE)
            .map_err(|e| AudioError::Encoding(format!("lame sample rate: {e}")))?;
        builder
            .set_brate(self.bitrate)
            .map_err(|e| AudioError::Encoding(format!("lame bitrate: {e}")))?;
        builder
            .set_quality(self.quality)
            .map_err(|e| AudioError::Encoding(format!("lame quality: {e}")))?;
        let mut encoder = builder
            .build()
            .map_err(|e| AudioError::Encoding(format!("lame build: {e}")))?;

        let mut out: Vec<u8> = Vec::new();
        out.reserve(mp3lame_encoder::max_required_buffer_size(pcm.len()));
        let written = encoder
            .encode(MonoPcm(pcm), out.spare_capacity_mut())
            .map_err(|e| AudioError::Encoding(format!("lame encode: {e}")))?;
        // SAFETY: encode initialized exactly `written` bytes of spare capacity.
        unsafe { out.set_len(out.len() + written) };

        out.reserve(7200); // worst-case flush output per the LAME docs
        let written = encoder
            .flush::<FlushNoGap>(out.spare_capacity_mut())
            .map_err(|e| AudioError::Encoding(format!("lame flush: {e}")))?;
        // SAFETY: as above.
        unsafe { out.set_len(out.len() + written) };

        Ok(out)
    }
}
