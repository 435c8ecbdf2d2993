//! RIFF/WAVE container framing.
//!
//! Two framers: a finite WAV writer for the full-file path, and a 44-byte
//! streaming header whose length fields carry the max-u32 sentinel so
//! browsers start playback before the stream ends. Decoders that strictly
//! validate lengths may reject the streaming variant; that is a documented
//! limitation of the convention, not something to paper over here.

use std::io::Cursor;

use crate::error::AudioError;
use crate::{BITS_PER_SAMPLE, NUM_CHANNELS, SAMPLE_RATE};

pub const HEADER_LEN: usize = 44;

const BYTE_RATE: u32 = SAMPLE_RATE * NUM_CHANNELS as u32 * (BITS_PER_SAMPLE as u32 / 8);
const BLOCK_ALIGN: u16 = NUM_CHANNELS * (BITS_PER_SAMPLE / 8);

/// WAV header for a stream of unknown total length.
///
/// Emitted exactly once, before any PCM bytes exist. Both length fields
/// hold the maximum representable value (`ChunkSize = 0xFFFF_FFFF`,
/// `Subchunk2Size = 0xFFFF_FFFF - 36`), the "keep reading" signal
/// understood by tolerant decoders.
pub fn streaming_header() -> [u8; HEADER_LEN] {
    let mut h = [0u8; HEADER_LEN];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&NUM_CHANNELS.to_le_bytes());
    h[24..28].copy_from_slice(&SAMPLE_RATE.to_le_bytes());
    h[28..32].copy_from_slice(&BYTE_RATE.to_le_bytes());
    h[32..34].copy_from_slice(&BLOCK_ALIGN.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&(u32::MAX - 36).to_le_bytes());
    h
}

/// Write a complete finite WAV file from quantized samples.
pub fn write_wav(samples: &[i16]) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: NUM_CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(HEADER_LEN + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample(s)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn streaming_header_layout() {
        let h = streaming_header();
        assert_eq!(h.len(), 44);
        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(&h[8..12], b"WAVE");
        assert_eq!(&h[12..16], b"fmt ");
        assert_eq!(&h[36..40], b"data");
        assert_eq!(u32_at(&h, 4), u32::MAX);
        assert_eq!(u32_at(&h, 40), u32::MAX - 36);
    }

    #[test]
    fn streaming_header_format_fields() {
        let h = streaming_header();
        assert_eq!(u32_at(&h, 16), 16); // Subchunk1Size
        assert_eq!(u16_at(&h, 20), 1); // PCM
        assert_eq!(u16_at(&h, 22), 1); // mono
        assert_eq!(u32_at(&h, 24), 24_000);
        assert_eq!(u32_at(&h, 28), 48_000); // byte rate
        assert_eq!(u16_at(&h, 32), 2); // block align
        assert_eq!(u16_at(&h, 34), 16);
    }

    #[test]
    fn finite_wav_lengths_are_exact() {
        let samples = vec![0i16; 250];
        let wav = write_wav(&samples).unwrap();
        let data_size = (samples.len() * 2) as u32;
        assert_eq!(wav.len(), HEADER_LEN + data_size as usize);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 36 + data_size);
        assert_eq!(u32_at(&wav, 40), data_size);
    }

    #[test]
    fn finite_wav_of_nothing_is_header_only() {
        let wav = write_wav(&[]).unwrap();
        assert_eq!(wav.len(), HEADER_LEN);
        assert_eq!(u32_at(&wav, 40), 0);
    }
}
