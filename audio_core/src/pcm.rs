//! Float-to-PCM quantization.

/// Convert one waveform frame to 16-bit signed PCM, sample for sample.
pub fn quantize_frame(frame: &[f32]) -> Vec<i16> {
    frame.iter().map(|&s| quantize_sample(s)).collect()
}

/// Map a float sample to i16. Values outside [-1.0, 1.0] clamp instead of
/// wrapping; non-finite samples become silence so a single corrupt frame
/// cannot kill an otherwise-good stream.
fn quantize_sample(s: f32) -> i16 {
    if !s.is_finite() {
        return 0;
    }
    (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Little-endian wire form of a PCM chunk.
pub fn pcm_bytes(pcm: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pcm.len() * 2);
    for &s in pcm {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_samples() {
        assert_eq!(quantize_frame(&[1.0]), vec![32767]);
        assert_eq!(quantize_frame(&[-1.0]), vec![-32767]);
        assert_eq!(quantize_frame(&[0.0]), vec![0]);
    }

    #[test]
    fn out_of_range_clamps_instead_of_wrapping() {
        assert_eq!(quantize_frame(&[1.5]), vec![32767]);
        assert_eq!(quantize_frame(&[-2.0]), vec![-32767]);
    }

    #[test]
    fn non_finite_becomes_silence() {
        assert_eq!(
            quantize_frame(&[f32::NAN, f32::INFINITY, f32::NEG_INFINITY]),
            vec![0, 0, 0]
        );
    }

    #[test]
    fn quantization_is_deterministic() {
        let frame: Vec<f32> = (0..100).map(|i| (i as f32 / 50.0) - 1.0).collect();
        assert_eq!(quantize_frame(&frame), quantize_frame(&frame));
    }

    #[test]
    fn rounds_to_nearest() {
        // 0.5 * 32767 = 16383.5, rounds away from zero
        assert_eq!(quantize_frame(&[0.5]), vec![16384]);
    }

    #[test]
    fn bytes_are_little_endian() {
        assert_eq!(pcm_bytes(&[0x0102, -1]), vec![0x02, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn byte_count_is_two_per_sample() {
        let pcm = quantize_frame(&[0.1; 250]);
        assert_eq!(pcm_bytes(&pcm).len(), 500);
    }
}
