use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::playback::PlaybackError;

/// Sample rate of the synthesized speech payload (mono PCM16).
pub const SPEECH_SAMPLE_RATE: u32 = 24000;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Decodes a base64 string holding little-endian PCM16 into f32 samples.
///
/// Each sample is divided by 32768, so the output lies in `[-1.0, 1.0)`.
/// A payload that is not valid base64, or whose byte length is odd, is
/// rejected rather than silently truncated.
pub fn decode_pcm16_base64(payload: &str) -> Result<Vec<f32>, PlaybackError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    if bytes.len() % 2 != 0 {
        return Err(PlaybackError::OddLength(bytes.len()));
    }
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();
    Ok(pcm16_to_f32(&samples))
}

/// Converts i16 samples to f32 by dividing by 32768.
pub fn pcm16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16.iter().map(|&sample| sample as f32 / 32768.0).collect()
}

/// Encodes f32 samples as base64 little-endian PCM16, clamping out-of-range values.
pub fn encode_pcm16_base64(samples: &[f32]) -> String {
    let bytes: Vec<u8> = samples
        .iter()
        .flat_map(|&sample| {
            let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            v.to_le_bytes()
        })
        .collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Creates a mono resampler between two sample rates.
fn create_resampler(
    in_sampling_rate: u32,
    out_sampling_rate: u32,
    chunk_size: usize,
) -> Result<FastFixedIn<f32>, PlaybackError> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate as f64 / in_sampling_rate as f64,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Resamples a whole mono buffer from `from_rate` to `to_rate`.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, PlaybackError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(from_rate, to_rate, RESAMPLER_CHUNK_SIZE)?;
    let expected = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;
    let mut output = Vec::with_capacity(expected + RESAMPLER_CHUNK_SIZE);

    let mut remaining = samples;
    while remaining.len() >= resampler.input_frames_next() {
        let (chunk, rest) = remaining.split_at(resampler.input_frames_next());
        let out = resampler.process(&[chunk], None)?;
        output.extend_from_slice(&out[0]);
        remaining = rest;
    }
    if !remaining.is_empty() {
        let out = resampler.process_partial(Some(&[remaining][..]), None)?;
        output.extend_from_slice(&out[0]);
    }
    // Flush the samples still held back by the interpolator delay.
    let tail = resampler.process_partial::<&[f32]>(None, None)?;
    output.extend_from_slice(&tail[0]);

    let delay = resampler.output_delay().min(output.len());
    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn encode(samples: &[i16]) -> String {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn decode_maps_extremes_and_zero() {
        let decoded = decode_pcm16_base64(&encode(&[0, i16::MIN, i16::MAX, 16384])).unwrap();
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0], 0.0);
        assert_eq!(decoded[1], -1.0);
        assert_abs_diff_eq!(decoded[2], 0.99997, epsilon = 0.00001);
        assert_abs_diff_eq!(decoded[3], 0.5, epsilon = 0.0001);
    }

    #[test]
    fn decode_keeps_sample_count_and_range() {
        let samples: Vec<i16> = (i16::MIN..=i16::MAX).step_by(97).collect();
        let decoded = decode_pcm16_base64(&encode(&samples)).unwrap();
        assert_eq!(decoded.len(), samples.len());
        assert!(decoded.iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert!(matches!(
            decode_pcm16_base64("not base64!"),
            Err(PlaybackError::Decode(_))
        ));
    }

    #[test]
    fn decode_rejects_odd_byte_length() {
        let payload = base64::engine::general_purpose::STANDARD.encode([0x00u8, 0x40, 0x01]);
        assert!(matches!(
            decode_pcm16_base64(&payload),
            Err(PlaybackError::OddLength(3))
        ));
    }

    #[test]
    fn decode_empty_payload_is_empty_buffer() {
        assert!(decode_pcm16_base64("").unwrap().is_empty());
    }

    #[test]
    fn encode_clamps_and_decodes_back() {
        let encoded = encode_pcm16_base64(&[0.5, -1.0, 2.0, -3.0]);
        let decoded = decode_pcm16_base64(&encoded).unwrap();
        assert_abs_diff_eq!(decoded[0], 0.5, epsilon = 0.0001);
        assert_eq!(decoded[1], -1.0);
        assert_abs_diff_eq!(decoded[2], i16::MAX as f32 / 32768.0, epsilon = 0.00001);
        assert_eq!(decoded[3], -1.0);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let input = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(&input, 24000, 24000).unwrap(), input);
    }

    #[test]
    fn resample_scales_length_by_rate_ratio() {
        let input: Vec<f32> = (0..24000).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let up = resample(&input, 24000, 48000).unwrap();
        assert!(up.len() <= 48000 && up.len() > 47000, "got {}", up.len());

        let down = resample(&input, 24000, 16000).unwrap();
        assert!(down.len() <= 16000 && down.len() > 15500, "got {}", down.len());
        assert!(down.iter().all(|v| v.abs() <= 1.0));
    }
}
