//! Audio decoding using symphonia
//!
//! Every input is decoded once to stereo at [`RENDER_SAMPLE_RATE`], which is
//! what the renderer mixes. Analysis works on a mono copy at
//! [`ANALYSIS_SAMPLE_RATE`] derived from that buffer.

use crate::error::{AutomixError, Result};
use crate::types::{AudioBuffer, StereoBuffer};
use rubato::{FftFixedInOut, Resampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Sample rate of decoded tracks and of the rendered mix
pub const RENDER_SAMPLE_RATE: u32 = 44100;

/// Sample rate for beat and timbre analysis (content above 11 kHz is not needed)
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

/// Maximum file size we'll attempt to decode (2GB)
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Rubato chunk size in frames
const CHUNK_SIZE: usize = 1024;

/// Decode an audio file to a stereo buffer at [`RENDER_SAMPLE_RATE`]
///
/// Mono sources are duplicated onto both channels; sources with more than
/// two channels keep their front pair.
pub fn decode(path: &Path) -> Result<StereoBuffer> {
    let (samples, source_rate, channels) = read_interleaved(path)?;

    let stereo = match channels {
        1 => StereoBuffer::from_mono(samples, source_rate),
        2 => StereoBuffer::from_interleaved(&samples, source_rate),
        n => StereoBuffer::from_interleaved(&front_pair(&samples, n), source_rate),
    };

    let stereo = if source_rate != RENDER_SAMPLE_RATE {
        let mut channels = resample(&[stereo.left, stereo.right], source_rate, RENDER_SAMPLE_RATE);
        let right = channels.pop().unwrap_or_default();
        let left = channels.pop().unwrap_or_default();
        StereoBuffer::new(left, right, RENDER_SAMPLE_RATE)
    } else {
        stereo
    };

    debug!(
        "Decoded {} ({} frames, {:.2}s)",
        path.display(),
        stereo.len(),
        stereo.duration
    );
    Ok(stereo)
}

/// Mono copy of a decoded track at [`ANALYSIS_SAMPLE_RATE`]
pub fn analysis_buffer(stereo: &StereoBuffer) -> AudioBuffer {
    let mono = stereo.to_mono();
    if mono.sample_rate == ANALYSIS_SAMPLE_RATE || mono.sample_rate == 0 {
        return mono;
    }
    let samples = resample(&[mono.samples], mono.sample_rate, ANALYSIS_SAMPLE_RATE)
        .pop()
        .unwrap_or_default();
    AudioBuffer::new(samples, ANALYSIS_SAMPLE_RATE)
}

/// Read all packets of the first audio track as interleaved f32 samples
///
/// Returns `(samples, sample_rate, channels)`.
fn read_interleaved(path: &Path) -> Result<(Vec<f32>, u32, usize)> {
    let fail = |reason: String| AutomixError::decode_error(path, reason);

    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AutomixError::FileNotFound(path.to_path_buf())
        } else {
            fail(format!("Failed to read file metadata: {}", e))
        }
    })?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(fail(format!(
            "File too large ({:.1} GB). Maximum supported size is 2 GB.",
            metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
        )));
    }

    let file = std::fs::File::open(path).map_err(|e| fail(format!("Failed to open file: {}", e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| fail(format!("Failed to probe format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| fail("No audio tracks found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate.unwrap_or(RENDER_SAMPLE_RATE);
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

    debug!(
        "Decoding: {} @ {}Hz, {} channels",
        path.display(),
        sample_rate,
        channels
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| fail(format!("Failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(fail(format!("Failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => return Err(fail(format!("Decode error: {}", e))),
        };

        // The decoded spec is authoritative when the container omits it
        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count();

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() || channels == 0 {
        return Err(fail("File contains no audio samples".to_string()));
    }

    Ok((samples, sample_rate, channels))
}

/// Keep the first two channels of interleaved multi-channel audio
fn front_pair(samples: &[f32], channels: usize) -> Vec<f32> {
    samples
        .chunks_exact(channels)
        .flat_map(|frame| [frame[0], frame[1]])
        .collect()
}

/// Resample planar channels with rubato
///
/// All channels go through one FFT resampler so they stay sample-aligned.
fn resample(channels: &[Vec<f32>], from_rate: u32, to_rate: u32) -> Vec<Vec<f32>> {
    if from_rate == to_rate || channels.is_empty() {
        return channels.to_vec();
    }

    let mut resampler = match FftFixedInOut::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        channels.len(),
    ) {
        Ok(r) => r,
        Err(e) => {
            debug!("Rubato initialization failed ({}), using linear fallback", e);
            return channels
                .iter()
                .map(|c| resample_linear(c, from_rate, to_rate))
                .collect();
        }
    };

    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (frames as f64 * ratio).ceil() as usize;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected); channels.len()];

    let mut pos = 0;
    while pos < frames {
        let chunk_in = resampler.input_frames_next();
        let end = (pos + chunk_in).min(frames);
        let input: Vec<Vec<f32>> = channels
            .iter()
            .map(|c| {
                let mut chunk = c[pos..end].to_vec();
                chunk.resize(chunk_in, 0.0);
                chunk
            })
            .collect();

        match resampler.process(&input, None) {
            Ok(resampled) => {
                let valid = ((end - pos) as f64 * ratio).ceil() as usize;
                for (out, chunk) in output.iter_mut().zip(resampled.iter()) {
                    out.extend_from_slice(&chunk[..valid.min(chunk.len())]);
                }
            }
            Err(e) => {
                debug!("Rubato processing error ({}), using linear fallback for remainder", e);
                for (out, channel) in output.iter_mut().zip(channels.iter()) {
                    out.extend(resample_linear(&channel[pos..frames], from_rate, to_rate));
                }
                break;
            }
        }
        pos = end;
    }

    output
}

/// Linear interpolation, used only when rubato fails
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / step) as usize;

    (0..output_len)
        .map(|i| {
            let src = i as f64 * step;
            let idx = src as usize;
            let frac = (src - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(a), Some(b)) => a * (1.0 - frac) + b * frac,
                (Some(a), None) => *a,
                _ => samples[samples.len() - 1],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_pair_drops_surround_channels() {
        // Two frames of 5.1: FL, FR, FC, LFE, BL, BR
        let samples = vec![0.1, 0.2, 0.9, 0.9, 0.9, 0.9, 0.3, 0.4, 0.9, 0.9, 0.9, 0.9];
        assert_eq!(front_pair(&samples, 6), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_resample_identity() {
        let channels = vec![vec![0.1, 0.2, 0.3, 0.4, 0.5]];
        assert_eq!(resample(&channels, 44100, 44100), channels);
    }

    #[test]
    fn test_resample_keeps_channels_aligned() {
        let ramp: Vec<f32> = (0..5000).map(|i| i as f32 / 5000.0).collect();
        let result = resample(&[ramp.clone(), ramp], 48000, 44100);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].len(), result[1].len());
        assert!((result[0].len() as f64 - 4593.75).abs() < 4.0, "got {}", result[0].len());
    }

    #[test]
    fn test_resample_sine_wave_integrity() {
        use std::f32::consts::PI;
        let samples: Vec<f32> = (0..4000)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();

        let result = resample(&[samples], 44100, 22050).pop().unwrap();
        let max_val = result.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_val = result.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!(max_val > 0.9, "Max value {} should be > 0.9", max_val);
        assert!(min_val < -0.9, "Min value {} should be < -0.9", min_val);
    }

    #[test]
    fn test_linear_fallback_length() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let result = resample_linear(&samples, 44100, 22050);
        assert!((result.len() as f64 - 50.0).abs() < 2.0);
    }

    #[test]
    fn test_analysis_buffer_is_mono_at_analysis_rate() {
        let stereo = StereoBuffer::from_mono(vec![0.5; 44100], RENDER_SAMPLE_RATE);
        let mono = analysis_buffer(&stereo);
        assert_eq!(mono.sample_rate, ANALYSIS_SAMPLE_RATE);
        assert!((mono.duration - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = decode(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, AutomixError::FileNotFound(_)));
    }
}
