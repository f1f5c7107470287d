//! WAV output using hound

use super::mixer::{mixdown, Voice};
use super::{RenderSummary, Renderer};
use crate::audio::RENDER_SAMPLE_RATE;
use crate::error::{AutomixError, Result};
use crate::mix::{MixPlan, MixSequence};
use crate::types::StereoBuffer;
use std::path::Path;
use tracing::{debug, info};

/// Renders plans to 16-bit stereo WAV files
#[derive(Debug, Clone)]
pub struct WavRenderer {
    sample_rate: u32,
}

impl WavRenderer {
    pub fn new() -> Self {
        Self {
            sample_rate: RENDER_SAMPLE_RATE,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

impl Default for WavRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for WavRenderer {
    fn render(&self, plan: &MixPlan, sequence: &MixSequence, output: &Path) -> Result<RenderSummary> {
        let voices = sequence
            .tracks()
            .iter()
            .map(|p| {
                p.track
                    .audio
                    .as_deref()
                    .map(|audio| Voice {
                        audio,
                        gain: p.track.gain as f32,
                    })
                    .ok_or_else(|| {
                        AutomixError::render_error(output, format!("No decoded audio for '{}'", p.label()))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let buffer = mixdown(plan, &voices, self.sample_rate);
        write_stereo_wav(output, &buffer)?;

        info!("Rendered {:.1}s mix to {}", buffer.duration, output.display());
        Ok(RenderSummary {
            frames: buffer.len(),
            seconds: buffer.duration,
        })
    }

    fn name(&self) -> &'static str {
        "wav"
    }
}

/// Write stereo audio to a WAV file
pub fn write_stereo_wav(path: &Path, audio: &StereoBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let fail = |what: &str, e: hound::Error| AutomixError::render_error(path, format!("{}: {}", what, e));

    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| fail("Failed to create WAV file", e))?;

    // Write interleaved stereo samples
    for (l, r) in audio.left.iter().zip(audio.right.iter()) {
        let l_i16 = (*l * 32767.0).clamp(-32768.0, 32767.0) as i16;
        let r_i16 = (*r * 32767.0).clamp(-32768.0, 32767.0) as i16;

        writer.write_sample(l_i16).map_err(|e| fail("Failed to write sample", e))?;
        writer.write_sample(r_i16).map_err(|e| fail("Failed to write sample", e))?;
    }

    writer.finalize().map_err(|e| fail("Failed to finalize WAV", e))?;

    debug!("Wrote {} frames to {}", audio.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_stereo_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.wav");
        let audio = StereoBuffer::new(vec![0.5, 2.0, -1.0], vec![0.0, -0.5, 0.25], 44100);

        write_stereo_wav(&path, &audio).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![16383, 0, 32767, -16383, -32767, 8191]);
    }

    #[test]
    fn test_unwritable_path_is_render_error() {
        let audio = StereoBuffer::new(vec![0.0], vec![0.0], 44100);
        let err = write_stereo_wav(Path::new("/no/such/dir/out.wav"), &audio).unwrap_err();
        assert!(matches!(err, AutomixError::RenderError { .. }));
        assert!(!err.is_recoverable());
    }
}
