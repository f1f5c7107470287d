//! Turning a [`MixPlan`] into one stereo buffer
//!
//! The output clock advances in seconds and every action ends on the sample
//! nearest to its nominal end, so rounding never accumulates across a long
//! program.

use crate::mix::{crossmatch_lengths, Action, MixPlan};
use crate::types::{Quantum, StereoBuffer};

/// One track as seen by the mixer
#[derive(Debug, Clone, Copy)]
pub struct Voice<'a> {
    pub audio: &'a StereoBuffer,
    pub gain: f32,
}

/// Amplitude shape of a single-track action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Envelope {
    Flat,
    Rise,
    Fall,
}

impl Envelope {
    fn at(self, x: f64) -> f32 {
        match self {
            Envelope::Flat => 1.0,
            Envelope::Rise => x as f32,
            Envelope::Fall => (1.0 - x) as f32,
        }
    }
}

/// Render every action of `plan` in order
///
/// `voices[i]` plays the plan's track `i`. Actions naming a missing voice
/// render as silence.
pub fn mixdown(plan: &MixPlan, voices: &[Voice<'_>], sample_rate: u32) -> StereoBuffer {
    let mut mix = Mixdown::new(sample_rate);

    for action in &plan.actions {
        match action {
            Action::FadeIn { track, start, duration } => {
                mix.push_segment(voices.get(*track), *start, *duration, Envelope::Rise)
            }
            Action::Playback { track, start, duration } => {
                mix.push_segment(voices.get(*track), *start, *duration, Envelope::Flat)
            }
            Action::FadeOut { track, start, duration } => {
                mix.push_segment(voices.get(*track), *start, *duration, Envelope::Fall)
            }
            Action::Crossmatch {
                from,
                to,
                outgoing,
                incoming,
            } => mix.push_crossmatch(voices.get(*from), voices.get(*to), outgoing, incoming),
        }
    }

    mix.finish()
}

struct Mixdown {
    left: Vec<f32>,
    right: Vec<f32>,
    sample_rate: u32,
    /// Program time reached so far, in seconds
    clock: f64,
}

impl Mixdown {
    fn new(sample_rate: u32) -> Self {
        Self {
            left: Vec::new(),
            right: Vec::new(),
            sample_rate,
            clock: 0.0,
        }
    }

    /// Frames needed to advance the clock by `duration`
    fn frames_for(&self, duration: f64) -> usize {
        let end = ((self.clock + duration.max(0.0)) * self.sample_rate as f64).round() as usize;
        end.saturating_sub(self.left.len())
    }

    fn push_segment(&mut self, voice: Option<&Voice<'_>>, start: f64, duration: f64, envelope: Envelope) {
        let frames = self.frames_for(duration);
        let rate = self.sample_rate as f64;

        for i in 0..frames {
            let (l, r) = match voice {
                Some(v) => {
                    let g = v.gain * envelope.at(i as f64 / frames as f64);
                    let (l, r) = read(v.audio, start + i as f64 / rate);
                    (l * g, r * g)
                }
                None => (0.0, 0.0),
            };
            self.left.push(l);
            self.right.push(r);
        }
        self.clock += duration.max(0.0);
    }

    fn push_crossmatch(
        &mut self,
        from: Option<&Voice<'_>>,
        to: Option<&Voice<'_>>,
        outgoing: &[Quantum],
        incoming: &[Quantum],
    ) {
        let lengths = crossmatch_lengths(outgoing, incoming);
        let total: f64 = lengths.iter().sum();
        let mut elapsed = 0.0;

        for (k, length) in lengths.iter().enumerate() {
            let frames = self.frames_for(*length);
            for i in 0..frames {
                let x = i as f64 / frames as f64;
                let ramp = if total > 0.0 {
                    ((elapsed + x * length) / total).clamp(0.0, 1.0) as f32
                } else {
                    1.0
                };
                // Each beat is stretched or squeezed to the pair's length
                let a = voiced(from, outgoing[k].start + x * outgoing[k].duration);
                let b = voiced(to, incoming[k].start + x * incoming[k].duration);
                self.left.push(a.0 * (1.0 - ramp) + b.0 * ramp);
                self.right.push(a.1 * (1.0 - ramp) + b.1 * ramp);
            }
            elapsed += length;
            self.clock += length;
        }
    }

    fn finish(self) -> StereoBuffer {
        StereoBuffer::new(self.left, self.right, self.sample_rate)
    }
}

fn voiced(voice: Option<&Voice<'_>>, seconds: f64) -> (f32, f32) {
    match voice {
        Some(v) => {
            let (l, r) = read(v.audio, seconds);
            (l * v.gain, r * v.gain)
        }
        None => (0.0, 0.0),
    }
}

/// Linearly interpolated stereo sample at `seconds`; silence outside the buffer
fn read(audio: &StereoBuffer, seconds: f64) -> (f32, f32) {
    let pos = seconds * audio.sample_rate as f64;
    if !pos.is_finite() || pos < 0.0 {
        return (0.0, 0.0);
    }
    let index = pos.floor() as usize;
    let frac = (pos - index as f64) as f32;
    let len = audio.len();
    if index >= len {
        return (0.0, 0.0);
    }
    let next = index + 1;
    let (l1, r1) = if next < len {
        (audio.left[next], audio.right[next])
    } else {
        (0.0, 0.0)
    };
    (
        audio.left[index] + (l1 - audio.left[index]) * frac,
        audio.right[index] + (r1 - audio.right[index]) * frac,
    )
}
