//! Rendering a mix plan to audio
//!
//! Any failure here is fatal for the run.

pub mod mixer;
pub mod wav;

pub use mixer::{mixdown, Voice};
pub use wav::{write_stereo_wav, WavRenderer};

use crate::error::Result;
use crate::mix::{MixPlan, MixSequence};
use std::path::Path;

/// What a renderer produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    /// Frames per channel written
    pub frames: usize,
    /// Program length in seconds
    pub seconds: f64,
}

/// Rendering backend
///
/// Implementations must be thread-safe (Send + Sync).
pub trait Renderer: Send + Sync {
    /// Render `plan`, whose track indices refer to `sequence`, into `output`
    fn render(&self, plan: &MixPlan, sequence: &MixSequence, output: &Path) -> Result<RenderSummary>;

    /// Get the name of this renderer (for logging)
    fn name(&self) -> &'static str;
}
