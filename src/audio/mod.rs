//! Audio decoding

pub mod decoder;

pub use decoder::{analysis_buffer, decode, ANALYSIS_SAMPLE_RATE, RENDER_SAMPLE_RATE};
