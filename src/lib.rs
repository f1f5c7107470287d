//! automix - Automatic DJ mixing engine
//!
//! Takes an unordered collection of songs and produces one continuous
//! program: tracks are ordered by timbre similarity, their loudness is
//! equalized, and consecutive tracks are joined with beat-aligned
//! crossfades.
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `ingest`: Source discovery, remote retrieval and track loading
//! - `audio`: Audio decoding using symphonia
//! - `analysis`: Beat grid, timbre and tag extraction (with swappable backends)
//! - `features`: Resampling onto a common grid and whitening
//! - `mix`: Validity filtering, ordering, equalization and transition planning
//! - `render`: Mix plan to WAV
//! - `pipeline`: Stage orchestration
//! - `export`: Plan JSON output
//!
//! # Example
//!
//! ```no_run
//! use automix::{config::Settings, pipeline};
//!
//! let settings = Settings {
//!     sources: vec!["songs/".to_string()],
//!     order: true,
//!     equalize: true,
//!     ..Settings::default()
//! };
//! let outcome = pipeline::run(&settings).expect("Mixing failed");
//! println!("Mixed {} tracks", outcome.tracks.len());
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod ingest;
pub mod mix;
pub mod pipeline;
pub mod render;
pub mod types;

// Re-export key types at crate root
pub use error::{AutomixError, Result};
pub use mix::{Action, ActionKind, MixConfig, MixPlan};
pub use pipeline::MixOutcome;
pub use types::{Quantum, Segment, Track, TrackAnalysis, TransitionSpec};
