//! Runtime configuration settings

use crate::error::{AutomixError, Result};
use crate::features::{Rate, WhiteningMethod};
use crate::mix::MixConfig;
use crate::types::TransitionSpec;
use std::path::PathBuf;

/// Runtime settings for the mixing pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Source identifiers in input order
    pub sources: Vec<String>,
    /// Playback and crossfade lengths
    pub spec: TransitionSpec,
    /// Reorder tracks by feature similarity
    pub order: bool,
    /// Equalize loudness
    pub equalize: bool,
    /// Rendered WAV file
    pub output: PathBuf,
    /// Optional plan JSON file
    pub plan_output: Option<PathBuf>,
    /// Feature grid
    pub rate: Rate,
    /// Feature whitening
    pub whitening: WhiteningMethod,
    /// Planner and equalizer tunables
    pub mix: MixConfig,
    /// Store fresh analyses as sidecars
    pub write_sidecars: bool,
    /// Number of worker threads
    pub threads: usize,
    /// Show progress bars
    pub show_progress: bool,
    /// Plan only, no rendering
    pub dry_run: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &super::cli::Cli) -> Result<Self> {
        let spec = TransitionSpec::new(cli.inter, cli.transition)?;

        let rate = match cli.feature_rate {
            Some(hz) if hz.is_finite() && hz > 0.0 => Rate::Fixed { hz },
            Some(hz) => {
                return Err(AutomixError::ConfigError(format!(
                    "feature rate must be a positive number of Hz, got {}",
                    hz
                )))
            }
            None => Rate::Beats,
        };

        if cli.threads == Some(0) {
            return Err(AutomixError::ConfigError("thread count must be at least 1".to_string()));
        }

        Ok(Self {
            sources: cli.sources.clone(),
            spec,
            order: cli.order,
            equalize: cli.equalize,
            output: cli.output.clone(),
            plan_output: cli.plan.clone(),
            rate,
            write_sidecars: cli.write_sidecars,
            threads: cli.threads.unwrap_or_else(default_threads),
            show_progress: !cli.quiet,
            dry_run: cli.dry_run,
            ..Self::default()
        })
    }
}

fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            spec: TransitionSpec::default(),
            order: false,
            equalize: false,
            output: PathBuf::from("automix.wav"),
            plan_output: None,
            rate: Rate::default(),
            whitening: WhiteningMethod::default(),
            mix: MixConfig::default(),
            write_sidecars: false,
            threads: default_threads(),
            show_progress: true,
            dry_run: false,
        }
    }
}
