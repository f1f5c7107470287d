//! CLI argument parsing and configuration

use clap::Parser;
use std::path::PathBuf;

/// automix - Automatic DJ mixing
///
/// Orders songs by timbre similarity, equalizes their loudness and joins
/// them with beat-matched crossfades into one continuous WAV file.
#[derive(Parser, Debug)]
#[command(name = "automix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Audio files, directories or http(s) URLs, in input order
    #[arg(value_name = "SOURCE", required = true)]
    pub sources: Vec<String>,

    /// Seconds of uninterrupted playback per track
    #[arg(short = 'i', long, value_name = "SECONDS", default_value_t = 8.0)]
    pub inter: f64,

    /// Seconds of crossfade between adjacent tracks
    #[arg(short = 't', long, value_name = "SECONDS", default_value_t = 8.0)]
    pub transition: f64,

    /// Reorder tracks by timbre similarity (otherwise input order is kept)
    #[arg(long, default_value = "false")]
    pub order: bool,

    /// Equalize loudness across tracks
    #[arg(long, default_value = "false")]
    pub equalize: bool,

    /// Output WAV file
    #[arg(short, long, value_name = "FILE", default_value = "automix.wav")]
    pub output: PathBuf,

    /// Also write the mix plan as JSON
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Resample features at a fixed rate in Hz instead of per beat
    #[arg(long, value_name = "HZ")]
    pub feature_rate: Option<f64>,

    /// Store analyses of local files as <file>.analysis.json sidecars
    #[arg(long, default_value = "false")]
    pub write_sidecars: bool,

    /// Number of worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bars)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,

    /// Dry run - plan the mix without rendering audio
    #[arg(long, default_value = "false")]
    pub dry_run: bool,
}

impl Cli {
    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["automix", "a.mp3", "b.mp3"]).unwrap();
        assert_eq!(cli.sources, vec!["a.mp3", "b.mp3"]);
        assert_eq!(cli.inter, 8.0);
        assert_eq!(cli.transition, 8.0);
        assert!(!cli.order);
        assert!(!cli.equalize);
        assert_eq!(cli.output, PathBuf::from("automix.wav"));
        assert!(cli.plan.is_none());
        assert_eq!(cli.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "automix", "--order", "--equalize", "-i", "16", "-t", "4", "--plan", "plan.json", "-vv",
            "--dry-run", "songs/",
        ])
        .unwrap();
        assert!(cli.order && cli.equalize && cli.dry_run);
        assert_eq!(cli.inter, 16.0);
        assert_eq!(cli.transition, 4.0);
        assert_eq!(cli.plan, Some(PathBuf::from("plan.json")));
        assert_eq!(cli.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_sources_required() {
        assert!(Cli::try_parse_from(["automix"]).is_err());
    }
}
