//! automix CLI entry point

use automix::config::{Cli, Settings};
use automix::error::AutomixError;
use automix::pipeline;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Build settings from CLI
    let settings = match Settings::from_cli(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Validate inputs
    if let Err(e) = validate_inputs(&settings) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    // Run the pipeline
    match pipeline::run(&settings) {
        Ok(outcome) => {
            for failure in outcome.failures.iter().chain(outcome.excluded.iter()) {
                eprintln!("Skipped: {}", failure);
            }

            let Some(plan) = &outcome.plan else {
                eprintln!("Error: {}", AutomixError::EmptyInput);
                return ExitCode::FAILURE;
            };

            println!();
            println!(
                "Summary: {} tracks mixed, {} failed, {} too short ({} actions, {:.1}s)",
                outcome.tracks.len(),
                outcome.failures.len(),
                outcome.excluded.len(),
                plan.len(),
                plan.duration()
            );
            for (position, prepared) in outcome.tracks.iter().enumerate() {
                println!(
                    "  {:>2}. {} (gain {:.0}%)",
                    position + 1,
                    prepared.label(),
                    prepared.track.gain * 100.0
                );
            }
            if outcome.rendered.is_some() {
                println!("Wrote {}", settings.output.display());
            }
            if let Some(path) = &settings.plan_output {
                println!("Wrote {}", path.display());
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = if cli.quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn validate_inputs(settings: &Settings) -> Result<(), String> {
    // Missing sources are skipped like any other load failure, unless none exists
    let any_source = settings
        .sources
        .iter()
        .any(|s| automix::ingest::remote::is_remote(s) || std::path::Path::new(s).exists());
    if !any_source {
        return Err(format!(
            "None of the input paths exist: {}\n\n  Tip: Check the paths are correct and accessible.\n  Examples:\n    automix ~/Music/set --order --equalize\n    automix a.mp3 b.mp3 -o mix.wav",
            settings.sources.join(", ")
        ));
    }

    // Output parent directories must exist
    let outputs = std::iter::once(&settings.output).chain(settings.plan_output.iter());
    for output in outputs {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(format!(
                    "Output directory does not exist: {}\n\n  Example: mkdir -p {}",
                    parent.display(),
                    parent.display()
                ));
            }
        }
    }

    Ok(())
}
