//! Pipeline orchestration
//!
//! Coordinates ingestion, feature processing, filtering, ordering,
//! equalization, planning and rendering. Only ingestion and feature
//! processing run in parallel; everything after runs on the committed order.

use crate::config::Settings;
use crate::error::{AutomixError, Result};
use crate::export;
use crate::features::{prepare_tracks, PreparedTrack};
use crate::ingest::{self, AudioTrackLoader, ProgressEvent, ProgressReporter, TrackLoader};
use crate::mix::{filter_valid, keep_order, order_tracks, plan_transitions, MixPlan, MixSequence};
use crate::render::{RenderSummary, Renderer, WavRenderer};
use crossbeam_channel::Sender;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{debug, info};

/// Share of the progress range covered by ingestion
const INGEST_PROGRESS_SPAN: f64 = 0.9;

/// Everything a run produced
#[derive(Debug, Default)]
pub struct MixOutcome {
    /// The plan, or `None` when no track survived
    pub plan: Option<MixPlan>,
    /// Tracks in playback order with their final gains
    pub tracks: Vec<PreparedTrack>,
    /// Sources that could not be loaded or featurized
    pub failures: Vec<AutomixError>,
    /// Tracks too short to hold a transition
    pub excluded: Vec<AutomixError>,
    /// Set when audio was rendered
    pub rendered: Option<RenderSummary>,
}

impl MixOutcome {
    /// True when nothing was left to mix
    pub fn is_empty(&self) -> bool {
        self.plan.is_none()
    }
}

/// Run the full mixing pipeline
pub fn run(settings: &Settings) -> Result<MixOutcome> {
    run_with_events(settings, None)
}

/// Run the pipeline, also sending progress events to `events`
pub fn run_with_events(settings: &Settings, events: Option<Sender<ProgressEvent>>) -> Result<MixOutcome> {
    configure_thread_pool(settings.threads)?;

    let loader = AudioTrackLoader::new()
        .keep_audio(!settings.dry_run)
        .write_sidecars(settings.write_sidecars);
    let renderer = WavRenderer::new();

    run_stages(settings, &loader, &renderer, events)
}

/// Run every stage with the given collaborators
pub fn run_stages(
    settings: &Settings,
    loader: &dyn TrackLoader,
    renderer: &dyn Renderer,
    events: Option<Sender<ProgressEvent>>,
) -> Result<MixOutcome> {
    let pipeline_start = Instant::now();

    // Phase 1: Ingestion
    let ingest_start = Instant::now();
    let sources = ingest::expand_sources(&settings.sources);
    let progress = progress_reporter(sources.len(), settings.show_progress, events);
    let report = ingest::ingest(&sources, loader, &progress);
    info!(
        "Loaded {} of {} sources in {:.2}s",
        report.tracks.len(),
        sources.len(),
        ingest_start.elapsed().as_secs_f64()
    );

    let mut outcome = MixOutcome {
        failures: report.failures,
        ..MixOutcome::default()
    };

    // Phase 2: Features
    let features_start = Instant::now();
    let (prepared, feature_failures) = prepare_tracks(report.tracks, settings.rate, settings.whitening);
    outcome.failures.extend(feature_failures);
    info!(
        "Prepared features for {} tracks in {:.2}s",
        prepared.len(),
        features_start.elapsed().as_secs_f64()
    );

    // Phase 3: Validity, order and loudness
    let mut validated = filter_valid(prepared, &settings.spec);
    outcome.excluded = std::mem::take(&mut validated.rejected);
    if validated.is_empty() {
        info!("No tracks left to mix");
        progress.finish();
        return Ok(outcome);
    }

    let ordered = if settings.order {
        order_tracks(validated)
    } else {
        keep_order(validated)
    };

    let committed = if settings.equalize {
        MixSequence::equalized(ordered, settings.mix.max_boost_db)
    } else {
        MixSequence::unequalized(ordered)
    };
    let sequence = match committed {
        Ok(sequence) => sequence,
        Err(AutomixError::EmptyInput) => {
            info!("No tracks left to mix");
            progress.finish();
            return Ok(outcome);
        }
        Err(e) => return Err(e),
    };

    // Phase 4: Planning
    let plan = plan_transitions(&sequence, &settings.spec, &settings.mix);
    info!(
        "Planned {} actions over {} tracks ({:.1}s)",
        plan.len(),
        sequence.len(),
        plan.duration()
    );

    // Phase 5: Output
    if let Some(path) = &settings.plan_output {
        export::write_plan_json(&plan, sequence.tracks(), path)?;
    }

    if settings.dry_run {
        debug!("Dry run, skipping render");
    } else {
        let render_start = Instant::now();
        debug!("Rendering with the {} renderer", renderer.name());
        outcome.rendered = Some(renderer.render(&plan, &sequence, &settings.output)?);
        info!("Render completed in {:.2}s", render_start.elapsed().as_secs_f64());
    }

    progress.finish();
    info!(
        "Total pipeline time: {:.2}s",
        pipeline_start.elapsed().as_secs_f64()
    );

    outcome.plan = Some(plan);
    outcome.tracks = sequence.into_tracks();
    Ok(outcome)
}

fn progress_reporter(total: usize, show_progress: bool, events: Option<Sender<ProgressEvent>>) -> ProgressReporter {
    let mut reporter = ProgressReporter::new(total, INGEST_PROGRESS_SPAN);
    if let Some(sender) = events {
        reporter = reporter.with_sender(sender);
    }
    if show_progress {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        reporter = reporter.with_bar(pb);
    }
    reporter
}

/// Configure the Rayon thread pool
pub fn configure_thread_pool(num_threads: usize) -> Result<()> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        Ok(()) => {
            debug!("Configured thread pool with {} threads", num_threads);
        }
        Err(e) => {
            // If the pool is already initialized (e.g., in tests), that's OK
            if e.to_string().contains("already been initialized") {
                debug!("Thread pool already initialized, using existing pool");
            } else {
                return Err(AutomixError::ConfigError(format!(
                    "Failed to configure thread pool: {}",
                    e
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::synthetic_track;
    use crate::ingest::Source;
    use crate::mix::ActionKind;
    use crate::types::Track;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves synthetic tracks by source name
    struct MapLoader {
        tracks: HashMap<String, Track>,
    }

    impl MapLoader {
        fn new(tracks: Vec<Track>) -> Self {
            Self {
                tracks: tracks.into_iter().map(|t| (t.source.clone(), t)).collect(),
            }
        }
    }

    impl TrackLoader for MapLoader {
        fn load(&self, source: &Source) -> Result<Track> {
            let id = source.id();
            self.tracks.get(&id).cloned().ok_or_else(|| AutomixError::LoadFailure {
                source_id: id,
                reason: "unknown source".into(),
            })
        }

        fn name(&self) -> &'static str {
            "map"
        }
    }

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl Renderer for CountingRenderer {
        fn render(&self, plan: &MixPlan, _sequence: &MixSequence, _output: &Path) -> Result<RenderSummary> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RenderSummary {
                frames: 0,
                seconds: plan.duration(),
            })
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn settings(sources: &[&str]) -> Settings {
        Settings {
            sources: sources.iter().map(|s| s.to_string()).collect(),
            show_progress: false,
            ..Settings::default()
        }
    }

    fn track(name: &str, beats: usize, loudness: f64, tone: f64) -> Track {
        synthetic_track(name, beats, 0.5, loudness, move |i| {
            vec![tone, (i % 4) as f64, tone * 0.5, ((i / 4) % 2) as f64]
        })
    }

    #[test]
    fn test_full_run_plans_and_renders() {
        let loader = MapLoader::new(vec![track("a", 64, -10.0, 1.0), track("b", 64, -14.0, 5.0)]);
        let renderer = CountingRenderer::default();
        let mut settings = settings(&["a.wav", "b.wav"]);
        settings.equalize = true;

        let outcome = run_stages(&settings, &loader, &renderer, None).unwrap();

        let plan = outcome.plan.expect("plan");
        assert_eq!(
            plan.kinds(),
            vec![
                ActionKind::FadeIn,
                ActionKind::Playback,
                ActionKind::Crossmatch,
                ActionKind::Playback,
                ActionKind::FadeOut
            ]
        );
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.tracks.len(), 2);
        assert!(outcome.tracks.iter().any(|p| (p.track.gain - 1.0).abs() > 1e-9));
    }

    #[test]
    fn test_short_and_missing_tracks_are_reported() {
        let loader = MapLoader::new(vec![track("a", 64, -10.0, 1.0), track("short", 8, -10.0, 2.0)]);
        let renderer = CountingRenderer::default();
        let mut settings = settings(&["a.wav", "short.wav", "gone.wav"]);
        settings.dry_run = true;

        let outcome = run_stages(&settings, &loader, &renderer, None).unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(outcome.tracks.len(), 1);
        assert_eq!(outcome.plan.map(|p| p.len()), Some(3));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        assert!(outcome.rendered.is_none());
    }

    #[test]
    fn test_no_survivors_gives_empty_outcome() {
        let loader = MapLoader::new(vec![track("short", 8, -10.0, 1.0)]);
        let renderer = CountingRenderer::default();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut settings = settings(&["short.wav"]);
        settings.order = true;
        settings.equalize = true;

        let outcome = run_stages(&settings, &loader, &renderer, Some(tx)).unwrap();

        assert!(outcome.is_empty());
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        assert_eq!(events.last().map(|e| e.fraction), Some(1.0));
    }

    #[test]
    fn test_order_flag_reorders() {
        let loader = MapLoader::new(vec![
            track("a", 64, -10.0, 0.0),
            track("far", 64, -10.0, 10.0),
            track("near", 64, -10.0, 1.0),
        ]);
        let renderer = CountingRenderer::default();
        let mut settings = settings(&["a.wav", "far.wav", "near.wav"]);
        settings.order = true;

        let outcome = run_stages(&settings, &loader, &renderer, None).unwrap();
        let labels: Vec<_> = outcome.tracks.iter().map(|p| p.label().to_string()).collect();
        assert_eq!(labels, vec!["a", "near", "far"]);
    }
}
