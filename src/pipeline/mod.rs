//! Pipeline driver

pub mod orchestrator;

pub use orchestrator::{configure_thread_pool, run, run_stages, run_with_events, MixOutcome};
