//! Replays JSON-lines events through a configured observer pipeline.
//!
//! Each input line is an object of the form
//! `{"type": "click", "detail": <any JSON value>}`. The `detail` value is
//! dispatched under `type` on an in-process [`Emitter`]. A root observer
//! subscribed to the configured types feeds the pipeline described in the
//! configuration file, and whatever the `print` sink receives is written to
//! the output, one compact JSON value per line.

pub mod builtins;
pub mod config;

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;
use strand_core::{assemble, EventSourceExt, ObserverError};
use strand_emitter::Emitter;
use thiserror::Error;

pub use config::{load_config, Config, ConfigError, LoggingConfig, PipelineConfig, SourceConfig};

/// Errors that can abort a replay.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid pipeline: {0}")]
    Pipeline(#[from] ObserverError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters reported after the input is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Lines read, including blank ones.
    pub lines: usize,
    /// Events dispatched to the emitter.
    pub dispatched: usize,
    /// Lines that were not valid events.
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct InputEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    detail: Value,
}

/// Runs the configured pipeline over every event in `input`.
///
/// # Errors
///
/// Returns `CliError::Pipeline` if a stage names an unknown callback, and
/// `CliError::Io` if reading the input or writing the output fails.
/// Malformed lines are skipped, not treated as errors.
pub fn run<R: BufRead, W: Write>(
    config: &Config,
    input: R,
    output: &mut W,
) -> Result<RunSummary, CliError> {
    let emitter = Rc::new(Emitter::<Value>::new());
    let printed = Rc::new(RefCell::new(Vec::new()));
    let registry = builtins::registry(Rc::clone(&printed));

    let root = emitter.on_with(&config.source.types, config.source.options());
    let tail = assemble(&root, &config.pipeline.stages, &registry)?;
    tracing::debug!(
        types = %root.event_types(),
        capture = root.capture(),
        stages = config.pipeline.stages.len(),
        "pipeline assembled"
    );

    let mut summary = RunSummary::default();
    for line in input.lines() {
        let line = line?;
        summary.lines += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<InputEvent>(&line) {
            Ok(event) => {
                emitter.dispatch(&event.event_type, &event.detail);
                summary.dispatched += 1;
            }
            Err(e) => {
                tracing::warn!(line = summary.lines, error = %e, "skipping malformed input line");
                summary.skipped += 1;
            }
        }

        let pending: Vec<String> = printed.borrow_mut().drain(..).collect();
        for value in pending {
            writeln!(output, "{value}")?;
        }
    }
    output.flush()?;

    tracing::debug!(
        connected = tail.is_connected(),
        lines = summary.lines,
        dispatched = summary.dispatched,
        skipped = summary.skipped,
        "input exhausted"
    );
    Ok(summary)
}
