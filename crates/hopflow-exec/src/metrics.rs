//! Metrics/tracing hooks.
//!
//! Events go through `tracing`; the binary decides where they end up
//! (the CLI installs a `tracing-subscriber` fmt layer).

use crate::result::{RunResult, StepResult};

pub fn emit_span(event: &str, key_values: &[(&str, String)]) {
    let span = tracing::span!(tracing::Level::TRACE, "hopflow", event);
    let _enter = span.enter();
    for (k, v) in key_values {
        tracing::trace!(%event, %k, %v, "metric");
    }
}

/// One event per unit with its final counters.
pub fn emit_step_summary(step: &StepResult) {
    let c = step.counters();
    emit_span(
        "step_finished",
        &[
            ("step", step.step().to_string()),
            ("copy", step.copy().to_string()),
            ("outcome", format!("{:?}", step.outcome())),
            ("rows_read", c.rows_read.to_string()),
            ("rows_written", c.rows_written.to_string()),
            ("rows_input", c.rows_input.to_string()),
            ("rows_output", c.rows_output.to_string()),
            ("rows_rejected", c.rows_rejected.to_string()),
            ("errors", c.errors.to_string()),
        ],
    );
}

pub fn emit_run_summary(result: &RunResult) {
    for step in result.steps() {
        emit_step_summary(step);
    }
    let m = result.manifest();
    tracing::info!(
        run_id = %m.id,
        graph = %m.graph_name,
        status = ?result.status(),
        errors = result.errors(),
        duration_ms = m.duration_ms(),
        "run finished"
    );
}
