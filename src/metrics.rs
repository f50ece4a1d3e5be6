//! Metrics for the cleaning step.
//!
//! Everything goes through the `metrics` facade. Runs are short-lived, so
//! instead of an HTTP listener an in-process Prometheus recorder can be
//! installed and rendered to a textfile once the run ends.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::run_state::RunState;

pub const ROWS_INPUT: &str = "basic_cleaning_rows_input_total";
pub const ROWS_RETAINED: &str = "basic_cleaning_rows_retained_total";
pub const DATES_COERCED: &str = "basic_cleaning_dates_coerced_total";
pub const PUBLISHES: &str = "basic_cleaning_publishes_total";
pub const RUNS_FAILED: &str = "basic_cleaning_runs_failed_total";
pub const STAGE_DURATION: &str = "basic_cleaning_stage_duration_seconds";

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the in-process recorder. Idempotent; returns false if another
/// recorder already owns the global slot.
pub fn install_recorder() -> bool {
    if HANDLE.get().is_some() {
        return true;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            true
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            false
        }
    }
}

/// Render current metrics in Prometheus text format into `path`.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let Some(handle) = HANDLE.get() else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let rendered = handle.render();
    fs::write(path, &rendered)?;
    info!(path = %path.display(), bytes = rendered.len(), "metrics written");
    Ok(())
}

pub struct CleaningMetrics;

impl CleaningMetrics {
    pub fn record_input_rows(rows: usize) {
        ::metrics::counter!(ROWS_INPUT).increment(rows as u64);
    }

    /// Rows still present after `stage`.
    pub fn record_retained(stage: RunState, rows: usize) {
        ::metrics::counter!(ROWS_RETAINED, "stage" => stage.as_str()).increment(rows as u64);
    }

    pub fn record_dates_coerced(count: usize) {
        ::metrics::counter!(DATES_COERCED).increment(count as u64);
    }

    pub fn record_publish(deduplicated: bool) {
        let outcome = if deduplicated { "deduplicated" } else { "new_version" };
        ::metrics::counter!(PUBLISHES, "outcome" => outcome).increment(1);
    }

    pub fn record_failure(stage: RunState, kind: ErrorKind) {
        ::metrics::counter!(
            RUNS_FAILED,
            "stage" => stage.as_str(),
            "kind" => format!("{:?}", kind).to_lowercase()
        )
        .increment(1);
    }
}

/// Records how long a stage took when dropped.
pub struct TimingGuard {
    start: Instant,
    stage: RunState,
}

impl TimingGuard {
    pub fn new(stage: RunState) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        ::metrics::histogram!(STAGE_DURATION, "stage" => self.stage.as_str()).record(duration);
    }
}

pub fn time_stage(stage: RunState) -> TimingGuard {
    TimingGuard::new(stage)
}
