use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::artifact::ArtifactId;
use crate::run_state::RunState;

/// Explicit handle for one tracked run. Opened by the registry at the start of
/// a run and handed back to it, by value, when the run ends.
#[derive(Debug)]
pub struct RunSession {
    run_id: Uuid,
    job_type: String,
    config: serde_json::Value,
    started_at: DateTime<Utc>,
    used: Vec<ArtifactId>,
}

impl RunSession {
    pub fn new(job_type: &str, config: serde_json::Value) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job_type: job_type.to_string(),
            config,
            started_at: Utc::now(),
            used: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn config(&self) -> &serde_json::Value {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Artifacts consumed so far; these become the lineage of anything published.
    pub fn used_artifacts(&self) -> &[ArtifactId] {
        &self.used
    }

    pub fn record_use(&mut self, id: ArtifactId) {
        if !self.used.contains(&id) {
            self.used.push(id);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Finished,
    Failed { stage: RunState, message: String },
}

impl RunOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            RunOutcome::Finished => "finished",
            RunOutcome::Failed { .. } => "failed",
        }
    }
}
