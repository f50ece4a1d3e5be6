//! Lifecycle of a single cleaning run.
//!
//! `Idle → Fetching → Validating → PriceFiltering → DateNormalizing →
//! GeoFiltering → Packaging → Publishing → Done`, with `Failed` reachable from
//! any non-terminal state.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::error::{CleaningError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    Validating,
    PriceFiltering,
    DateNormalizing,
    GeoFiltering,
    Packaging,
    Publishing,
    Done,
    Failed,
}

impl RunState {
    /// The state that follows on success, if any.
    pub fn next(self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::Fetching),
            RunState::Fetching => Some(RunState::Validating),
            RunState::Validating => Some(RunState::PriceFiltering),
            RunState::PriceFiltering => Some(RunState::DateNormalizing),
            RunState::DateNormalizing => Some(RunState::GeoFiltering),
            RunState::GeoFiltering => Some(RunState::Packaging),
            RunState::Packaging => Some(RunState::Publishing),
            RunState::Publishing => Some(RunState::Done),
            RunState::Done | RunState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    pub fn can_transition_to(self, to: RunState) -> bool {
        if to == RunState::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Validating => "validating",
            RunState::PriceFiltering => "price_filtering",
            RunState::DateNormalizing => "date_normalizing",
            RunState::GeoFiltering => "geo_filtering",
            RunState::Packaging => "packaging",
            RunState::Publishing => "publishing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current state and every state visited.
#[derive(Debug, Clone)]
pub struct RunTracker {
    state: RunState,
    history: Vec<RunState>,
    failed_in: Option<RunState>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            history: vec![RunState::Idle],
            failed_in: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// State the run was in when it failed.
    pub fn failed_in(&self) -> Option<RunState> {
        self.failed_in
    }

    pub fn advance(&mut self, to: RunState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(CleaningError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(from = %self.state, to = %to, "run state transition");
        if to == RunState::Failed {
            self.failed_in = Some(self.state);
        }
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.failed_in = Some(self.state);
            self.state = RunState::Failed;
            self.history.push(RunState::Failed);
        }
    }
}
