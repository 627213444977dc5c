//! Run state: the single place results and progress counters live.
//!
//! Only the owner of a [`RunAggregator`] mutates it. Workers report through
//! [`RunEvent`]s, which are applied here only when their generation is the
//! current one.

use crate::evaluator::MatchResult;
use crate::events::{Generation, RunEvent, RunEventKind};
use facesift_core::ReferenceFace;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed(String),
}

/// Snapshot of the current run.
#[derive(Debug, Clone)]
pub struct RunState {
    pub generation: Generation,
    pub status: RunStatus,
    /// Reference the current run compares against.
    pub reference: Option<Arc<ReferenceFace>>,
    /// Matches in the order they were found.
    pub results: Vec<Arc<MatchResult>>,
    pub processed_count: usize,
    /// Candidates discovered so far.
    pub total_count: usize,
    /// `true` once enumeration finished and `total_count` will not grow.
    pub total_final: bool,
}

impl RunState {
    fn idle(generation: Generation) -> Self {
        Self {
            generation,
            status: RunStatus::Idle,
            reference: None,
            results: Vec::new(),
            processed_count: 0,
            total_count: 0,
            total_final: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed(_))
    }
}

pub struct RunAggregator {
    state: RunState,
}

impl Default for RunAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl RunAggregator {
    pub fn new() -> Self {
        Self {
            state: RunState::idle(Generation::default()),
        }
    }

    pub fn current_state(&self) -> &RunState {
        &self.state
    }

    /// Start a fresh run. Does nothing without a reference.
    pub fn start_run(&mut self, reference: Option<Arc<ReferenceFace>>) -> Option<Generation> {
        let Some(reference) = reference else {
            tracing::debug!("search requested without a reference; ignored");
            return None;
        };

        let generation = self.state.generation.next();
        self.state = RunState::idle(generation);
        self.state.status = RunStatus::Running;
        self.state.reference = Some(reference);
        tracing::info!(%generation, "run started");
        Some(generation)
    }

    /// Drop the current run and its results; in-flight events become stale.
    pub fn invalidate(&mut self) -> Generation {
        let generation = self.state.generation.next();
        if self.state.is_running() {
            tracing::info!(
                superseded = %self.state.generation,
                processed = self.state.processed_count,
                "run abandoned"
            );
        }
        self.state = RunState::idle(generation);
        generation
    }

    /// Returns `true` if the event changed the state.
    pub fn apply_event(&mut self, event: RunEvent) -> bool {
        if event.generation != self.state.generation {
            tracing::debug!(
                event_generation = %event.generation,
                current = %self.state.generation,
                "stale event dropped"
            );
            return false;
        }
        if !self.state.is_running() {
            tracing::debug!(generation = %event.generation, "event after run ended dropped");
            return false;
        }

        let state = &mut self.state;
        match event.kind {
            RunEventKind::Discovered(count) => {
                if state.total_final {
                    tracing::warn!(count, "discovery after enumeration completed; ignored");
                    return false;
                }
                state.total_count += count;
            }
            RunEventKind::EnumerationComplete => {
                state.total_final = true;
            }
            RunEventKind::Matched(result) => {
                state.results.push(result);
            }
            RunEventKind::Processed => {
                if state.processed_count >= state.total_count {
                    tracing::warn!(
                        processed = state.processed_count,
                        total = state.total_count,
                        "processed count would exceed total; ignored"
                    );
                    return false;
                }
                state.processed_count += 1;
            }
            RunEventKind::Completed => {
                state.status = RunStatus::Completed;
                tracing::info!(
                    generation = %state.generation,
                    processed = state.processed_count,
                    matches = state.results.len(),
                    "run completed"
                );
            }
            RunEventKind::Failed(reason) => {
                tracing::warn!(generation = %state.generation, %reason, "run failed");
                state.status = RunStatus::Failed(reason);
            }
        }
        true
    }
}
