//! facesift-pipeline — Searching a folder for photos of one person.
//!
//! A [`MatchEvaluator`] decides whether a single photo contains the reference
//! face. The [`BatchScheduler`] fans evaluations out over a folder in
//! rate-limited batches and reports progress as generation-tagged
//! [`RunEvent`]s. The [`RunAggregator`] folds those events into a
//! [`RunState`], discarding anything from a superseded run. A
//! [`SearchSession`] ties it together behind a single supervisor task.

pub mod aggregator;
pub mod evaluator;
pub mod events;
pub mod scheduler;
pub mod session;

#[cfg(test)]
mod testing;

pub use aggregator::{RunAggregator, RunState, RunStatus};
pub use evaluator::{
    EvaluateError, MatchEvaluator, MatchOptions, MatchResult, DEFAULT_MAX_DISTANCE,
    PREVIEW_MAX_SIDE,
};
pub use events::{Generation, RunEvent, RunEventKind};
pub use scheduler::{
    BatchOptions, BatchScheduler, RunSummary, DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE,
};
pub use session::{SearchSession, SessionError, SessionHandle};
