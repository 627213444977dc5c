//! Progress events sent from a running search to its aggregator.

use crate::evaluator::MatchResult;
use std::fmt;
use std::sync::Arc;

/// Identifies one search run. Bumped whenever the reference changes or a
/// new search starts; anything tagged with an older value is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct RunEvent {
    pub generation: Generation,
    pub kind: RunEventKind,
}

#[derive(Debug, Clone)]
pub enum RunEventKind {
    /// A listing page added this many candidate images.
    Discovered(usize),
    /// No more listing pages; the total is final.
    EnumerationComplete,
    /// A candidate contained the reference face. Always precedes the
    /// matching `Processed` for the same file.
    Matched(Arc<MatchResult>),
    /// One candidate finished evaluation, whatever the outcome.
    Processed,
    Completed,
    Failed(String),
}

impl RunEvent {
    pub fn new(generation: Generation, kind: RunEventKind) -> Self {
        Self { generation, kind }
    }
}
