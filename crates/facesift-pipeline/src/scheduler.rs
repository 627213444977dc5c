//! Batched, rate-limited fan-out of match evaluations over a folder.
//!
//! Files are pulled from the enumerator's page stream into batches of
//! `batch_size`. Each batch runs fully concurrently; the next one starts only
//! after the whole batch resolved and a fixed delay elapsed. Every outcome is
//! reported as a [`RunEvent`] tagged with the run's generation, so the
//! scheduler never touches run state itself.

use crate::evaluator::MatchEvaluator;
use crate::events::{Generation, RunEvent, RunEventKind};
use facesift_core::ReferenceFace;
use facesift_drive::{CandidateFile, EnumerateError, FolderEnumerator};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Files evaluated concurrently per batch. Clamped to at least 1.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

/// What a run did, for logging and callers that drive a run directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub processed: usize,
    pub matched: usize,
    pub errors: usize,
    /// Set when the run ended in failure.
    pub failure: Option<String>,
    /// Set when the event receiver went away mid-run.
    pub abandoned: bool,
}

#[derive(Clone)]
pub struct BatchScheduler {
    enumerator: FolderEnumerator,
    evaluator: Arc<MatchEvaluator>,
    options: BatchOptions,
}

/// Event sender bound to one generation.
struct Emitter {
    generation: Generation,
    tx: mpsc::Sender<RunEvent>,
}

impl Emitter {
    /// `false` once nobody is listening; the run should stop.
    async fn emit(&self, kind: RunEventKind) -> bool {
        self.tx
            .send(RunEvent::new(self.generation, kind))
            .await
            .is_ok()
    }
}

impl BatchScheduler {
    pub fn new(
        enumerator: FolderEnumerator,
        evaluator: Arc<MatchEvaluator>,
        options: BatchOptions,
    ) -> Self {
        Self {
            enumerator,
            evaluator,
            options: BatchOptions {
                batch_size: options.batch_size.max(1),
                ..options
            },
        }
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    pub async fn run(
        &self,
        generation: Generation,
        locator: &str,
        reference: Arc<ReferenceFace>,
        events: mpsc::Sender<RunEvent>,
    ) -> RunSummary {
        let emitter = Emitter {
            generation,
            tx: events,
        };
        let mut summary = RunSummary::default();

        let mut pages = match self.enumerator.pages(locator) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(%generation, error = %e, "cannot enumerate folder");
                let reason = e.to_string();
                summary.abandoned = !emitter.emit(RunEventKind::Failed(reason.clone())).await;
                summary.failure = Some(reason);
                return summary;
            }
        };

        let batch_size = self.options.batch_size;
        let mut pending: VecDeque<CandidateFile> = VecDeque::new();
        let mut listing_done = false;
        let mut listing_error: Option<EnumerateError> = None;

        tracing::info!(%generation, batch_size, delay_ms = self.options.batch_delay.as_millis() as u64, "run scheduled");

        loop {
            while !listing_done && pending.len() < batch_size {
                match pages.next().await {
                    Some(Ok(files)) => {
                        if !files.is_empty()
                            && !emitter.emit(RunEventKind::Discovered(files.len())).await
                        {
                            summary.abandoned = true;
                            return summary;
                        }
                        pending.extend(files);
                    }
                    Some(Err(e)) => {
                        listing_error = Some(e);
                        listing_done = true;
                    }
                    None => {
                        listing_done = true;
                        if !emitter.emit(RunEventKind::EnumerationComplete).await {
                            summary.abandoned = true;
                            return summary;
                        }
                    }
                }
            }

            if pending.is_empty() {
                break;
            }

            if summary.batches > 0 {
                tokio::time::sleep(self.options.batch_delay).await;
            }

            let take = pending.len().min(batch_size);
            let batch: Vec<CandidateFile> = pending.drain(..take).collect();
            summary.batches += 1;
            if !self.run_batch(summary.batches, batch, &reference, &emitter, &mut summary).await {
                summary.abandoned = true;
                return summary;
            }
        }

        let terminal = match listing_error {
            Some(e) => {
                let reason = e.to_string();
                summary.failure = Some(reason.clone());
                RunEventKind::Failed(reason)
            }
            None => RunEventKind::Completed,
        };
        summary.abandoned = !emitter.emit(terminal).await;

        tracing::info!(
            %generation,
            batches = summary.batches,
            processed = summary.processed,
            matched = summary.matched,
            errors = summary.errors,
            failed = summary.failure.is_some(),
            "run finished"
        );
        summary
    }

    /// Returns `false` if the receiver is gone.
    async fn run_batch(
        &self,
        number: usize,
        batch: Vec<CandidateFile>,
        reference: &ReferenceFace,
        emitter: &Emitter,
        summary: &mut RunSummary,
    ) -> bool {
        let size = batch.len();
        tracing::debug!(generation = %emitter.generation, batch = number, size, "batch started");

        let mut outcomes = stream::iter(batch)
            .map(|file| async move {
                let id = file.id.clone();
                let name = file.name.clone();
                let outcome = self.evaluator.evaluate(file, reference).await;
                (id, name, outcome)
            })
            .buffer_unordered(size);

        while let Some((id, name, outcome)) = outcomes.next().await {
            match outcome {
                Ok(Some(result)) => {
                    summary.matched += 1;
                    if !emitter.emit(RunEventKind::Matched(Arc::new(result))).await {
                        return false;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    summary.errors += 1;
                    tracing::warn!(file_id = %id, file = %name, error = %e, "evaluation failed");
                }
            }
            summary.processed += 1;
            if !emitter.emit(RunEventKind::Processed).await {
                return false;
            }
        }

        tracing::debug!(generation = %emitter.generation, batch = number, "batch finished");
        true
    }
}
