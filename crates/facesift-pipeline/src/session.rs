//! Search session supervisor.
//!
//! One task owns the [`RunAggregator`] and the active reference. Callers talk
//! to it through a [`SessionHandle`]; scheduler runs and background reference
//! extractions report back over channels. Every mutation happens inside the
//! supervisor loop, and every accepted mutation is published as a
//! [`RunState`] snapshot on a watch channel.

use crate::aggregator::{RunAggregator, RunState};
use crate::events::{Generation, RunEvent};
use crate::scheduler::BatchScheduler;
use facesift_core::{DescriptorExtractor, ExtractError, ReferenceFace};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

const COMMAND_CAPACITY: usize = 16;
const EVENT_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no reference face set")]
    NoReference,
    #[error("superseded by a newer request")]
    Superseded,
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("search session closed")]
    Closed,
}

type ReferenceReply = oneshot::Sender<Result<Option<Arc<ReferenceFace>>, SessionError>>;

enum Command {
    SetReference {
        bytes: Vec<u8>,
        source: String,
        reply: ReferenceReply,
    },
    ClearReference {
        reply: oneshot::Sender<()>,
    },
    Search {
        locator: String,
        reply: oneshot::Sender<Result<Generation, SessionError>>,
    },
}

/// Background extraction result, tagged with the reference epoch it was
/// started under.
struct Extracted {
    epoch: u64,
    result: Result<Option<ReferenceFace>, ExtractError>,
    reply: ReferenceReply,
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<RunState>,
}

impl SessionHandle {
    /// Replace the reference face with the best face in `bytes`.
    ///
    /// The previous reference and any running search are dropped before
    /// extraction starts. `Ok(None)` means the image holds no face.
    pub async fn set_reference(
        &self,
        bytes: Vec<u8>,
        source: impl Into<String>,
    ) -> Result<Option<Arc<ReferenceFace>>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetReference {
            bytes,
            source: source.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn clear_reference(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ClearReference { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Start searching `locator` with the active reference.
    pub async fn search(&self, locator: impl Into<String>) -> Result<Generation, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Search {
            locator: locator.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    pub fn current_state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// Wait for run `generation` to complete or fail.
    ///
    /// Errors with `Superseded` if a newer generation replaces it first.
    pub async fn wait_until_finished(&self, generation: Generation) -> Result<RunState, SessionError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|s| s.generation != generation || s.is_finished())
            .await
            .map_err(|_| SessionError::Closed)?
            .clone();
        if state.generation != generation {
            return Err(SessionError::Superseded);
        }
        Ok(state)
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

pub struct SearchSession {
    aggregator: RunAggregator,
    extractor: DescriptorExtractor,
    scheduler: BatchScheduler,
    reference: Option<Arc<ReferenceFace>>,
    reference_epoch: u64,
    events_tx: mpsc::Sender<RunEvent>,
    extracted_tx: mpsc::Sender<Extracted>,
    state_tx: watch::Sender<RunState>,
}

impl SearchSession {
    /// Start the supervisor task. It exits once every handle is dropped.
    pub fn spawn(extractor: DescriptorExtractor, scheduler: BatchScheduler) -> SessionHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let (extracted_tx, extracted_rx) = mpsc::channel(COMMAND_CAPACITY);

        let aggregator = RunAggregator::new();
        let (state_tx, state_rx) = watch::channel(aggregator.current_state().clone());

        let session = Self {
            aggregator,
            extractor,
            scheduler,
            reference: None,
            reference_epoch: 0,
            events_tx,
            extracted_tx,
            state_tx,
        };
        tokio::spawn(session.run(commands_rx, events_rx, extracted_rx));

        SessionHandle {
            commands: commands_tx,
            state: state_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<RunEvent>,
        mut extracted: mpsc::Receiver<Extracted>,
    ) {
        tracing::debug!("search session started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => {
                    if self.aggregator.apply_event(event) {
                        self.publish();
                    }
                }
                Some(done) = extracted.recv() => self.handle_extracted(done),
            }
        }
        tracing::debug!("search session closed");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetReference {
                bytes,
                source,
                reply,
            } => {
                self.drop_reference();
                let epoch = self.reference_epoch;
                tracing::info!(%source, bytes = bytes.len(), epoch, "extracting reference");

                let extractor = self.extractor.clone();
                let tx = self.extracted_tx.clone();
                tokio::spawn(async move {
                    let result = extractor.extract_reference(bytes, &source).await;
                    // Only fails if the session is gone, and then nobody cares.
                    let _ = tx.send(Extracted { epoch, result, reply }).await;
                });
            }
            Command::ClearReference { reply } => {
                self.drop_reference();
                tracing::info!("reference cleared");
                let _ = reply.send(());
            }
            Command::Search { locator, reply } => {
                let _ = reply.send(self.start_search(locator));
            }
        }
    }

    fn handle_extracted(&mut self, done: Extracted) {
        let Extracted {
            epoch,
            result,
            reply,
        } = done;

        if epoch != self.reference_epoch {
            tracing::debug!(epoch, current = self.reference_epoch, "stale reference extraction dropped");
            let _ = reply.send(Err(SessionError::Superseded));
            return;
        }

        let outcome = match result {
            Ok(Some(face)) => {
                let face = Arc::new(face);
                self.reference = Some(Arc::clone(&face));
                Ok(Some(face))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "reference extraction failed");
                Err(SessionError::Extraction(e))
            }
        };
        let _ = reply.send(outcome);
    }

    fn start_search(&mut self, locator: String) -> Result<Generation, SessionError> {
        let reference = self.reference.clone().ok_or(SessionError::NoReference)?;
        let generation = self
            .aggregator
            .start_run(Some(Arc::clone(&reference)))
            .ok_or(SessionError::NoReference)?;
        self.publish();

        let scheduler = self.scheduler.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            scheduler.run(generation, &locator, reference, events).await;
        });
        Ok(generation)
    }

    /// Forget the reference, abandon the current run, and make any pending
    /// extraction stale.
    fn drop_reference(&mut self) {
        self.reference = None;
        self.reference_epoch += 1;
        self.aggregator.invalidate();
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.aggregator.current_state().clone());
    }
}
