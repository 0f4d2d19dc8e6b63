use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use piece_contracts::analysis::{AnalysisState, Phase, SearchResult, TransitionError};
use piece_contracts::events::{EventWriter, SessionEvent};
use piece_contracts::image::EncodedImage;

use crate::client::{AnalysisClient, AnalysisError};

struct Completion {
    generation: u64,
    outcome: Result<SearchResult, AnalysisError>,
}

/// What happened to one finished analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Applied { generation: u64, phase: Phase },
    /// The request was overtaken by a reset and its outcome dropped.
    Discarded { generation: u64 },
}

/// Owns the [`AnalysisState`] for one session and drives it from UI events
/// and analysis outcomes.
///
/// Analyses run on their own thread and report back over a channel. Outcomes
/// are only applied from [`poll`](Self::poll) or [`wait`](Self::wait), so the
/// thread that owns the controller is the only writer of the state. Every
/// request carries the generation current when it was issued; `reset` moves
/// the generation on, which makes any outcome still in flight stale.
pub struct SessionController {
    client: Arc<dyn AnalysisClient>,
    state: AnalysisState,
    generation: u64,
    completions_tx: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
    events: Option<EventWriter>,
}

impl SessionController {
    pub fn new(client: Arc<dyn AnalysisClient>) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel();
        Self {
            client,
            state: AnalysisState::idle(),
            generation: 0,
            completions_tx,
            completions_rx,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self.emit(SessionEvent::SessionStarted {
            client: self.client.name().to_string(),
        });
        self
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts an analysis of `image` and returns its generation.
    ///
    /// Only accepted from idle; anywhere else the state is left as it was.
    pub fn select_image(&mut self, image: EncodedImage) -> Result<u64, TransitionError> {
        let image = Arc::new(image);
        let next = self.state.select_image(Arc::clone(&image))?;
        self.generation += 1;
        let generation = self.generation;
        self.state = next;
        self.emit(SessionEvent::ImageSelected {
            generation,
            media_type: image.declared_media_type().map(str::to_string),
            payload_chars: image.payload().len(),
        });
        self.dispatch(generation, image);
        Ok(generation)
    }

    pub fn reset(&mut self) {
        let from = self.state.phase();
        self.generation += 1;
        self.state = self.state.reset();
        self.emit(SessionEvent::SessionReset {
            from,
            generation: self.generation,
        });
    }

    /// Applies every outcome that has already arrived, without blocking.
    pub fn poll(&mut self) -> Vec<Settled> {
        let mut settled = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            settled.push(self.apply(completion));
        }
        settled
    }

    /// Waits up to `timeout` for the next outcome and applies it.
    pub fn wait(&mut self, timeout: Duration) -> Option<Settled> {
        let completion = self.completions_rx.recv_timeout(timeout).ok()?;
        Some(self.apply(completion))
    }

    fn dispatch(&mut self, generation: u64, image: Arc<EncodedImage>) {
        let client = Arc::clone(&self.client);
        let tx = self.completions_tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("piece-analysis-{generation}"))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| client.analyze(&image)))
                    .unwrap_or_else(|_| {
                        tracing::error!(
                            generation,
                            client = client.name(),
                            "analysis client panicked"
                        );
                        Err(AnalysisError)
                    });
                let _ = tx.send(Completion {
                    generation,
                    outcome,
                });
            });
        if let Err(err) = spawned {
            tracing::error!(generation, error = %err, "failed to spawn analysis thread");
            self.apply(Completion {
                generation,
                outcome: Err(AnalysisError),
            });
        }
    }

    fn apply(&mut self, completion: Completion) -> Settled {
        let Completion {
            generation,
            outcome,
        } = completion;
        if generation != self.generation || self.state.phase() != Phase::Analyzing {
            return self.discard(generation);
        }

        let (next, event) = match outcome {
            Ok(result) => {
                let event = SessionEvent::AnalysisCompleted {
                    generation,
                    citations: result.citations().len(),
                    links: result.found_online().links().len(),
                };
                (self.state.complete(result), event)
            }
            Err(err) => (
                self.state.fail(err.message()),
                SessionEvent::AnalysisFailed {
                    generation,
                    message: err.message().to_string(),
                },
            ),
        };
        match next {
            Ok(state) => {
                self.state = state;
                self.emit(event);
                Settled::Applied {
                    generation,
                    phase: self.state.phase(),
                }
            }
            Err(_) => self.discard(generation),
        }
    }

    fn discard(&self, generation: u64) -> Settled {
        tracing::warn!(
            generation,
            current = self.generation,
            "dropping outcome of a superseded analysis"
        );
        self.emit(SessionEvent::AnalysisDiscarded {
            generation,
            current_generation: self.generation,
        });
        Settled::Discarded { generation }
    }

    fn emit(&self, event: SessionEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let kind = event.kind();
        if let Err(err) = events.record(event) {
            tracing::warn!(event = kind, error = %err, "failed writing session event");
        }
    }
}
