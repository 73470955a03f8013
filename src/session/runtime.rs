use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::recommend::{RecommendationError, Recommender};

use super::state::{Controller, Submission, ViewState};

/// Capacity of the input channel between the UI and the session loop
const INPUT_CHANNEL_SIZE: usize = 32;

/// Input from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Submit(String),
}

/// Outcome of a spawned recommendation call.
struct Completion {
    cycle: u64,
    outcome: Result<BTreeSet<i64>, RecommendationError>,
}

/// What the presentation layer holds: an input sender and a state receiver.
#[derive(Clone)]
pub struct SessionHandle {
    pub input: mpsc::Sender<SessionInput>,
    pub state: watch::Receiver<ViewState>,
}

impl SessionHandle {
    pub async fn submit(&self, query: impl Into<String>) -> Result<()> {
        self.input
            .send(SessionInput::Submit(query.into()))
            .await
            .map_err(|_| anyhow::anyhow!("Session loop has stopped"))
    }
}

/// The session loop: owns the controller.
///
/// Receives submits from the UI, runs at most one recommendation call at
/// a time, and publishes every state change on a watch channel.
pub struct SessionRuntime {
    controller: Controller,
    recommender: Arc<dyn Recommender>,
    input_rx: mpsc::Receiver<SessionInput>,
    done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
    state_tx: watch::Sender<ViewState>,
}

impl SessionRuntime {
    pub fn new(catalog: Arc<Catalog>, recommender: Arc<dyn Recommender>) -> (Self, SessionHandle) {
        let controller = Controller::new(catalog);
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(controller.state().clone());

        let runtime = Self {
            controller,
            recommender,
            input_rx,
            done_tx,
            done_rx,
            state_tx,
        };
        let handle = SessionHandle {
            input: input_tx,
            state: state_rx,
        };
        (runtime, handle)
    }

    /// Main session loop. Returns once every `SessionHandle` is dropped
    /// and the request in flight, if any, has completed.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Session started: {} products in catalog",
            self.controller.catalog().len()
        );

        let mut input_open = true;
        loop {
            if !input_open && !self.controller.is_busy() {
                break;
            }

            // Inputs first: a submit queued before a completion is judged
            // against the request that was in flight when it arrived.
            tokio::select! {
                biased;
                input = self.input_rx.recv(), if input_open => match input {
                    Some(SessionInput::Submit(query)) => self.handle_submit(query),
                    None => {
                        if self.controller.is_busy() {
                            info!("Input closed, waiting for the pending recommendation");
                        }
                        input_open = false;
                    }
                },
                Some(done) = self.done_rx.recv() => {
                    if self.controller.complete(done.cycle, done.outcome) {
                        self.publish();
                    }
                }
            }
        }

        info!("Session closed");
        Ok(())
    }

    fn handle_submit(&mut self, query: String) {
        match self.controller.submit_query(query) {
            Submission::Restored => {
                info!("Empty query, showing full catalog");
                self.publish();
            }
            Submission::Rejected => {
                warn!("A recommendation is already in progress, ignoring submit");
            }
            Submission::Dispatch(request) => {
                self.publish();

                let recommender = Arc::clone(&self.recommender);
                let catalog = Arc::clone(self.controller.catalog());
                let done_tx = self.done_tx.clone();
                tokio::spawn(async move {
                    let outcome = recommender.recommend(&request.query, &catalog).await;
                    let _ = done_tx.send(Completion {
                        cycle: request.cycle,
                        outcome,
                    });
                });
            }
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.controller.state().clone());
    }
}
