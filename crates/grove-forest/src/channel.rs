//! Background training runs with restart-on-submit semantics.
//!
//! A [`TrainingChannel`] owns at most one live run. Submitting a new request
//! terminates the previous run; its result, if it still arrives, is
//! recognised by its [`RunId`] and discarded.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{EnsembleKind, ForestConfig, HyperparameterSpec};
use crate::dataset::TrainingSet;
use crate::error::ForestError;
use crate::forest::{self, Ensemble};
use crate::learner::TreeLearner;

/// A training request as exchanged with a front end.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest<O> {
    /// Ensemble hyperparameters, including the learner options.
    pub hyperparameters: HyperparameterSpec<O>,
    /// Rows and labels to train on.
    pub training_set: TrainingSet,
}

/// Identifier of one submitted run. Later submissions get larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u64);

impl RunId {
    /// Return the raw sequence number.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A finished run.
#[derive(Debug)]
pub struct Completed<L: TreeLearner> {
    /// The run that produced the ensemble.
    pub run_id: RunId,
    /// The decoded ensemble.
    pub ensemble: Ensemble<L>,
}

/// Message sent back by a run's task: the encoded payload or the failure.
struct Completion {
    run_id: RunId,
    outcome: Result<Value, ForestError>,
}

struct ActiveRun {
    id: RunId,
    kind: Option<EnsembleKind>,
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

impl ActiveRun {
    fn terminate(self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.handle.abort();
    }
}

/// Runs training off the caller's task and hands back finished ensembles.
///
/// [`TrainingChannel::submit`] must be called from within a Tokio runtime.
pub struct TrainingChannel<L: TreeLearner + Clone> {
    learner: L,
    next_run: u64,
    active: Option<ActiveRun>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl<L: TreeLearner + Clone> TrainingChannel<L> {
    /// Create an idle channel that trains with `learner`.
    #[must_use]
    pub fn new(learner: L) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            learner,
            next_run: 0,
            active: None,
            tx,
            rx,
        }
    }

    /// Start a run for `request`, terminating any run still in flight.
    ///
    /// The request is trained on Tokio's blocking pool; the outcome is
    /// collected with [`TrainingChannel::next_model`].
    pub fn submit(&mut self, request: TrainingRequest<L::Options>) -> RunId {
        if let Some(previous) = self.active.take() {
            debug!(run_id = %previous.id, "terminating superseded run");
            previous.terminate();
        }

        let id = RunId(self.next_run);
        self.next_run += 1;
        let kind = request.hyperparameters.kind.parse().ok();
        let cancel = Arc::new(AtomicBool::new(false));

        let learner = self.learner.clone();
        let flag = Arc::clone(&cancel);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let joined =
                tokio::task::spawn_blocking(move || run_training(&learner, request, &flag)).await;
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    warn!(run_id = %id, error = %join_err, "training worker failed");
                    Err(ForestError::WorkerFailed {
                        reason: join_err.to_string(),
                    })
                }
            };
            // The receiver only disappears with the channel itself.
            let _ = tx.send(Completion { run_id: id, outcome });
        });

        info!(run_id = %id, "training run submitted");
        self.active = Some(ActiveRun {
            id,
            kind,
            handle,
            cancel,
        });
        id
    }

    /// Wait for the current run and decode its ensemble.
    ///
    /// Completions from superseded runs are discarded. The run is no longer
    /// active once this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::NoActiveRun`] | nothing is in flight |
    /// | [`ForestError::WorkerFailed`] | the training task panicked |
    /// | any other | training or decoding failed |
    pub async fn next_model(&mut self) -> Result<Completed<L>, ForestError> {
        let active_id = self.active.as_ref().ok_or(ForestError::NoActiveRun)?.id;
        let completion = loop {
            let completion = self.rx.recv().await.ok_or_else(|| ForestError::WorkerFailed {
                reason: "completion channel closed".to_string(),
            })?;
            if completion.run_id == active_id {
                break completion;
            }
            debug!(run_id = %completion.run_id, active = %active_id, "discarding stale completion");
        };

        let run = self.active.take().ok_or(ForestError::NoActiveRun)?;
        let value = completion.outcome?;
        let kind = run.kind.ok_or(ForestError::MissingKind)?;
        let ensemble = Ensemble::from_json(self.learner.clone(), value, kind)?;
        info!(run_id = %run.id, tree_count = ensemble.tree_count(), "training run complete");
        Ok(Completed {
            run_id: run.id,
            ensemble,
        })
    }

    /// Terminate the current run without starting another.
    ///
    /// Returns the terminated run's id, if one was in flight.
    pub fn cancel(&mut self) -> Option<RunId> {
        let run = self.active.take()?;
        let id = run.id;
        debug!(run_id = %id, "cancelling run");
        run.terminate();
        Some(id)
    }

    /// Return the id of the run in flight, if any.
    #[must_use]
    pub fn active_run(&self) -> Option<RunId> {
        self.active.as_ref().map(|run| run.id)
    }
}

impl<L: TreeLearner + Clone> Drop for TrainingChannel<L> {
    fn drop(&mut self) {
        if let Some(run) = self.active.take() {
            run.terminate();
        }
    }
}

/// Decode, train, and encode one request. Runs on the blocking pool.
fn run_training<L: TreeLearner + Clone>(
    learner: &L,
    request: TrainingRequest<L::Options>,
    cancel: &AtomicBool,
) -> Result<Value, ForestError> {
    let config = ForestConfig::try_from(request.hyperparameters)?;
    let ensemble = forest::train_cancellable(learner, &request.training_set, &config, cancel)?;
    ensemble.to_json()
}
