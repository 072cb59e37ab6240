//! Cook engine — the concurrent driver for one validated envelope.
//!
//! One dispatch loop owns the completion map; step tasks run concurrently
//! and only ever send completions back over a shared mpsc channel, never
//! touching the map. Completions are processed strictly one at a time in
//! arrival order, and every completion re-evaluates readiness for the steps
//! still waiting. A one-permit semaphore serializes envelopes per sprout,
//! since steps mutate shared host resources.

use super::graph::{Graph, GraphError};
use super::ready;
use super::types::{Ack, CompletionStatus, RecipeEnvelope, Step, StepCompletion};
use crate::ingredients::IngredientRegistry;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};

/// Id of the synthetic record published before any step runs.
pub const START_MARKER: &str = "cook-start";

/// Id of the synthetic record published once every step has resolved.
pub const COMPLETED_MARKER: &str = "cook-completed";

/// Internal scheduling event. Markers are sink-only records and never enter
/// the completion map, so a step whose opaque id happens to equal a marker
/// name schedules like any other step.
enum CookEvent {
    Seed,
    Step(StepCompletion),
}

#[derive(Debug, Error)]
pub enum CookError {
    #[error("a cook is already in progress on this sprout")]
    Busy,

    #[error(transparent)]
    Invalid(#[from] GraphError),

    #[error("completion stream closed before the envelope finished")]
    StreamClosed,
}

/// Where progress goes: the job-scoped channel consumed by the farmer's
/// durable job log and any live subscriber. Publish failures are logged and
/// never fail the cook.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn publish(&self, job_id: &str, completion: &StepCompletion) -> Result<(), String>;
}

/// Sink that drops everything. Useful when no observer is attached.
pub struct NullSink;

#[async_trait]
impl CompletionSink for NullSink {
    async fn publish(&self, _job_id: &str, _completion: &StepCompletion) -> Result<(), String> {
        Ok(())
    }
}

pub struct CookEngine {
    registry: Arc<IngredientRegistry>,
    // Per-sprout execution serialization permit
    permit: Semaphore,
}

impl CookEngine {
    pub fn new(registry: Arc<IngredientRegistry>) -> Self {
        Self {
            registry,
            permit: Semaphore::new(1),
        }
    }

    /// The immediate receipt for an envelope, sent before execution starts.
    pub fn ack(envelope: &RecipeEnvelope) -> Ack {
        Ack {
            acknowledged: true,
            job_id: envelope.job_id.clone(),
        }
    }

    /// Cook one envelope to exhaustion.
    ///
    /// Returns `Busy` if another envelope holds the permit, or the
    /// aggregated validation error before any side effect runs. Once
    /// scheduling begins the envelope itself never fails: step-level
    /// failures surface in the completion stream only.
    pub async fn cook(
        &self,
        envelope: RecipeEnvelope,
        sink: Arc<dyn CompletionSink>,
    ) -> Result<(), CookError> {
        let _permit = self.permit.try_acquire().map_err(|_| CookError::Busy)?;

        let graph = Graph::validate(envelope.steps)?;
        let job_id = envelope.job_id;
        let test = envelope.test;
        let steps: Vec<Step> = graph.steps().to_vec();

        let mut completions: HashMap<String, StepCompletion> = steps
            .iter()
            .map(|s| (s.id.clone(), StepCompletion::not_started(&s.id)))
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel::<CookEvent>();

        // Seed event: kicks off the first readiness pass. Counted alongside
        // the steps so the loop exits only when everything resolved.
        let _ = tx.send(CookEvent::Seed);
        let mut outstanding = steps.len() + 1;

        debug!("job {}: cooking {} steps (test={})", job_id, steps.len(), test);

        while outstanding > 0 {
            match rx.recv().await.ok_or(CookError::StreamClosed)? {
                CookEvent::Seed => {
                    let start = marker(START_MARKER);
                    if let Err(e) = sink.publish(&job_id, &start).await {
                        warn!("job {}: progress publish failed: {}", job_id, e);
                    }
                }
                CookEvent::Step(completion) => {
                    if let Err(e) = sink.publish(&job_id, &completion).await {
                        warn!("job {}: progress publish failed: {}", job_id, e);
                    }
                    if let Some(entry) = completions.get_mut(&completion.id) {
                        *entry = completion;
                    }
                }
            }
            outstanding -= 1;

            // Readiness pass over everything not yet started. All map
            // mutation stays on this loop; step tasks only send.
            for step in &steps {
                let waiting = completions
                    .get(&step.id)
                    .map(|c| c.status == CompletionStatus::NotStarted)
                    .unwrap_or(false);
                if !waiting {
                    continue;
                }

                match ready::is_ready(step, &completions) {
                    Err(violation) => {
                        // Permanently unsatisfiable: fail the step now so
                        // this same pass cascades, and let the synthetic
                        // completion flow through the stream like any other.
                        let failed = StepCompletion::failed(&step.id, violation.to_string());
                        completions.insert(step.id.clone(), failed.clone());
                        let _ = tx.send(CookEvent::Step(failed));
                    }
                    Ok(true) => {
                        if let Some(entry) = completions.get_mut(&step.id) {
                            entry.status = CompletionStatus::InProgress;
                        }
                        let registry = self.registry.clone();
                        let step = step.clone();
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let completion = execute_step(&registry, &step, test).await;
                            let _ = tx.send(CookEvent::Step(completion));
                        });
                    }
                    Ok(false) => {}
                }
            }
        }

        let done = marker(COMPLETED_MARKER);
        if let Err(e) = sink.publish(&job_id, &done).await {
            warn!("job {}: progress publish failed: {}", job_id, e);
        }
        debug!("job {}: cooked", job_id);
        Ok(())
    }
}

fn marker(id: &str) -> StepCompletion {
    StepCompletion {
        id: id.to_string(),
        status: CompletionStatus::Completed,
        changes_made: false,
        changes: Vec::new(),
        error: None,
    }
}

/// One unit of work: resolve the capability, run it, translate the result.
/// Never touches the completion map.
async fn execute_step(registry: &IngredientRegistry, step: &Step, test: bool) -> StepCompletion {
    let cooker = match registry.parse(step) {
        Ok(cooker) => cooker,
        Err(e) => return StepCompletion::failed(&step.id, e.to_string()),
    };

    let result = if test {
        cooker.test().await
    } else {
        cooker.apply().await
    };

    match result {
        Ok(outcome) => StepCompletion {
            id: step.id.clone(),
            status: if outcome.succeeded {
                CompletionStatus::Completed
            } else {
                CompletionStatus::Failed
            },
            changes_made: outcome.changed,
            error: if outcome.succeeded {
                None
            } else {
                Some(outcome.notes.join("; "))
            },
            changes: outcome.notes,
        },
        Err(e) => StepCompletion::failed(&step.id, e.to_string()),
    }
}
