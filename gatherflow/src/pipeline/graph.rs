//! Sequential pipeline execution.
//!
//! Steps run strictly one after another. Each update is merged into the
//! running state before the next step starts, and the terminal marker hands
//! the state back untouched.

use super::{PipelineRun, StepOutcome, StepRecord, StepSpec};
use crate::errors::{GatherflowError, SchemaError};
use crate::events::{self, EventSink};
use crate::state::{apply_update, initialize, FieldValue, PipelineState, StateUpdate};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Name of the terminal marker that ends every pipeline.
pub const TERMINAL: &str = "__end__";

/// A validated, ordered chain of steps.
pub struct Pipeline<S: PipelineState> {
    name: String,
    entry_fields: Vec<String>,
    steps: Vec<StepSpec<S>>,
    event_sink: Arc<dyn EventSink>,
}

impl<S: PipelineState> std::fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("entry_fields", &self.entry_fields)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl<S: PipelineState> Pipeline<S> {
    pub(super) fn new(
        name: String,
        entry_fields: Vec<String>,
        steps: Vec<StepSpec<S>>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name,
            entry_fields,
            steps,
            event_sink,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fields the caller must supply.
    #[must_use]
    pub fn entry_fields(&self) -> &[String] {
        &self.entry_fields
    }

    /// Returns the name of the entry step.
    #[must_use]
    pub fn entry_step(&self) -> &str {
        self.steps.first().map_or(TERMINAL, StepSpec::name)
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the step names in execution order, ending with [`TERMINAL`].
    #[must_use]
    pub fn execution_order(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(StepSpec::name)
            .chain(std::iter::once(TERMINAL))
            .collect()
    }

    /// Initializes state from name-keyed values and runs the pipeline.
    ///
    /// # Errors
    ///
    /// Fails with a schema error if a value names an undeclared field, or with
    /// the first fatal step failure.
    pub async fn invoke<I, K>(&self, initial_values: I) -> Result<S, GatherflowError>
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: AsRef<str>,
    {
        let state = initialize::<S, _, _>(initial_values)?;
        self.run(state).await
    }

    /// Runs the pipeline and returns the final state.
    ///
    /// # Errors
    ///
    /// Returns the first fatal step failure. No partial state is returned.
    pub async fn run(&self, initial: S) -> Result<S, GatherflowError> {
        Ok(self.run_with_report(initial).await?.state)
    }

    /// Runs the pipeline and returns the final state with per-step records.
    ///
    /// # Errors
    ///
    /// Returns the first fatal step failure. No partial state is returned.
    pub async fn run_with_report(&self, initial: S) -> Result<PipelineRun<S>, GatherflowError> {
        let run_id = Uuid::now_v7();
        let span = info_span!("pipeline", pipeline = %self.name, run_id = %run_id);
        self.execute(run_id, initial).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid, initial: S) -> Result<PipelineRun<S>, GatherflowError> {
        for field in &self.entry_fields {
            if !initial.is_set(field) {
                return Err(SchemaError::missing(self.entry_step(), field.as_str()).into());
            }
        }

        let start = Instant::now();
        self.event_sink.emit(
            events::PIPELINE_STARTED,
            Some(serde_json::json!({
                "pipeline": &self.name,
                "run_id": run_id.to_string(),
                "steps": self.execution_order(),
            })),
        );

        let mut state = initial;
        let mut records = Vec::with_capacity(self.steps.len());

        for spec in &self.steps {
            let name = spec.name();
            let started_at = Utc::now();
            let step_start = Instant::now();

            self.event_sink.emit(
                events::STEP_STARTED,
                Some(serde_json::json!({
                    "step": name,
                    "progress": spec.step.progress_message(&state),
                })),
            );
            debug!(step = name, "Running step");

            let (update, outcome) = match spec.step.run(&state).await {
                Ok(update) => (update, StepOutcome::Completed),
                Err(err) => match spec.policy.substitute(&err) {
                    Some(update) => {
                        warn!(step = name, error = %err, "Step failed, using fallback");
                        self.event_sink.emit(
                            events::STEP_FALLBACK,
                            Some(serde_json::json!({
                                "step": name,
                                "error": err.to_string(),
                            })),
                        );
                        (update, StepOutcome::FellBack { reason: err.to_string() })
                    }
                    None => {
                        return Err(self.fail(name, GatherflowError::step_failed(name, err)));
                    }
                },
            };

            if let Some(field) = update
                .fields()
                .into_iter()
                .find(|field| !spec.step.produces().contains(field))
            {
                let err = SchemaError::UndeclaredOutput {
                    step: name.to_string(),
                    field: field.to_string(),
                };
                return Err(self.fail(name, GatherflowError::step_failed(name, err.into())));
            }

            state = apply_update(state, update)?;

            if let Some(field) = spec.step.produces().iter().find(|f| !state.is_set(f)) {
                let err = SchemaError::NotProduced {
                    step: name.to_string(),
                    field: (*field).to_string(),
                };
                return Err(self.fail(name, GatherflowError::step_failed(name, err.into())));
            }

            let duration_ms = step_start.elapsed().as_secs_f64() * 1000.0;
            self.event_sink.emit(
                events::STEP_COMPLETED,
                Some(serde_json::json!({
                    "step": name,
                    "duration_ms": duration_ms,
                    "fell_back": matches!(outcome, StepOutcome::FellBack { .. }),
                })),
            );

            records.push(StepRecord {
                name: name.to_string(),
                outcome,
                started_at,
                ended_at: Utc::now(),
            });
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.event_sink.emit(
            events::PIPELINE_COMPLETED,
            Some(serde_json::json!({
                "pipeline": &self.name,
                "run_id": run_id.to_string(),
                "terminal": TERMINAL,
                "duration_ms": duration_ms,
            })),
        );
        info!(duration_ms, "Pipeline completed");

        Ok(PipelineRun {
            run_id,
            state,
            steps: records,
        })
    }

    fn fail(&self, step: &str, err: GatherflowError) -> GatherflowError {
        warn!(step, error = %err, "Step failed, aborting pipeline");
        self.event_sink.emit(
            events::STEP_FAILED,
            Some(serde_json::json!({
                "step": step,
                "error": err.to_string(),
            })),
        );
        err
    }
}
