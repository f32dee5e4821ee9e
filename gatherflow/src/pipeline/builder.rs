//! Pipeline builder with construction-time validation.

use super::{Pipeline, StepSpec, TERMINAL};
use crate::errors::{ContractErrorInfo, PipelineValidationError, StepError};
use crate::events::{EventSink, NoOpEventSink};
use crate::state::PipelineState;
use crate::steps::Step;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Every call to [`PipelineBuilder::step`] checks the new step against the
/// fields available at that point in the chain, so a misordered pipeline fails
/// here rather than halfway through a run.
pub struct PipelineBuilder<S: PipelineState> {
    name: String,
    entry_fields: Vec<String>,
    steps: Vec<StepSpec<S>>,
    available: HashSet<String>,
    event_sink: Arc<dyn EventSink>,
}

impl<S: PipelineState> PipelineBuilder<S> {
    /// Creates a builder whose runs start with `entry_fields` set by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry field is not declared in the state schema.
    pub fn new(
        name: impl Into<String>,
        entry_fields: &[&str],
    ) -> Result<Self, PipelineValidationError> {
        let schema = S::schema();
        for field in entry_fields {
            schema.check(field)?;
        }

        Ok(Self {
            name: name.into(),
            entry_fields: entry_fields.iter().map(|f| (*f).to_string()).collect(),
            steps: Vec::new(),
            available: entry_fields.iter().map(|f| (*f).to_string()).collect(),
            event_sink: Arc::new(NoOpEventSink),
        })
    }

    /// Sets the sink that receives lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Appends a step whose failures abort the run.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (unknown field, unsatisfied
    /// requirement, duplicate name).
    pub fn step(self, step: Arc<dyn Step<S>>) -> Result<Self, PipelineValidationError> {
        self.step_spec(StepSpec::new(step))
    }

    /// Appends a step whose upstream failures are replaced by `fallback`.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn step_with_fallback<F>(
        self,
        step: Arc<dyn Step<S>>,
        fallback: F,
    ) -> Result<Self, PipelineValidationError>
    where
        F: Fn(&StepError) -> S::Update + Send + Sync + 'static,
    {
        self.step_spec(StepSpec::new(step).with_fallback(fallback))
    }

    /// Appends a step specification.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn step_spec(mut self, spec: StepSpec<S>) -> Result<Self, PipelineValidationError> {
        self.add_step_spec(spec)?;
        Ok(self)
    }

    /// Appends a step specification in place.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn add_step_spec(&mut self, spec: StepSpec<S>) -> Result<(), PipelineValidationError> {
        let name = spec.name().to_string();

        if name.trim().is_empty() || name == TERMINAL {
            return Err(PipelineValidationError::new(format!(
                "Step name '{name}' is reserved or empty"
            ))
            .with_steps(vec![name])
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-RESERVED_NAME", "Invalid step name")
                    .with_fix_hint(format!("Use a non-empty name other than '{TERMINAL}'.")),
            ));
        }

        if self.steps.iter().any(|s| s.name() == name) {
            return Err(PipelineValidationError::new(format!(
                "Step '{name}' is already part of pipeline '{}'",
                self.name
            ))
            .with_steps(vec![name.clone()])
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-DUPLICATE_STEP", format!("Duplicate step '{name}'"))
                    .with_fix_hint("Give every step a unique name."),
            ));
        }

        let schema = S::schema();
        for field in spec.step.requires().iter().chain(spec.step.produces()) {
            schema.check(field)?;
        }

        if spec.step.produces().is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Step '{name}' does not produce any field"
            ))
            .with_steps(vec![name])
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-NO_OUTPUT", "Step produces nothing")
                    .with_fix_hint("Declare the fields the step writes."),
            ));
        }

        for field in spec.step.requires() {
            if !self.available.contains(*field) {
                return Err(PipelineValidationError::new(format!(
                    "Step '{name}' requires field '{field}' which no earlier step produces"
                ))
                .with_steps(vec![name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-UNSATISFIED_FIELD",
                        format!("Field '{field}' is not available before '{name}'"),
                    )
                    .with_fix_hint(
                        "Add the producing step earlier or supply the field as an entry field.",
                    )
                    .with_context_entry("field", *field),
                ));
            }
        }

        self.available
            .extend(spec.step.produces().iter().map(|f| (*f).to_string()));
        self.steps.push(spec);
        Ok(())
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no steps or some declared field is
    /// neither an entry field nor produced by any step.
    pub fn build(self) -> Result<Pipeline<S>, PipelineValidationError> {
        if self.steps.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no steps").with_error_info(
                ContractErrorInfo::new("CONTRACT-EMPTY", "Cannot build an empty pipeline")
                    .with_fix_hint("Add at least one step to the pipeline before building."),
            ));
        }

        let unproduced: Vec<String> = S::schema()
            .names()
            .filter(|name| !self.available.contains(*name))
            .map(str::to_string)
            .collect();
        if !unproduced.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Fields never set by pipeline '{}': {}",
                self.name,
                unproduced.join(", ")
            ))
            .with_error_info(
                ContractErrorInfo::new("CONTRACT-UNPRODUCED_FIELD", "Some fields are never set")
                    .with_fix_hint("Produce every declared field or remove it from the schema."),
            ));
        }

        Ok(Pipeline::new(
            self.name,
            self.entry_fields,
            self.steps,
            self.event_sink,
        ))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::FnStep;

    crate::pipeline_state! {
        /// Test state.
        pub struct ChainState / ChainUpdate: "chain" {
            /// Entry.
            question: String,
            /// Middle.
            docs: Vec<String>,
            /// End.
            synthesis: String,
        }
    }

    fn step(name: &str, requires: &[&'static str], produces: &[&'static str]) -> Arc<dyn Step<ChainState>> {
        Arc::new(FnStep::new(name, requires, produces, |_s: &ChainState| {
            Ok(ChainUpdate::default())
        }))
    }

    fn code(err: &PipelineValidationError) -> &str {
        err.code().unwrap_or_default()
    }

    #[test]
    fn test_builder_creation() {
        let builder = PipelineBuilder::<ChainState>::new("test", &["question"]).unwrap();
        assert_eq!(builder.name(), "test");
        assert_eq!(builder.step_count(), 0);
    }

    #[test]
    fn test_builder_rejects_undeclared_entry_field() {
        let err = PipelineBuilder::<ChainState>::new("test", &["query"]).err().unwrap();
        assert_eq!(code(&err), "CONTRACT-SCHEMA");
    }

    #[test]
    fn test_builder_chain_success() {
        let pipeline = PipelineBuilder::<ChainState>::new("test", &["question"])
            .unwrap()
            .step(step("search", &["question"], &["docs"]))
            .unwrap()
            .step(step("synthesize", &["question", "docs"], &["synthesis"]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(pipeline.name(), "test");
        assert_eq!(pipeline.step_count(), 2);
    }

    #[test]
    fn test_builder_rejects_misordered_steps() {
        let err = PipelineBuilder::<ChainState>::new("test", &["question"])
            .unwrap()
            .step(step("synthesize", &["question", "docs"], &["synthesis"]))
            .err()
            .unwrap();

        assert_eq!(code(&err), "CONTRACT-UNSATISFIED_FIELD");
        assert_eq!(err.steps, vec!["synthesize".to_string()]);
    }

    #[test]
    fn test_builder_rejects_undeclared_step_field() {
        let err = PipelineBuilder::<ChainState>::new("test", &["question"])
            .unwrap()
            .step(step("search", &["question"], &["wiki_docs"]))
            .err()
            .unwrap();

        assert_eq!(code(&err), "CONTRACT-SCHEMA");
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let err = PipelineBuilder::<ChainState>::new("test", &["question"])
            .unwrap()
            .step(step("search", &["question"], &["docs"]))
            .unwrap()
            .step(step("search", &["question"], &["synthesis"]))
            .err()
            .unwrap();

        assert_eq!(code(&err), "CONTRACT-DUPLICATE_STEP");
    }

    #[test]
    fn test_builder_rejects_terminal_name() {
        let err = PipelineBuilder::<ChainState>::new("test", &["question"])
            .unwrap()
            .step(step(TERMINAL, &["question"], &["docs"]))
            .err()
            .unwrap();

        assert_eq!(code(&err), "CONTRACT-RESERVED_NAME");
    }

    #[test]
    fn test_builder_rejects_step_without_output() {
        let err = PipelineBuilder::<ChainState>::new("test", &["question"])
            .unwrap()
            .step(step("noop", &["question"], &[]))
            .err()
            .unwrap();

        assert_eq!(code(&err), "CONTRACT-NO_OUTPUT");
    }

    #[test]
    fn test_builder_empty_build() {
        let err = PipelineBuilder::<ChainState>::new("test", &["question"])
            .unwrap()
            .build()
            .err()
            .unwrap();

        assert_eq!(code(&err), "CONTRACT-EMPTY");
    }

    #[test]
    fn test_builder_rejects_unproduced_fields() {
        let err = PipelineBuilder::<ChainState>::new("test", &["question"])
            .unwrap()
            .step(step("search", &["question"], &["docs"]))
            .unwrap()
            .build()
            .err()
            .unwrap();

        assert_eq!(code(&err), "CONTRACT-UNPRODUCED_FIELD");
        assert!(err.message.contains("synthesis"));
    }
}
