//! Step trait and implementations.
//!
//! Steps are the units of work in a gatherflow pipeline. Each one declares the
//! fields it reads and the fields it writes; the builder checks those
//! declarations before anything runs.

use crate::errors::StepError;
use crate::state::PipelineState;
use async_trait::async_trait;
use std::fmt::Debug;

/// A unit of pipeline work.
#[async_trait]
pub trait Step<S: PipelineState>: Send + Sync + Debug {
    /// Returns the name of the step.
    fn name(&self) -> &str;

    /// Fields that must be set before the step runs.
    fn requires(&self) -> &[&'static str];

    /// Fields the step's update sets.
    fn produces(&self) -> &[&'static str];

    /// A human-readable progress line announced before the step runs.
    fn progress_message(&self, _state: &S) -> Option<String> {
        None
    }

    /// Runs the step against the current state.
    ///
    /// # Returns
    ///
    /// A partial update covering exactly the fields in [`Step::produces`].
    async fn run(&self, state: &S) -> Result<S::Update, StepError>;
}

/// A simple function-based step.
pub struct FnStep<S, F>
where
    S: PipelineState,
    F: Fn(&S) -> Result<S::Update, StepError> + Send + Sync,
{
    name: String,
    requires: Vec<&'static str>,
    produces: Vec<&'static str>,
    func: F,
    _state: std::marker::PhantomData<fn(&S)>,
}

impl<S, F> FnStep<S, F>
where
    S: PipelineState,
    F: Fn(&S) -> Result<S::Update, StepError> + Send + Sync,
{
    /// Creates a new function-based step.
    pub fn new(
        name: impl Into<String>,
        requires: &[&'static str],
        produces: &[&'static str],
        func: F,
    ) -> Self {
        Self {
            name: name.into(),
            requires: requires.to_vec(),
            produces: produces.to_vec(),
            func,
            _state: std::marker::PhantomData,
        }
    }
}

impl<S, F> Debug for FnStep<S, F>
where
    S: PipelineState,
    F: Fn(&S) -> Result<S::Update, StepError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStep")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("produces", &self.produces)
            .finish()
    }
}

#[async_trait]
impl<S, F> Step<S> for FnStep<S, F>
where
    S: PipelineState,
    F: Fn(&S) -> Result<S::Update, StepError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[&'static str] {
        &self.requires
    }

    fn produces(&self) -> &[&'static str] {
        &self.produces
    }

    async fn run(&self, state: &S) -> Result<S::Update, StepError> {
        (self.func)(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::require;

    crate::pipeline_state! {
        /// Test state.
        pub struct EchoState / EchoUpdate: "echo" {
            /// Input.
            input: String,
            /// Output.
            output: String,
        }
    }

    #[tokio::test]
    async fn test_fn_step() {
        let step = FnStep::new("echo", &["input"], &["output"], |state: &EchoState| {
            let input = require(&state.input, "echo", "input")?;
            Ok(EchoUpdate {
                output: Some(input.to_uppercase()),
                ..Default::default()
            })
        });

        assert_eq!(step.name(), "echo");
        assert_eq!(step.requires(), &["input"]);
        assert_eq!(step.produces(), &["output"]);

        let state = EchoState {
            input: Some("hi".to_string()),
            ..Default::default()
        };
        let update = step.run(&state).await.unwrap();
        assert_eq!(update.output.as_deref(), Some("HI"));
        assert!(step.progress_message(&state).is_none());
    }

    #[tokio::test]
    async fn test_fn_step_missing_input() {
        let step = FnStep::new("echo", &["input"], &["output"], |state: &EchoState| {
            require(&state.input, "echo", "input")?;
            Ok(EchoUpdate::default())
        });

        let err = step.run(&EchoState::default()).await.unwrap_err();
        assert!(matches!(err, StepError::Schema(_)));
    }
}
