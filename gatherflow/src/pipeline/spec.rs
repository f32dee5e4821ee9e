//! Step specifications and failure policies.

use crate::errors::StepError;
use crate::state::PipelineState;
use crate::steps::Step;
use std::fmt;
use std::sync::Arc;

/// Builds a substitute update from the failure it replaces.
pub type FallbackFn<S> =
    Arc<dyn Fn(&StepError) -> <S as PipelineState>::Update + Send + Sync>;

/// What the runner does when a step returns an error.
pub enum FailurePolicy<S: PipelineState> {
    /// Abort the run.
    Fatal,
    /// Replace upstream failures with the fallback update and continue.
    ///
    /// Any other error is still fatal.
    Fallback(FallbackFn<S>),
}

impl<S: PipelineState> FailurePolicy<S> {
    /// Creates a fallback policy.
    #[must_use]
    pub fn fallback<F>(f: F) -> Self
    where
        F: Fn(&StepError) -> S::Update + Send + Sync + 'static,
    {
        Self::Fallback(Arc::new(f))
    }

    /// Returns the substitute update if this policy covers the error.
    #[must_use]
    pub fn substitute(&self, error: &StepError) -> Option<S::Update> {
        match self {
            Self::Fallback(f) if error.is_upstream() => Some(f(error)),
            _ => None,
        }
    }
}

impl<S: PipelineState> Default for FailurePolicy<S> {
    fn default() -> Self {
        Self::Fatal
    }
}

impl<S: PipelineState> Clone for FailurePolicy<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Fatal => Self::Fatal,
            Self::Fallback(f) => Self::Fallback(Arc::clone(f)),
        }
    }
}

impl<S: PipelineState> fmt::Debug for FailurePolicy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "Fatal"),
            Self::Fallback(_) => write!(f, "Fallback"),
        }
    }
}

/// A step together with how its failures are handled.
pub struct StepSpec<S: PipelineState> {
    /// The step implementation.
    pub step: Arc<dyn Step<S>>,
    /// Failure policy.
    pub policy: FailurePolicy<S>,
}

impl<S: PipelineState> StepSpec<S> {
    /// Creates a spec with a fatal failure policy.
    #[must_use]
    pub fn new(step: Arc<dyn Step<S>>) -> Self {
        Self {
            step,
            policy: FailurePolicy::Fatal,
        }
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy<S>) -> Self {
        self.policy = policy;
        self
    }

    /// Substitutes upstream failures with the given update builder.
    #[must_use]
    pub fn with_fallback<F>(self, f: F) -> Self
    where
        F: Fn(&StepError) -> S::Update + Send + Sync + 'static,
    {
        self.with_policy(FailurePolicy::fallback(f))
    }

    /// Returns the step name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.step.name()
    }
}

impl<S: PipelineState> Clone for StepSpec<S> {
    fn clone(&self) -> Self {
        Self {
            step: Arc::clone(&self.step),
            policy: self.policy.clone(),
        }
    }
}

impl<S: PipelineState> fmt::Debug for StepSpec<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSpec")
            .field("step", &self.step)
            .field("policy", &self.policy)
            .finish()
    }
}
