//! Per-run step records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a step ended in a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step returned its own update.
    Completed,
    /// The step failed upstream and its fallback update was used.
    FellBack {
        /// The error the fallback replaced.
        reason: String,
    },
}

/// Timing and outcome of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name.
    pub name: String,
    /// Outcome.
    #[serde(flatten)]
    pub outcome: StepOutcome,
    /// When the step started.
    pub started_at: DateTime<Utc>,
    /// When the step ended.
    pub ended_at: DateTime<Utc>,
}

impl StepRecord {
    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Returns true if the fallback was used.
    #[must_use]
    pub fn fell_back(&self) -> bool {
        matches!(self.outcome, StepOutcome::FellBack { .. })
    }
}

/// The result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineRun<S> {
    /// Identifier of this run, also attached to the tracing span.
    pub run_id: Uuid,
    /// Final state; every declared field is set.
    pub state: S,
    /// One record per step, in execution order.
    pub steps: Vec<StepRecord>,
}

impl<S> PipelineRun<S> {
    /// Returns the steps that fell back.
    pub fn fallbacks(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|record| record.fell_back())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: StepOutcome) -> StepRecord {
        let now = Utc::now();
        StepRecord {
            name: "wiki_search".to_string(),
            outcome,
            started_at: now,
            ended_at: now + chrono::Duration::milliseconds(15),
        }
    }

    #[test]
    fn test_record_duration() {
        assert_eq!(record(StepOutcome::Completed).duration_ms(), 15);
    }

    #[test]
    fn test_record_serialization() {
        let json = serde_json::to_value(record(StepOutcome::FellBack {
            reason: "wikipedia returned HTTP 503".to_string(),
        }))
        .unwrap();

        assert_eq!(json["status"], "fell_back");
        assert_eq!(json["reason"], "wikipedia returned HTTP 503");
        assert_eq!(json["name"], "wiki_search");
    }

    #[test]
    fn test_fallbacks_filter() {
        let run = PipelineRun {
            run_id: Uuid::now_v7(),
            state: (),
            steps: vec![
                record(StepOutcome::Completed),
                record(StepOutcome::FellBack {
                    reason: "down".to_string(),
                }),
            ],
        };
        assert_eq!(run.fallbacks().count(), 1);
    }
}
