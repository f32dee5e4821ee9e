//! Progress output for interactive runs.

use gatherflow::events::{self, EventSink};
use serde_json::Value;

/// Prints step progress to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleEventSink;

impl EventSink for ConsoleEventSink {
    fn emit(&self, event_type: &str, data: Option<Value>) {
        if let Some(line) = data.as_ref().and_then(|d| render(event_type, d)) {
            println!("{line}");
        }
    }
}

/// Formats the line printed for an event, if any.
fn render(event_type: &str, data: &Value) -> Option<String> {
    match event_type {
        events::STEP_STARTED => data
            .get("progress")
            .and_then(Value::as_str)
            .map(|progress| format!("» {progress}")),
        events::STEP_FALLBACK => {
            let step = data.get("step").and_then(Value::as_str).unwrap_or("?");
            let error = data.get("error").and_then(Value::as_str).unwrap_or_default();
            Some(format!("! {step}: {error}"))
        }
        _ => None,
    }
}
