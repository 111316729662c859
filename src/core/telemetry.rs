use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::stage::Capability;

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum StageOutcome {
    Completed,
    Failed(String),
}

/// A single entry in the execution trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub stage: String,
    pub role: String,
    pub capabilities: Vec<Capability>,
    pub tool_calls: usize,
    pub context_sources: Vec<String>,
    pub duration_ms: u64,
    pub output_chars: usize,
    pub outcome: StageOutcome,
}

/// Trait for recording execution traces.
pub trait Telemetry: Send + Sync {
    fn record(&self, entry: TraceEntry);
    fn flush(&self);
}

/// Simple in-memory collector for traces.
#[derive(Default)]
pub struct MemoryTelemetry {
    traces: Mutex<Vec<TraceEntry>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_traces(&self) -> Vec<TraceEntry> {
        match self.traces.lock() {
            Ok(traces) => traces.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Telemetry for MemoryTelemetry {
    fn record(&self, entry: TraceEntry) {
        match self.traces.lock() {
            Ok(mut traces) => traces.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    fn flush(&self) {}
}

/// Writes each trace as one JSON line on the `jobsmith::trace` log target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn record(&self, entry: TraceEntry) {
        match serde_json::to_string(&entry) {
            Ok(line) => log::info!(target: "jobsmith::trace", "{}", line),
            Err(e) => log::warn!("Could not serialize trace for '{}': {}", entry.stage, e),
        }
    }

    fn flush(&self) {
        log::logger().flush();
    }
}
