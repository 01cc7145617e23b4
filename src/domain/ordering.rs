//! Stable execution ordering for deterministic reconstruction.

use crate::domain::Execution;

/// Stable ordering key for executions.
///
/// Ordering: exec time (milliseconds) -> execution id (lexicographic).
/// Identical timestamps are broken by the smaller execution id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExecOrderingKey {
    pub exec_ms: i64,
    pub exec_id: String,
}

impl ExecOrderingKey {
    pub fn from_execution(exec: &Execution) -> Self {
        ExecOrderingKey {
            exec_ms: exec.exec_utc.timestamp_millis(),
            exec_id: exec.exec_id.clone(),
        }
    }
}

/// Sort executions into the canonical processing order, independent of
/// arrival order at the ingest endpoint.
pub fn sort_executions_deterministic(executions: &mut [Execution]) {
    executions.sort_by(|a, b| {
        ExecOrderingKey::from_execution(a).cmp(&ExecOrderingKey::from_execution(b))
    });
}
