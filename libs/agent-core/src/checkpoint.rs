//! Checkpoint seam: snapshots taken before mutating tool calls

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Context handed to the sink before a mutating call executes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRequest {
    pub call_id: String,
    pub tool: String,
    pub arguments: Value,
    pub requested_at: DateTime<Utc>,
}

impl CheckpointRequest {
    pub fn new(call_id: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            arguments,
            requested_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("snapshot failed: {0}")]
    Snapshot(String),
}

/// Receives pre-mutation snapshots.
///
/// A snapshot failure is logged by the scheduler and never blocks the call.
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    async fn snapshot(&self, request: CheckpointRequest) -> Result<(), CheckpointError>;
}

/// Sink for sessions that do not record checkpoints
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCheckpointSink;

#[async_trait]
impl CheckpointSink for NullCheckpointSink {
    async fn snapshot(&self, _request: CheckpointRequest) -> Result<(), CheckpointError> {
        Ok(())
    }
}
