//! The content-generation seam consumed by the agent core

use crate::error::Result;
use crate::types::{GenerateRequest, GenerateStream, Message, Model};
use async_trait::async_trait;

/// Streams model responses for conversation turns.
///
/// Implementations live outside the agent core (HTTP providers, local
/// inference, test stubs). Streams are finite and not restartable; every
/// round trip makes a fresh `stream` call.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Open a response-event stream for the given conversation state.
    async fn stream(&self, request: &GenerateRequest) -> Result<GenerateStream>;

    /// Estimate the token footprint of a message list on the given model.
    ///
    /// Used by history compaction for budget decisions; an estimate is
    /// acceptable, exactness is not required.
    async fn count_tokens(&self, model: &Model, messages: &[Message]) -> Result<u64>;
}
