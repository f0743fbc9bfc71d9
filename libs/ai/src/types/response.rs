//! Response types from model backends

use serde::{Deserialize, Serialize};

/// Token usage statistics for one generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Total input tokens
    pub prompt_tokens: u32,
    /// Total completion tokens
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

impl Usage {
    /// Create a new usage with the given prompt and completion tokens
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Accumulate another usage into this one
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Unified finish reason for cross-provider consistency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReasonKind {
    /// Model generated stop sequence
    Stop,
    /// Model generated maximum number of tokens
    Length,
    /// Model triggered tool calls
    ToolCalls,
    /// Model stopped because of an error
    Error,
    /// Model stopped for other reasons
    Other,
}

/// Why generation finished - includes both unified and raw reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishReason {
    /// Unified finish reason for cross-provider consistency
    pub unified: FinishReasonKind,
    /// Raw finish reason from the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl FinishReason {
    /// Create a new finish reason with only unified value
    pub fn new(unified: FinishReasonKind) -> Self {
        Self { unified, raw: None }
    }

    /// Create a new finish reason with both unified and raw values
    pub fn with_raw(unified: FinishReasonKind, raw: impl Into<String>) -> Self {
        Self {
            unified,
            raw: Some(raw.into()),
        }
    }

    pub fn stop() -> Self {
        Self::new(FinishReasonKind::Stop)
    }

    pub fn length() -> Self {
        Self::new(FinishReasonKind::Length)
    }

    pub fn tool_calls() -> Self {
        Self::new(FinishReasonKind::ToolCalls)
    }

    pub fn error() -> Self {
        Self::new(FinishReasonKind::Error)
    }
}

impl Default for FinishReason {
    fn default() -> Self {
        Self::new(FinishReasonKind::Other)
    }
}

// Allow comparing FinishReason with FinishReasonKind directly
impl PartialEq<FinishReasonKind> for FinishReason {
    fn eq(&self, other: &FinishReasonKind) -> bool {
        self.unified == *other
    }
}
