//! Unified model descriptor
//!
//! One `Model` struct describes any backend tier the agent core can be
//! pointed at; the concrete provider behind it is an external collaborator.

use serde::{Deserialize, Serialize};

/// Unified model representation across providers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Model {
    /// Model identifier sent to the API (e.g., "tandem-pro-2")
    pub id: String,
    /// Human-readable name (e.g., "Tandem Pro 2")
    pub name: String,
    /// Token limits
    pub limit: ModelLimit,
}

impl Model {
    /// Create a new model with explicit limits
    pub fn new(id: impl Into<String>, name: impl Into<String>, limit: ModelLimit) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            limit,
        }
    }

    /// Create a model with minimal info and default limits
    pub fn custom(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            limit: ModelLimit::default(),
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Token limits for the model
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelLimit {
    /// Maximum context window size in tokens
    pub context: u64,
    /// Maximum output tokens
    pub output: u64,
}

impl ModelLimit {
    /// Create a new limit struct
    pub fn new(context: u64, output: u64) -> Self {
        Self { context, output }
    }
}

impl Default for ModelLimit {
    fn default() -> Self {
        Self {
            context: 128_000,
            output: 8_192,
        }
    }
}
