//! Request types for generation

use super::{GenerateOptions, Message, Model, Tool};
use serde::{Deserialize, Serialize};

/// Request for generating a model response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model to generate with
    #[serde(skip)]
    pub model: Model,

    /// Conversation messages
    pub messages: Vec<Message>,

    /// Generation options (temperature, max_tokens, tools, etc.)
    #[serde(flatten)]
    pub options: GenerateOptions,
}

impl GenerateRequest {
    /// Create a new request
    pub fn new(model: Model, messages: Vec<Message>) -> Self {
        Self {
            model,
            messages,
            options: GenerateOptions::default(),
        }
    }

    /// Set generation options
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    /// Advertise a set of tools to the model
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        if !tools.is_empty() {
            self.options.tools = Some(tools);
        }
        self
    }
}
