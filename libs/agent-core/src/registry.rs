//! Tool capability seam and the per-session registry

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tandemai::Tool;
use tokio_util::sync::CancellationToken;

/// Whether a tool observes or changes the environment.
///
/// Declared by the capability, not inferred from arguments; the approval
/// engine's Default mode keys off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskClass {
    ReadOnly,
    Mutating,
}

/// Result of invoking a tool capability
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(Value),
    /// Tool-reported failure; the detail is surfaced to the model verbatim
    Failure(String),
    /// The capability observed the cancel signal and stopped
    Cancelled,
}

/// One callable tool, implemented outside the agent core.
#[async_trait]
pub trait ToolCapability: Send + Sync {
    /// Name, description, and argument schema advertised to the model
    fn declaration(&self) -> Tool;

    fn risk_class(&self) -> RiskClass;

    /// Check arguments against the schema before anything else runs.
    ///
    /// Must be cheap and side-effect free; the error string names the
    /// offending field.
    fn validate(&self, arguments: &Value) -> Result<(), String>;

    /// Human-readable description of what the call would do, shown in
    /// confirmation prompts.
    fn confirmation_description(&self, arguments: &Value) -> String {
        let _ = arguments;
        self.declaration().description
    }

    /// Run the tool. Long-running capabilities should watch `cancel` and
    /// return [`InvocationResult::Cancelled`] when it fires.
    async fn invoke(&self, arguments: Value, cancel: &CancellationToken) -> InvocationResult;
}

/// Session-scoped lookup of registered tool capabilities
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolCapability>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under its declared name, replacing any previous
    /// registration with that name.
    pub fn register(&mut self, tool: Arc<dyn ToolCapability>) {
        self.tools.insert(tool.declaration().name, tool);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ToolCapability>> {
        self.tools.get(name).cloned()
    }

    /// Declarations advertised to the model on every request
    pub fn declarations(&self) -> Vec<Tool> {
        let mut declarations: Vec<Tool> = self.tools.values().map(|t| t.declaration()).collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
