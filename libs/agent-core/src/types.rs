//! Shared configuration, request, and event types for the agent core

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tandemai::{Model, Usage};
use uuid::Uuid;

use crate::error::CallFailure;

/// Configuration for one agent session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Primary model tier
    pub model: Model,
    /// Reduced-capability tier engaged when the primary exhausts its quota
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<Model>,
    /// System prompt prepended to every model request
    pub system_prompt: String,
    /// Upper bound on model round trips within one turn
    pub max_round_trips: usize,
    /// Cap on completion tokens per round trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Concurrent tool-execution slots
    pub concurrency_limit: usize,
    /// Approval mode and session rules
    pub approval: ApprovalConfig,
    /// Backoff settings for transient model failures
    pub retry: RetryConfig,
    /// History compaction settings
    pub compaction: CompactionConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: Model::default(),
            fallback_model: None,
            system_prompt: String::new(),
            max_round_trips: 10,
            max_output_tokens: None,
            concurrency_limit: 4,
            approval: ApprovalConfig::default(),
            retry: RetryConfig::default(),
            compaction: CompactionConfig::default(),
        }
    }
}

/// How tool calls clear the approval gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Every call auto-proceeds unless a deny rule matches
    Unattended,
    /// Read-only calls auto-proceed; mutating calls need confirmation
    #[default]
    Default,
    /// Only allow-listed calls proceed; everything else is rejected
    Restricted,
}

/// Approval mode plus the session's allow/deny rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalConfig {
    pub mode: ApprovalMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ToolRule>,
}

/// A session rule matching a tool, optionally narrowed by a command pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRule {
    /// Tool name the rule applies to
    pub tool: String,
    /// Glob matched against the call's `command` argument; absent = any call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_pattern: Option<String>,
    pub action: RuleAction,
}

impl ToolRule {
    pub fn allow(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            command_pattern: None,
            action: RuleAction::Allow,
        }
    }

    pub fn deny(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            command_pattern: None,
            action: RuleAction::Deny,
        }
    }

    pub fn with_command_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.command_pattern = Some(pattern.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Deny,
}

/// Backoff settings for transient model-request failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per round trip, including the first
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

/// History compaction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    pub enabled: bool,
    /// Token budget; `None` uses the active model's context limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ceiling: Option<u64>,
    /// Fraction of the ceiling that triggers compaction
    pub trigger_ratio: f64,
    /// Most recent turns that are never summarized away
    pub keep_recent_turns: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_ceiling: None,
            trigger_ratio: 0.8,
            keep_recent_turns: 4,
        }
    }
}

/// Where a tool call came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOrigin {
    /// Proposed by the model mid-turn
    Model,
    /// Submitted by the client alongside the turn input
    Client,
}

/// One tool call to schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique within the turn
    pub call_id: String,
    pub name: String,
    pub arguments: Value,
    pub origin: CallOrigin,
}

impl ToolCallRequest {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
            origin: CallOrigin::Model,
        }
    }

    pub fn from_client(mut self) -> Self {
        self.origin = CallOrigin::Client;
        self
    }
}

/// Lifecycle of a single tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    Validating,
    AwaitingApproval,
    Scheduled,
    Executing,
    Success,
    Error,
    Cancelled,
}

impl CallPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }
}

/// A user's answer to a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Proceed,
    /// Proceed and auto-approve identical calls for the rest of the session
    ProceedAndRemember,
    Reject,
    /// Reject and auto-reject identical calls for the rest of the session
    RejectAndRemember,
}

impl ApprovalDecision {
    pub fn proceeds(&self) -> bool {
        matches!(self, Self::Proceed | Self::ProceedAndRemember)
    }

    pub fn remembers(&self) -> bool {
        matches!(self, Self::ProceedAndRemember | Self::RejectAndRemember)
    }
}

/// Terminal outcome of one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    Success { payload: Value },
    Failed { failure: CallFailure },
    Cancelled,
}

impl CallOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Render the outcome as content the model can read in the next round trip
    pub fn as_model_content(&self) -> Value {
        match self {
            Self::Success { payload } => payload.clone(),
            Self::Failed { failure } => serde_json::json!({ "error": failure.to_string() }),
            Self::Cancelled => serde_json::json!({ "error": "tool call cancelled" }),
        }
    }
}

/// A tool call that reached a terminal phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedToolCall {
    pub request: ToolCallRequest,
    pub outcome: CallOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Input that opens a turn
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    /// User text; may be empty when only client calls are submitted
    pub text: String,
    /// Client-initiated tool calls executed before the first round trip
    pub client_calls: Vec<ToolCallRequest>,
}

impl TurnInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            client_calls: Vec::new(),
        }
    }

    pub fn with_client_calls(mut self, calls: Vec<ToolCallRequest>) -> Self {
        self.client_calls = calls;
        self
    }
}

/// Why a turn stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished without proposing further tool calls
    Completed,
    Cancelled,
    /// The round-trip cap was reached with tool calls still pending
    RoundTripLimit,
}

/// Result of a completed turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub turn_id: Uuid,
    pub stop_reason: StopReason,
    /// Model round trips consumed
    pub round_trips: usize,
    /// Concatenated assistant text across all round trips
    pub text: String,
    /// Aggregated token usage for the turn
    pub usage: Usage,
}

/// Events emitted over the turn's event feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    TurnStarted {
        turn_id: Uuid,
    },
    RoundTripStarted {
        turn_id: Uuid,
        round_trip: usize,
    },
    /// Assistant text delta
    TextDelta {
        delta: String,
    },
    /// Internal-reasoning delta; display-only, never fed back to the model
    ThoughtDelta {
        delta: String,
    },
    ToolCallsProposed {
        requests: Vec<ToolCallRequest>,
    },
    CallPhaseChanged {
        call_id: String,
        phase: CallPhase,
    },
    /// A call is blocked until the confirmer answers
    ApprovalRequired {
        call_id: String,
        tool: String,
        description: String,
    },
    ToolCallCompleted {
        call_id: String,
        tool: String,
        is_error: bool,
    },
    RetryAttempt {
        attempt: usize,
        delay_ms: u64,
        reason: String,
    },
    /// The session switched to the fallback tier; emitted at most once
    FallbackEngaged {
        from: String,
        to: String,
    },
    CompactionCompleted {
        tokens_before: u64,
        tokens_after: u64,
        turns_summarized: usize,
    },
    /// Compaction failed; the turn proceeds with uncompacted history
    CompactionFailed {
        reason: String,
    },
    UsageReport {
        round_trip: usize,
        usage: Usage,
    },
    TurnCompleted {
        turn_id: Uuid,
        stop_reason: StopReason,
    },
    TurnFailed {
        turn_id: Uuid,
        error: String,
    },
}

/// Send an event on the turn's feed, ignoring a dropped receiver.
pub(crate) async fn emit(tx: &tokio::sync::mpsc::Sender<AgentEvent>, event: AgentEvent) {
    let _ = tx.send(event).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_round_trips, 10);
        assert_eq!(config.concurrency_limit, 4);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.compaction.trigger_ratio, 0.8);
        assert_eq!(config.compaction.keep_recent_turns, 4);
        assert_eq!(config.approval.mode, ApprovalMode::Default);
    }

    #[test]
    fn failed_outcome_renders_as_model_visible_error() {
        let outcome = CallOutcome::Failed {
            failure: CallFailure::ToolNotFound {
                name: "fetch_url".to_string(),
            },
        };
        assert!(outcome.is_error());
        let content = outcome.as_model_content();
        assert!(
            content["error"]
                .as_str()
                .is_some_and(|e| e.contains("fetch_url"))
        );
    }

    #[test]
    fn success_outcome_passes_payload_through() {
        let outcome = CallOutcome::Success {
            payload: json!({"stdout": "ok"}),
        };
        assert!(!outcome.is_error());
        assert_eq!(outcome.as_model_content(), json!({"stdout": "ok"}));
    }

    #[test]
    fn decision_predicates() {
        assert!(ApprovalDecision::ProceedAndRemember.proceeds());
        assert!(ApprovalDecision::ProceedAndRemember.remembers());
        assert!(!ApprovalDecision::Reject.proceeds());
        assert!(ApprovalDecision::RejectAndRemember.remembers());
    }

    #[test]
    fn terminal_phases() {
        assert!(CallPhase::Success.is_terminal());
        assert!(CallPhase::Cancelled.is_terminal());
        assert!(!CallPhase::AwaitingApproval.is_terminal());
        assert!(!CallPhase::Executing.is_terminal());
    }
}
