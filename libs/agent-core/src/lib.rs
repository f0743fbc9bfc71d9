pub mod approval;
pub mod checkpoint;
pub mod compaction;
pub mod coordinator;
pub mod error;
pub mod generate;
pub mod history;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod stream;
pub mod types;

pub use approval::{
    ApprovalConfirmer, ApprovalPolicyEngine, DenyAllConfirmer, PolicyCheck, PolicyError,
};
pub use checkpoint::{CheckpointError, CheckpointRequest, CheckpointSink, NullCheckpointSink};
pub use compaction::{CompactionError, CompactionOutcome, HistoryCompactor};
pub use coordinator::TurnCoordinator;
pub use error::{AgentError, CallFailure};
pub use generate::FallbackController;
pub use history::{ConversationHistory, TurnKind, TurnRecord};
pub use registry::{InvocationResult, RiskClass, ToolCapability, ToolRegistry};
pub use retry::{exponential_backoff_ms, jittered_backoff};
pub use scheduler::ToolCallScheduler;
pub use stream::{AssemblyError, ToolCallAssembler};
pub use types::{
    AgentEvent, ApprovalConfig, ApprovalDecision, ApprovalMode, CallOrigin, CallOutcome,
    CallPhase, CompactionConfig, CompletedToolCall, RetryConfig, RuleAction, SessionConfig,
    StopReason, ToolCallRequest, ToolRule, TurnInput, TurnOutcome,
};
