use thiserror::Error;

/// Turn-level failures that abort the whole turn.
///
/// Per-call failures never become an `AgentError`: they are captured in the
/// call's terminal state as a [`CallFailure`] and folded back into the
/// conversation as model-visible content.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model transport failed after retries: {0}")]
    ModelTransport(String),

    #[error("model quota exhausted and no fallback tier remains: {0}")]
    ModelQuota(String),

    #[error("model authentication failed: {0}")]
    ModelAuth(String),

    #[error("malformed model request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Policy(#[from] crate::approval::PolicyError),

    #[error("turn cancelled")]
    Cancelled,
}

impl From<tandemai::Error> for AgentError {
    fn from(error: tandemai::Error) -> Self {
        match error {
            tandemai::Error::Transport(message)
            | tandemai::Error::Stream(message)
            | tandemai::Error::Provider(message) => Self::ModelTransport(message),
            tandemai::Error::RateLimitExceeded(message) => Self::ModelQuota(message),
            tandemai::Error::AuthenticationFailed(message) => Self::ModelAuth(message),
            tandemai::Error::InvalidRequest(message) => Self::InvalidRequest(message),
        }
    }
}

/// Why a single tool call ended in its `Error` terminal state.
///
/// Every variant names the tool (and where relevant the argument or rule)
/// so the failure is specific enough to act on.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallFailure {
    #[error("tool not found: no tool named '{name}' is registered")]
    ToolNotFound { name: String },

    #[error("invalid arguments for tool '{tool}': {detail}")]
    InvalidArguments { tool: String, detail: String },

    #[error("tool '{tool}' rejected by policy: {reason}")]
    RejectedByPolicy { tool: String, reason: String },

    #[error("tool '{tool}' failed: {detail}")]
    Execution { tool: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_failures_name_the_tool_and_cause() {
        let failure = CallFailure::InvalidArguments {
            tool: "write_file".to_string(),
            detail: "missing required field 'path'".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "invalid arguments for tool 'write_file': missing required field 'path'"
        );

        let rejected = CallFailure::RejectedByPolicy {
            tool: "run_command".to_string(),
            reason: "denied by rule 'rm *'".to_string(),
        };
        assert!(rejected.to_string().contains("run_command"));
        assert!(rejected.to_string().contains("rm *"));
    }

    #[test]
    fn quota_errors_map_to_model_quota() {
        let error: AgentError = tandemai::Error::RateLimitExceeded("429".to_string()).into();
        assert!(matches!(error, AgentError::ModelQuota(_)));

        let error: AgentError = tandemai::Error::transport("reset").into();
        assert!(matches!(error, AgentError::ModelTransport(_)));
    }
}
