//! Approval policy engine: modes, session rules, and remembered decisions

use globset::{Glob, GlobMatcher};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::registry::RiskClass;
use crate::types::{ApprovalConfig, ApprovalDecision, ApprovalMode, RuleAction, ToolCallRequest};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid command pattern {pattern:?} for tool '{tool}': {source}")]
    InvalidPattern {
        tool: String,
        pattern: String,
        source: globset::Error,
    },
}

/// Verdict for one tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyCheck {
    Proceed,
    /// Park the call until the confirmer answers
    NeedsConfirmation,
    Reject { reason: String },
}

/// The seam through which confirmation prompts reach the user.
///
/// The scheduler awaits this for every call the policy parks; other calls in
/// the batch keep running meanwhile.
#[async_trait::async_trait]
pub trait ApprovalConfirmer: Send + Sync {
    async fn confirm(&self, request: &ToolCallRequest, description: &str) -> ApprovalDecision;
}

/// Confirmer for headless sessions with no prompt surface attached
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllConfirmer;

#[async_trait::async_trait]
impl ApprovalConfirmer for DenyAllConfirmer {
    async fn confirm(&self, _request: &ToolCallRequest, _description: &str) -> ApprovalDecision {
        ApprovalDecision::Reject
    }
}

struct CompiledRule {
    tool: String,
    matcher: Option<GlobMatcher>,
    pattern: Option<String>,
}

impl CompiledRule {
    fn matches(&self, request: &ToolCallRequest) -> bool {
        if self.tool != request.name {
            return false;
        }
        match &self.matcher {
            None => true,
            Some(matcher) => request
                .arguments
                .get("command")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|command| matcher.is_match(command)),
        }
    }
}

/// Decides whether each tool call proceeds, needs confirmation, or is
/// rejected.
///
/// Deny rules always win over allow rules. Remembered decisions from
/// `*AndRemember` confirmations short-circuit the mode logic for identical
/// calls within the session.
pub struct ApprovalPolicyEngine {
    mode: ApprovalMode,
    deny: Vec<CompiledRule>,
    allow: Vec<CompiledRule>,
    remembered: Mutex<HashMap<String, bool>>,
}

impl ApprovalPolicyEngine {
    pub fn new(config: &ApprovalConfig) -> Result<Self, PolicyError> {
        let mut deny = Vec::new();
        let mut allow = Vec::new();

        for rule in &config.rules {
            let matcher = match &rule.command_pattern {
                None => None,
                Some(pattern) => Some(
                    Glob::new(pattern)
                        .map_err(|source| PolicyError::InvalidPattern {
                            tool: rule.tool.clone(),
                            pattern: pattern.clone(),
                            source,
                        })?
                        .compile_matcher(),
                ),
            };
            let compiled = CompiledRule {
                tool: rule.tool.clone(),
                matcher,
                pattern: rule.command_pattern.clone(),
            };
            match rule.action {
                RuleAction::Deny => deny.push(compiled),
                RuleAction::Allow => allow.push(compiled),
            }
        }

        Ok(Self {
            mode: config.mode,
            deny,
            allow,
            remembered: Mutex::new(HashMap::new()),
        })
    }

    /// Check one validated call against rules, remembered decisions, and the
    /// session mode.
    pub fn check(&self, request: &ToolCallRequest, risk: RiskClass) -> PolicyCheck {
        if let Some(denied) = self.deny.iter().find(|rule| rule.matches(request)) {
            let reason = match &denied.pattern {
                Some(pattern) => format!("denied by session rule '{pattern}'"),
                None => "denied by session rule".to_string(),
            };
            return PolicyCheck::Reject { reason };
        }

        if let Ok(remembered) = self.remembered.lock()
            && let Some(proceed) = remembered.get(&Self::cache_key(request))
        {
            return if *proceed {
                PolicyCheck::Proceed
            } else {
                PolicyCheck::Reject {
                    reason: "previously rejected for this session".to_string(),
                }
            };
        }

        if self.allow.iter().any(|rule| rule.matches(request)) {
            return PolicyCheck::Proceed;
        }

        match self.mode {
            ApprovalMode::Unattended => PolicyCheck::Proceed,
            ApprovalMode::Default => match risk {
                RiskClass::ReadOnly => PolicyCheck::Proceed,
                RiskClass::Mutating => PolicyCheck::NeedsConfirmation,
            },
            ApprovalMode::Restricted => PolicyCheck::Reject {
                reason: "tool is not on the session allow-list".to_string(),
            },
        }
    }

    /// Record a confirmation answer; only `*AndRemember` decisions persist.
    pub fn record_decision(&self, request: &ToolCallRequest, decision: ApprovalDecision) {
        if !decision.remembers() {
            return;
        }
        if let Ok(mut remembered) = self.remembered.lock() {
            remembered.insert(Self::cache_key(request), decision.proceeds());
        }
    }

    // serde_json sorts object keys, so equal argument sets produce equal keys
    // regardless of the order the model emitted them in.
    fn cache_key(request: &ToolCallRequest) -> String {
        format!("{}\u{0}{}", request.name, request.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolRule;
    use serde_json::json;

    fn engine(mode: ApprovalMode, rules: Vec<ToolRule>) -> ApprovalPolicyEngine {
        ApprovalPolicyEngine::new(&ApprovalConfig { mode, rules }).unwrap()
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest::new("tc_1", name, arguments)
    }

    #[test]
    fn unattended_proceeds_without_confirmation() {
        let engine = engine(ApprovalMode::Unattended, vec![]);
        let check = engine.check(
            &call("run_command", json!({"command": "cargo fmt"})),
            RiskClass::Mutating,
        );
        assert_eq!(check, PolicyCheck::Proceed);
    }

    #[test]
    fn default_mode_splits_on_risk_class() {
        let engine = engine(ApprovalMode::Default, vec![]);
        let request = call("read_file", json!({"path": "a.txt"}));

        assert_eq!(engine.check(&request, RiskClass::ReadOnly), PolicyCheck::Proceed);
        assert_eq!(
            engine.check(&request, RiskClass::Mutating),
            PolicyCheck::NeedsConfirmation
        );
    }

    #[test]
    fn restricted_rejects_everything_off_the_allow_list() {
        let engine = engine(ApprovalMode::Restricted, vec![ToolRule::allow("read_file")]);

        assert_eq!(
            engine.check(&call("read_file", json!({})), RiskClass::ReadOnly),
            PolicyCheck::Proceed
        );
        assert!(matches!(
            engine.check(&call("write_file", json!({})), RiskClass::ReadOnly),
            PolicyCheck::Reject { .. }
        ));
    }

    #[test]
    fn deny_rule_wins_over_allow_rule_and_mode() {
        let engine = engine(
            ApprovalMode::Unattended,
            vec![
                ToolRule::allow("run_command"),
                ToolRule::deny("run_command").with_command_pattern("rm *"),
            ],
        );

        let check = engine.check(
            &call("run_command", json!({"command": "rm -rf build"})),
            RiskClass::Mutating,
        );
        assert!(matches!(check, PolicyCheck::Reject { reason } if reason.contains("rm *")));

        // Same tool with a non-matching command falls through to the allow rule
        let check = engine.check(
            &call("run_command", json!({"command": "ls -la"})),
            RiskClass::Mutating,
        );
        assert_eq!(check, PolicyCheck::Proceed);
    }

    #[test]
    fn command_pattern_rule_never_matches_calls_without_a_command() {
        let engine = engine(
            ApprovalMode::Unattended,
            vec![ToolRule::deny("run_command").with_command_pattern("rm *")],
        );

        let check = engine.check(&call("run_command", json!({})), RiskClass::Mutating);
        assert_eq!(check, PolicyCheck::Proceed);
    }

    #[test]
    fn remembered_approval_skips_future_confirmation() {
        let engine = engine(ApprovalMode::Default, vec![]);
        let request = call("write_file", json!({"path": "a.txt", "content": "x"}));

        assert_eq!(
            engine.check(&request, RiskClass::Mutating),
            PolicyCheck::NeedsConfirmation
        );

        engine.record_decision(&request, ApprovalDecision::ProceedAndRemember);
        assert_eq!(engine.check(&request, RiskClass::Mutating), PolicyCheck::Proceed);

        // Different arguments are a different call
        let other = call("write_file", json!({"path": "b.txt", "content": "x"}));
        assert_eq!(
            engine.check(&other, RiskClass::Mutating),
            PolicyCheck::NeedsConfirmation
        );
    }

    #[test]
    fn remembered_rejection_sticks() {
        let engine = engine(ApprovalMode::Default, vec![]);
        let request = call("write_file", json!({"path": "a.txt"}));

        engine.record_decision(&request, ApprovalDecision::RejectAndRemember);
        assert!(matches!(
            engine.check(&request, RiskClass::Mutating),
            PolicyCheck::Reject { .. }
        ));
    }

    #[test]
    fn plain_decisions_are_not_remembered() {
        let engine = engine(ApprovalMode::Default, vec![]);
        let request = call("write_file", json!({"path": "a.txt"}));

        engine.record_decision(&request, ApprovalDecision::Proceed);
        assert_eq!(
            engine.check(&request, RiskClass::Mutating),
            PolicyCheck::NeedsConfirmation
        );
    }

    #[test]
    fn invalid_pattern_is_a_construction_error() {
        let result = ApprovalPolicyEngine::new(&ApprovalConfig {
            mode: ApprovalMode::Default,
            rules: vec![ToolRule::deny("run_command").with_command_pattern("rm [")],
        });
        assert!(matches!(result, Err(PolicyError::InvalidPattern { .. })));
    }
}
