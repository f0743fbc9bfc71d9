//! Tool call scheduling: validation, approval, bounded execution
//!
//! Every call in a batch moves through the same lifecycle
//! (`Validating -> AwaitingApproval -> Scheduled -> Executing`) and ends in
//! exactly one terminal phase. Calls run concurrently up to the configured
//! slot count, but the batch's results always come back in request order.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::approval::{ApprovalConfirmer, ApprovalPolicyEngine, PolicyCheck};
use crate::checkpoint::{CheckpointRequest, CheckpointSink};
use crate::error::CallFailure;
use crate::registry::{InvocationResult, RiskClass, ToolRegistry};
use crate::types::{
    AgentEvent, CallOutcome, CallPhase, CompletedToolCall, ToolCallRequest, emit,
};

pub struct ToolCallScheduler {
    registry: Arc<ToolRegistry>,
    policy: Arc<ApprovalPolicyEngine>,
    confirmer: Arc<dyn ApprovalConfirmer>,
    checkpoints: Arc<dyn CheckpointSink>,
    slots: Arc<Semaphore>,
}

impl ToolCallScheduler {
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: Arc<ApprovalPolicyEngine>,
        confirmer: Arc<dyn ApprovalConfirmer>,
        checkpoints: Arc<dyn CheckpointSink>,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            registry,
            policy,
            confirmer,
            checkpoints,
            slots: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    /// Run a batch of calls to completion.
    ///
    /// Never fails as a whole: each call lands in its own terminal state,
    /// and the returned list is in request order regardless of completion
    /// order.
    pub async fn run_batch(
        &self,
        batch: Vec<ToolCallRequest>,
        cancel: &CancellationToken,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Vec<CompletedToolCall> {
        let mut results: Vec<Option<CompletedToolCall>> = batch.iter().map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (index, request) in batch.iter().cloned().enumerate() {
            let runner = CallRunner {
                registry: Arc::clone(&self.registry),
                policy: Arc::clone(&self.policy),
                confirmer: Arc::clone(&self.confirmer),
                checkpoints: Arc::clone(&self.checkpoints),
                slots: Arc::clone(&self.slots),
                events: events.clone(),
                cancel: cancel.clone(),
            };
            tasks.spawn(async move { (index, runner.run(request).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, completed)) => {
                    if let Some(slot) = results.get_mut(index) {
                        *slot = Some(completed);
                    }
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "tool call task failed");
                }
            }
        }

        results
            .into_iter()
            .zip(batch)
            .map(|(slot, request)| {
                slot.unwrap_or_else(|| CompletedToolCall {
                    outcome: CallOutcome::Failed {
                        failure: CallFailure::Execution {
                            tool: request.name.clone(),
                            detail: "tool task aborted unexpectedly".to_string(),
                        },
                    },
                    request,
                    started_at: None,
                    finished_at: None,
                })
            })
            .collect()
    }
}

struct CallRunner {
    registry: Arc<ToolRegistry>,
    policy: Arc<ApprovalPolicyEngine>,
    confirmer: Arc<dyn ApprovalConfirmer>,
    checkpoints: Arc<dyn CheckpointSink>,
    slots: Arc<Semaphore>,
    events: mpsc::Sender<AgentEvent>,
    cancel: CancellationToken,
}

impl CallRunner {
    async fn run(self, request: ToolCallRequest) -> CompletedToolCall {
        let mut started_at = None;
        let outcome = self.drive(&request, &mut started_at).await;

        let terminal = match &outcome {
            CallOutcome::Success { .. } => CallPhase::Success,
            CallOutcome::Failed { .. } => CallPhase::Error,
            CallOutcome::Cancelled => CallPhase::Cancelled,
        };
        self.phase(&request.call_id, terminal).await;
        emit(
            &self.events,
            AgentEvent::ToolCallCompleted {
                call_id: request.call_id.clone(),
                tool: request.name.clone(),
                is_error: outcome.is_error(),
            },
        )
        .await;

        CompletedToolCall {
            request,
            outcome,
            started_at,
            finished_at: Some(Utc::now()),
        }
    }

    async fn drive(
        &self,
        request: &ToolCallRequest,
        started_at: &mut Option<DateTime<Utc>>,
    ) -> CallOutcome {
        self.phase(&request.call_id, CallPhase::Validating).await;
        let Some(tool) = self.registry.resolve(&request.name) else {
            return CallOutcome::Failed {
                failure: CallFailure::ToolNotFound {
                    name: request.name.clone(),
                },
            };
        };
        // A call that fails validation never reaches the approval gate.
        if let Err(detail) = tool.validate(&request.arguments) {
            return CallOutcome::Failed {
                failure: CallFailure::InvalidArguments {
                    tool: request.name.clone(),
                    detail,
                },
            };
        }
        if self.cancel.is_cancelled() {
            return CallOutcome::Cancelled;
        }

        self.phase(&request.call_id, CallPhase::AwaitingApproval).await;
        match self.policy.check(request, tool.risk_class()) {
            PolicyCheck::Proceed => {}
            PolicyCheck::Reject { reason } => {
                return CallOutcome::Failed {
                    failure: CallFailure::RejectedByPolicy {
                        tool: request.name.clone(),
                        reason,
                    },
                };
            }
            PolicyCheck::NeedsConfirmation => {
                let description = tool.confirmation_description(&request.arguments);
                emit(
                    &self.events,
                    AgentEvent::ApprovalRequired {
                        call_id: request.call_id.clone(),
                        tool: request.name.clone(),
                        description: description.clone(),
                    },
                )
                .await;

                let decision = tokio::select! {
                    _ = self.cancel.cancelled() => return CallOutcome::Cancelled,
                    decision = self.confirmer.confirm(request, &description) => decision,
                };
                self.policy.record_decision(request, decision);
                if !decision.proceeds() {
                    return CallOutcome::Failed {
                        failure: CallFailure::RejectedByPolicy {
                            tool: request.name.clone(),
                            reason: "rejected at the confirmation prompt".to_string(),
                        },
                    };
                }
            }
        }

        self.phase(&request.call_id, CallPhase::Scheduled).await;
        let _permit = tokio::select! {
            _ = self.cancel.cancelled() => return CallOutcome::Cancelled,
            permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return CallOutcome::Cancelled,
            },
        };

        if tool.risk_class() == RiskClass::Mutating {
            let checkpoint =
                CheckpointRequest::new(&request.call_id, &request.name, request.arguments.clone());
            if let Err(error) = self.checkpoints.snapshot(checkpoint).await {
                tracing::warn!(
                    call_id = %request.call_id,
                    error = %error,
                    "checkpoint snapshot failed, executing anyway"
                );
            }
        }

        self.phase(&request.call_id, CallPhase::Executing).await;
        *started_at = Some(Utc::now());
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return CallOutcome::Cancelled,
            result = tool.invoke(request.arguments.clone(), &self.cancel) => result,
        };

        match result {
            InvocationResult::Success(payload) => CallOutcome::Success { payload },
            InvocationResult::Failure(detail) => CallOutcome::Failed {
                failure: CallFailure::Execution {
                    tool: request.name.clone(),
                    detail,
                },
            },
            InvocationResult::Cancelled => CallOutcome::Cancelled,
        }
    }

    async fn phase(&self, call_id: &str, phase: CallPhase) {
        tracing::debug!(call_id, ?phase, "tool call phase change");
        emit(
            &self.events,
            AgentEvent::CallPhaseChanged {
                call_id: call_id.to_string(),
                phase,
            },
        )
        .await;
    }
}
