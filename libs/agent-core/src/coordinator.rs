//! Turn coordination: the round-trip loop that drives a whole turn
//!
//! One turn is: fold the input into history, then loop model round trips.
//! Each round trip streams the model's response; proposed tool calls are
//! scheduled as a batch and their results folded back for the next round
//! trip. The loop ends when the model stops proposing calls, the round-trip
//! cap is hit, or the turn is cancelled.

use std::sync::Arc;
use tandemai::{
    ContentGenerator, ContentPart, FinishReason, GenerateOptions, GenerateRequest, Message, Model,
    Role, StreamEvent, Tool, Usage,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::approval::{ApprovalConfirmer, ApprovalPolicyEngine, PolicyError};
use crate::checkpoint::CheckpointSink;
use crate::compaction::{CompactionOutcome, HistoryCompactor};
use crate::error::AgentError;
use crate::generate::FallbackController;
use crate::history::{ConversationHistory, TurnKind};
use crate::registry::ToolRegistry;
use crate::scheduler::ToolCallScheduler;
use crate::stream::ToolCallAssembler;
use crate::types::{
    AgentEvent, CallOrigin, CompletedToolCall, SessionConfig, StopReason, ToolCallRequest,
    TurnInput, TurnOutcome, emit,
};

pub struct TurnCoordinator {
    config: SessionConfig,
    generator: Arc<dyn ContentGenerator>,
    registry: Arc<ToolRegistry>,
    controller: FallbackController,
    scheduler: ToolCallScheduler,
    compactor: HistoryCompactor,
}

impl TurnCoordinator {
    pub fn new(
        config: SessionConfig,
        generator: Arc<dyn ContentGenerator>,
        registry: Arc<ToolRegistry>,
        confirmer: Arc<dyn ApprovalConfirmer>,
        checkpoints: Arc<dyn CheckpointSink>,
    ) -> Result<Self, PolicyError> {
        let policy = Arc::new(ApprovalPolicyEngine::new(&config.approval)?);
        let scheduler = ToolCallScheduler::new(
            Arc::clone(&registry),
            policy,
            confirmer,
            checkpoints,
            config.concurrency_limit,
        );
        let controller = FallbackController::new(
            config.model.clone(),
            config.fallback_model.clone(),
            config.retry.clone(),
        );
        let compactor = HistoryCompactor::new(config.compaction.clone());
        Ok(Self {
            config,
            generator,
            registry,
            controller,
            scheduler,
            compactor,
        })
    }

    /// Run one turn to completion, streaming progress over `events`.
    ///
    /// History is mutated in place: the input, every round trip's assistant
    /// output, and every batch's tool results are appended as the turn
    /// progresses, so a failed turn keeps what happened before the failure.
    pub async fn run_turn(
        &self,
        history: &mut ConversationHistory,
        input: TurnInput,
        events: mpsc::Sender<AgentEvent>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        let turn_id = Uuid::new_v4();
        emit(&events, AgentEvent::TurnStarted { turn_id }).await;

        match self.drive_turn(turn_id, history, input, &events, &cancel).await {
            Ok(outcome) => {
                emit(
                    &events,
                    AgentEvent::TurnCompleted {
                        turn_id,
                        stop_reason: outcome.stop_reason,
                    },
                )
                .await;
                Ok(outcome)
            }
            Err(error) => {
                tracing::error!(%turn_id, error = %error, "turn failed");
                emit(
                    &events,
                    AgentEvent::TurnFailed {
                        turn_id,
                        error: error.to_string(),
                    },
                )
                .await;
                Err(error)
            }
        }
    }

    async fn drive_turn(
        &self,
        turn_id: Uuid,
        history: &mut ConversationHistory,
        input: TurnInput,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        if !input.text.is_empty() {
            history.push(TurnKind::User, vec![Message::new(Role::User, input.text)]);
        }

        if !input.client_calls.is_empty() {
            self.run_client_calls(history, input.client_calls, events, cancel)
                .await;
            if cancel.is_cancelled() {
                return Ok(outcome(turn_id, StopReason::Cancelled, 0, String::new(), Usage::default()));
            }
        }

        let mut text = String::new();
        let mut usage = Usage::default();
        let declarations = self.registry.declarations();

        for round_trip in 1..=self.config.max_round_trips {
            if cancel.is_cancelled() {
                return Ok(outcome(turn_id, StopReason::Cancelled, round_trip - 1, text, usage));
            }

            self.maybe_compact(history, events).await;
            emit(events, AgentEvent::RoundTripStarted { turn_id, round_trip }).await;

            let messages = self.request_messages(history);
            let generator = Arc::clone(&self.generator);
            let round = self
                .controller
                .run(cancel, events, |model| {
                    let generator = Arc::clone(&generator);
                    let messages = messages.clone();
                    let declarations = declarations.clone();
                    let events = events.clone();
                    let cancel = cancel.clone();
                    let max_output_tokens = self.config.max_output_tokens;
                    async move {
                        consume_round_trip(
                            generator,
                            model,
                            messages,
                            declarations,
                            max_output_tokens,
                            events,
                            cancel,
                        )
                        .await
                    }
                })
                .await?;

            let round = match round {
                RoundTripOutput::Cancelled => {
                    return Ok(outcome(turn_id, StopReason::Cancelled, round_trip, text, usage));
                }
                RoundTripOutput::Completed(round) => round,
            };

            usage.add(&round.usage);
            emit(
                events,
                AgentEvent::UsageReport {
                    round_trip,
                    usage: round.usage.clone(),
                },
            )
            .await;
            text.push_str(&round.text);

            let mut parts: Vec<ContentPart> = Vec::new();
            if !round.text.is_empty() {
                parts.push(ContentPart::text(round.text.clone()));
            }
            for request in &round.requests {
                parts.push(ContentPart::tool_call(
                    request.call_id.clone(),
                    request.name.clone(),
                    request.arguments.clone(),
                ));
            }
            if !parts.is_empty() {
                history.push(TurnKind::Assistant, vec![Message::new(Role::Assistant, parts)]);
            }

            if round.requests.is_empty() {
                return Ok(outcome(turn_id, StopReason::Completed, round_trip, text, usage));
            }

            emit(
                events,
                AgentEvent::ToolCallsProposed {
                    requests: round.requests.clone(),
                },
            )
            .await;
            let completed = self.scheduler.run_batch(round.requests, cancel, events).await;
            fold_results(history, &completed);

            if cancel.is_cancelled() {
                return Ok(outcome(turn_id, StopReason::Cancelled, round_trip, text, usage));
            }
        }

        Ok(outcome(
            turn_id,
            StopReason::RoundTripLimit,
            self.config.max_round_trips,
            text,
            usage,
        ))
    }

    /// Compaction failure never fails the turn; the round trip proceeds with
    /// the history as it stands.
    async fn maybe_compact(
        &self,
        history: &mut ConversationHistory,
        events: &mpsc::Sender<AgentEvent>,
    ) {
        let model = self.controller.active_model();
        match self
            .compactor
            .maybe_compact(history, self.generator.as_ref(), &model)
            .await
        {
            Ok(CompactionOutcome::Compacted {
                tokens_before,
                tokens_after,
                turns_summarized,
            }) => {
                emit(
                    events,
                    AgentEvent::CompactionCompleted {
                        tokens_before,
                        tokens_after,
                        turns_summarized,
                    },
                )
                .await;
            }
            Ok(CompactionOutcome::Skipped) => {}
            Err(error) => {
                tracing::warn!(error = %error, "history compaction failed, continuing uncompacted");
                emit(
                    events,
                    AgentEvent::CompactionFailed {
                        reason: error.to_string(),
                    },
                )
                .await;
            }
        }
    }

    /// Client-initiated calls run before the first round trip. Their results
    /// land in history the same way model-initiated ones do, so the model
    /// sees them on its first round trip.
    async fn run_client_calls(
        &self,
        history: &mut ConversationHistory,
        calls: Vec<ToolCallRequest>,
        events: &mpsc::Sender<AgentEvent>,
        cancel: &CancellationToken,
    ) {
        let calls: Vec<ToolCallRequest> = calls
            .into_iter()
            .map(ToolCallRequest::from_client)
            .collect();

        let parts: Vec<ContentPart> = calls
            .iter()
            .map(|call| {
                ContentPart::tool_call(
                    call.call_id.clone(),
                    call.name.clone(),
                    call.arguments.clone(),
                )
            })
            .collect();
        history.push(TurnKind::Assistant, vec![Message::new(Role::Assistant, parts)]);

        emit(
            events,
            AgentEvent::ToolCallsProposed {
                requests: calls.clone(),
            },
        )
        .await;
        let completed = self.scheduler.run_batch(calls, cancel, events).await;
        fold_results(history, &completed);
    }

    fn request_messages(&self, history: &ConversationHistory) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if !self.config.system_prompt.is_empty() {
            messages.push(Message::new(Role::System, self.config.system_prompt.clone()));
        }
        messages.extend(history.flatten());
        messages
    }
}

fn outcome(
    turn_id: Uuid,
    stop_reason: StopReason,
    round_trips: usize,
    text: String,
    usage: Usage,
) -> TurnOutcome {
    TurnOutcome {
        turn_id,
        stop_reason,
        round_trips,
        text,
        usage,
    }
}

/// Results go back in request order, keyed by call id, with failures folded
/// as model-visible error content.
fn fold_results(history: &mut ConversationHistory, completed: &[CompletedToolCall]) {
    let parts: Vec<ContentPart> = completed
        .iter()
        .map(|call| {
            ContentPart::tool_result(call.request.call_id.clone(), call.outcome.as_model_content())
        })
        .collect();
    history.push(TurnKind::ToolResults, vec![Message::new(Role::Tool, parts)]);
}

#[derive(Debug)]
struct RoundTrip {
    text: String,
    requests: Vec<ToolCallRequest>,
    usage: Usage,
}

#[derive(Debug)]
enum RoundTripOutput {
    Completed(RoundTrip),
    Cancelled,
}

/// Drive one model stream to its finish event.
///
/// Deltas are forwarded to the event feed as they arrive; on a retried
/// round trip the deltas already shown stand, and the retry re-streams from
/// the top.
async fn consume_round_trip(
    generator: Arc<dyn ContentGenerator>,
    model: Model,
    messages: Vec<Message>,
    declarations: Vec<Tool>,
    max_output_tokens: Option<u32>,
    events: mpsc::Sender<AgentEvent>,
    cancel: CancellationToken,
) -> Result<RoundTripOutput, tandemai::Error> {
    use futures::StreamExt;

    let mut options = GenerateOptions::new();
    if let Some(max_tokens) = max_output_tokens {
        options = options.max_tokens(max_tokens);
    }
    let request = GenerateRequest::new(model, messages)
        .with_options(options)
        .with_tools(declarations);

    let mut stream = generator.stream(&request).await?;
    let mut assembler = ToolCallAssembler::new();
    let mut text = String::new();
    let mut finish: Option<(Usage, FinishReason)> = None;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return Ok(RoundTripOutput::Cancelled),
            event = stream.next() => event,
        };
        let Some(event) = event else { break };

        match event? {
            StreamEvent::Start { .. } => {}
            StreamEvent::TextDelta { delta, .. } => {
                text.push_str(&delta);
                emit(&events, AgentEvent::TextDelta { delta }).await;
            }
            StreamEvent::ReasoningDelta { delta, .. } => {
                emit(&events, AgentEvent::ThoughtDelta { delta }).await;
            }
            StreamEvent::ToolCallStart { id, name } => assembler.start(&id, &name),
            StreamEvent::ToolCallDelta { id, delta } => assembler.delta(&id, &delta),
            StreamEvent::ToolCallEnd { id, name, arguments } => {
                assembler.end(&id, &name, arguments);
            }
            StreamEvent::Finish { usage, reason } => {
                finish = Some((usage, reason));
                break;
            }
            StreamEvent::Error { message } => {
                return Err(tandemai::Error::stream_error(message));
            }
        }
    }

    let Some((usage, _reason)) = finish else {
        return Err(tandemai::Error::stream_error(
            "stream ended without a finish event",
        ));
    };
    let requests = assembler
        .finish(CallOrigin::Model)
        .map_err(|e| tandemai::Error::stream_error(e.to_string()))?;

    Ok(RoundTripOutput::Completed(RoundTrip {
        text,
        requests,
        usage,
    }))
}
