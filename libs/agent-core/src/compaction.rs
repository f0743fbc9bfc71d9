//! Budget-triggered history compaction
//!
//! When the flattened history's token estimate crosses the configured share
//! of the context budget, the oldest turns are replaced with a single
//! model-written summary. The most recent turns always survive verbatim.

use futures::StreamExt;
use tandemai::{ContentGenerator, GenerateRequest, Message, Model, Role, StreamEvent};
use thiserror::Error;

use crate::history::{ConversationHistory, TurnRecord};
use crate::types::CompactionConfig;

const SUMMARY_PROMPT: &str = "You are summarizing the beginning of a long conversation between \
a user and a coding agent so the conversation can continue within a limited context window. \
Write a dense, factual summary of the transcript below. Preserve: user goals and constraints, \
decisions made, files and commands involved, tool results that still matter, and any unresolved \
threads. Omit pleasantries and superseded attempts. Respond with the summary text only.";

#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("token estimate failed: {0}")]
    Estimate(String),

    #[error("summarization failed: {0}")]
    Summarize(String),
}

/// What a compaction pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    Compacted {
        tokens_before: u64,
        tokens_after: u64,
        turns_summarized: usize,
    },
    /// Below budget, disabled, or nothing old enough to summarize
    Skipped,
}

/// Runs the compaction check before each round trip.
pub struct HistoryCompactor {
    config: CompactionConfig,
}

impl HistoryCompactor {
    pub fn new(config: CompactionConfig) -> Self {
        Self { config }
    }

    /// Compact `history` in place if it is over budget.
    ///
    /// Compacting brings the history back under budget, so an immediate
    /// second call is a no-op.
    pub async fn maybe_compact(
        &self,
        history: &mut ConversationHistory,
        generator: &dyn ContentGenerator,
        model: &Model,
    ) -> Result<CompactionOutcome, CompactionError> {
        if !self.config.enabled {
            return Ok(CompactionOutcome::Skipped);
        }

        let tokens_before = self.estimate(history, generator, model).await?;
        let ceiling = self.config.token_ceiling.unwrap_or(model.limit.context);
        let threshold = (ceiling as f64 * self.config.trigger_ratio) as u64;
        if tokens_before <= threshold {
            return Ok(CompactionOutcome::Skipped);
        }

        // The most recent turn is never summarized away.
        let keep = self.config.keep_recent_turns.max(1);
        if history.len() <= keep {
            return Ok(CompactionOutcome::Skipped);
        }
        let count = history.len() - keep;

        let prefix: Vec<TurnRecord> = history.turns()[..count].to_vec();
        let summary = self.summarize(generator, model, &prefix).await?;

        history.replace_prefix(
            count,
            vec![Message::new(
                Role::User,
                format!("Summary of the conversation so far:\n\n{summary}"),
            )],
        );

        let tokens_after = self.estimate(history, generator, model).await?;
        tracing::info!(tokens_before, tokens_after, turns_summarized = count, "compacted history");

        Ok(CompactionOutcome::Compacted {
            tokens_before,
            tokens_after,
            turns_summarized: count,
        })
    }

    async fn estimate(
        &self,
        history: &ConversationHistory,
        generator: &dyn ContentGenerator,
        model: &Model,
    ) -> Result<u64, CompactionError> {
        generator
            .count_tokens(model, &history.flatten())
            .await
            .map_err(|e| CompactionError::Estimate(e.to_string()))
    }

    async fn summarize(
        &self,
        generator: &dyn ContentGenerator,
        model: &Model,
        prefix: &[TurnRecord],
    ) -> Result<String, CompactionError> {
        let transcript = render_transcript(prefix);
        let request = GenerateRequest::new(
            model.clone(),
            vec![
                Message::new(Role::System, SUMMARY_PROMPT),
                Message::new(Role::User, transcript),
            ],
        );

        let mut stream = generator
            .stream(&request)
            .await
            .map_err(|e| CompactionError::Summarize(e.to_string()))?;

        let mut summary = String::new();
        while let Some(event) = stream.next().await {
            match event.map_err(|e| CompactionError::Summarize(e.to_string()))? {
                StreamEvent::TextDelta { delta, .. } => summary.push_str(&delta),
                StreamEvent::Error { message } => return Err(CompactionError::Summarize(message)),
                StreamEvent::Finish { .. } => break,
                _ => {}
            }
        }

        if summary.trim().is_empty() {
            return Err(CompactionError::Summarize(
                "summarizer returned no text".to_string(),
            ));
        }
        Ok(summary)
    }
}

fn render_transcript(turns: &[TurnRecord]) -> String {
    let mut transcript = String::new();
    for turn in turns {
        for message in &turn.messages {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            for part in message.parts() {
                match part {
                    tandemai::ContentPart::Text { text } => {
                        transcript.push_str(&format!("{role}: {text}\n"));
                    }
                    tandemai::ContentPart::ToolCall { name, arguments, .. } => {
                        transcript.push_str(&format!("{role}: [called {name} with {arguments}]\n"));
                    }
                    tandemai::ContentPart::ToolResult { content, .. } => {
                        transcript.push_str(&format!("{role}: [tool result: {content}]\n"));
                    }
                }
            }
        }
    }
    transcript
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TurnKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tandemai::{FinishReason, GenerateStream, Usage};

    /// Counts 100 tokens per message and answers every stream with a fixed
    /// summary.
    struct StubGenerator {
        summary: &'static str,
        stream_calls: AtomicUsize,
    }

    impl StubGenerator {
        fn new(summary: &'static str) -> Self {
            Self {
                summary,
                stream_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentGenerator for StubGenerator {
        async fn stream(&self, _request: &GenerateRequest) -> tandemai::Result<GenerateStream> {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            Ok(GenerateStream::from_events(vec![
                Ok(StreamEvent::start("summary")),
                Ok(StreamEvent::text_delta("summary", self.summary)),
                Ok(StreamEvent::finish(Usage::new(10, 5), FinishReason::stop())),
            ]))
        }

        async fn count_tokens(&self, _model: &Model, messages: &[Message]) -> tandemai::Result<u64> {
            Ok(messages.len() as u64 * 100)
        }
    }

    fn history_with_turns(count: usize) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        for i in 0..count {
            let (kind, role) = if i % 2 == 0 {
                (TurnKind::User, Role::User)
            } else {
                (TurnKind::Assistant, Role::Assistant)
            };
            history.push(kind, vec![Message::new(role, format!("message {i}"))]);
        }
        history
    }

    fn compactor(ceiling: u64) -> HistoryCompactor {
        HistoryCompactor::new(CompactionConfig {
            enabled: true,
            token_ceiling: Some(ceiling),
            trigger_ratio: 0.8,
            keep_recent_turns: 4,
        })
    }

    #[tokio::test]
    async fn under_budget_is_skipped() {
        let generator = StubGenerator::new("unused");
        let mut history = history_with_turns(3);

        // 3 messages * 100 tokens, ceiling 1000 -> threshold 800
        let outcome = compactor(1_000)
            .maybe_compact(&mut history, &generator, &Model::custom("m"))
            .await
            .unwrap();

        assert_eq!(outcome, CompactionOutcome::Skipped);
        assert_eq!(generator.stream_calls.load(Ordering::SeqCst), 0);
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn over_budget_summarizes_all_but_recent_turns() {
        let generator = StubGenerator::new("the user asked ten things");
        let mut history = history_with_turns(10);
        let before = history.clone();

        // 10 messages * 100 tokens, ceiling 1000 -> threshold 800, over budget
        let outcome = compactor(1_000)
            .maybe_compact(&mut history, &generator, &Model::custom("m"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CompactionOutcome::Compacted {
                tokens_before: 1_000,
                tokens_after: 500,
                turns_summarized: 6,
            }
        );

        // summary + the 4 most recent turns, in their original order
        assert_eq!(history.len(), 5);
        assert_eq!(history.turns()[0].kind, TurnKind::Summary);
        assert!(
            history.turns()[0].messages[0]
                .text()
                .is_some_and(|t| t.contains("the user asked ten things"))
        );
        assert_eq!(history.turns()[1..], before.turns()[6..]);
    }

    #[tokio::test]
    async fn compaction_is_idempotent() {
        let generator = StubGenerator::new("summary");
        let mut history = history_with_turns(10);
        let compactor = compactor(1_000);
        let model = Model::custom("m");

        let first = compactor
            .maybe_compact(&mut history, &generator, &model)
            .await
            .unwrap();
        assert!(matches!(first, CompactionOutcome::Compacted { .. }));

        let after_first = history.clone();
        let second = compactor
            .maybe_compact(&mut history, &generator, &model)
            .await
            .unwrap();

        assert_eq!(second, CompactionOutcome::Skipped);
        assert_eq!(history, after_first);
        assert_eq!(generator.stream_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nothing_to_summarize_is_skipped_even_over_budget() {
        let generator = StubGenerator::new("unused");
        // Over budget but only 4 turns, all within keep_recent_turns
        let mut history = history_with_turns(4);

        let outcome = compactor(100)
            .maybe_compact(&mut history, &generator, &Model::custom("m"))
            .await
            .unwrap();

        assert_eq!(outcome, CompactionOutcome::Skipped);
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn summarizer_failure_surfaces_as_error() {
        struct FailingGenerator;

        #[async_trait]
        impl ContentGenerator for FailingGenerator {
            async fn stream(&self, _: &GenerateRequest) -> tandemai::Result<GenerateStream> {
                Err(tandemai::Error::transport("connection reset"))
            }
            async fn count_tokens(&self, _: &Model, messages: &[Message]) -> tandemai::Result<u64> {
                Ok(messages.len() as u64 * 100)
            }
        }

        let mut history = history_with_turns(10);
        let before = history.clone();

        let error = compactor(1_000)
            .maybe_compact(&mut history, &FailingGenerator, &Model::custom("m"))
            .await
            .unwrap_err();

        assert!(matches!(error, CompactionError::Summarize(_)));
        // History is untouched on failure
        assert_eq!(history, before);
    }
}
