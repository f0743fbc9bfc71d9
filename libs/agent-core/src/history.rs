//! Turn-structured conversation history
//!
//! History is kept as whole turns rather than a flat message list so the
//! compactor can summarize a prefix of turns without splitting a round trip
//! in half. The system prompt is not part of history; the coordinator
//! prepends it to every request, which keeps it out of compaction's reach.

use serde::{Deserialize, Serialize};
use tandemai::Message;

/// What a turn record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// User input that opened a turn
    User,
    /// One round trip's assistant output (text and/or tool calls)
    Assistant,
    /// Tool results folded back for the next round trip
    ToolResults,
    /// Synthetic summary produced by compaction
    Summary,
}

/// One ordered slice of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Monotonic position; preserved across compaction for kept turns
    pub index: u64,
    pub kind: TurnKind,
    pub messages: Vec<Message>,
}

/// Append-only record of the conversation, mutated only by turn appends and
/// compaction splices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<TurnRecord>,
    next_index: u64,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, assigning it the next index. Returns the index.
    pub fn push(&mut self, kind: TurnKind, messages: Vec<Message>) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        self.turns.push(TurnRecord {
            index,
            kind,
            messages,
        });
        index
    }

    pub fn turns(&self) -> &[TurnRecord] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&TurnRecord> {
        self.turns.last()
    }

    /// Flatten the turns into the message list sent to the model
    pub fn flatten(&self) -> Vec<Message> {
        self.turns
            .iter()
            .flat_map(|turn| turn.messages.iter().cloned())
            .collect()
    }

    /// Replace the first `count` turns with a single summary turn.
    ///
    /// The summary inherits the first replaced turn's index, so the indices
    /// of the kept turns keep their original order.
    pub(crate) fn replace_prefix(&mut self, count: usize, summary_messages: Vec<Message>) {
        if count == 0 || count > self.turns.len() {
            return;
        }
        let index = self.turns[0].index;
        let summary = TurnRecord {
            index,
            kind: TurnKind::Summary,
            messages: summary_messages,
        };
        self.turns.splice(..count, std::iter::once(summary));
    }
}
