//! Assembles tool-call requests out of interleaved stream deltas
//!
//! Providers may emit a call's arguments either as buffered JSON fragments
//! (`ToolCallDelta`) or fully formed on `ToolCallEnd`; both shapes end up as
//! the same [`ToolCallRequest`]. Request order is the order calls first
//! appeared in the stream.

use serde_json::Value;
use thiserror::Error;

use crate::types::{CallOrigin, ToolCallRequest};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("invalid arguments JSON for tool call '{call_id}' ({tool}): {detail}")]
    InvalidArgumentsJson {
        call_id: String,
        tool: String,
        detail: String,
    },

    #[error("tool call '{call_id}' finished without a tool name")]
    MissingToolName { call_id: String },
}

#[derive(Debug)]
struct Slot {
    call_id: String,
    name: String,
    buffer: String,
    final_arguments: Option<Value>,
}

/// Accumulates tool-call fragments for one round trip.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    slots: Vec<Slot>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record the start of a call. Repeated starts for the same id reuse the
    /// existing slot.
    pub fn start(&mut self, call_id: &str, name: &str) {
        match self.slot_mut(call_id) {
            Some(slot) => {
                if slot.name.is_empty() {
                    slot.name = name.to_string();
                }
            }
            None => self.slots.push(Slot {
                call_id: call_id.to_string(),
                name: name.to_string(),
                buffer: String::new(),
                final_arguments: None,
            }),
        }
    }

    /// Append an arguments fragment. A delta for an unseen id opens a slot,
    /// since some providers skip the start event.
    pub fn delta(&mut self, call_id: &str, fragment: &str) {
        match self.slot_mut(call_id) {
            Some(slot) => slot.buffer.push_str(fragment),
            None => self.slots.push(Slot {
                call_id: call_id.to_string(),
                name: String::new(),
                buffer: fragment.to_string(),
                final_arguments: None,
            }),
        }
    }

    /// Record a call's completion with its final name and arguments.
    pub fn end(&mut self, call_id: &str, name: &str, arguments: Value) {
        match self.slot_mut(call_id) {
            Some(slot) => {
                if slot.name.is_empty() {
                    slot.name = name.to_string();
                }
                slot.final_arguments = Some(arguments);
            }
            None => self.slots.push(Slot {
                call_id: call_id.to_string(),
                name: name.to_string(),
                buffer: String::new(),
                final_arguments: Some(arguments),
            }),
        }
    }

    /// Finalize all calls in arrival order, parsing any buffered fragments.
    pub fn finish(self, origin: CallOrigin) -> Result<Vec<ToolCallRequest>, AssemblyError> {
        let mut requests = Vec::with_capacity(self.slots.len());
        for slot in self.slots {
            if slot.name.is_empty() {
                return Err(AssemblyError::MissingToolName {
                    call_id: slot.call_id,
                });
            }

            let arguments = match slot.final_arguments {
                Some(arguments) => arguments,
                None if slot.buffer.trim().is_empty() => Value::Object(Default::default()),
                None => serde_json::from_str(&slot.buffer).map_err(|e| {
                    AssemblyError::InvalidArgumentsJson {
                        call_id: slot.call_id.clone(),
                        tool: slot.name.clone(),
                        detail: e.to_string(),
                    }
                })?,
            };

            requests.push(ToolCallRequest {
                call_id: slot.call_id,
                name: slot.name,
                arguments,
                origin,
            });
        }
        Ok(requests)
    }

    fn slot_mut(&mut self, call_id: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.call_id == call_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assembles_buffered_fragments() {
        let mut assembler = ToolCallAssembler::new();
        assembler.start("tc_1", "run_command");
        assembler.delta("tc_1", "{\"comm");
        assembler.delta("tc_1", "and\": \"ls\"}");

        let requests = assembler.finish(CallOrigin::Model).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "run_command");
        assert_eq!(requests[0].arguments, json!({"command": "ls"}));
    }

    #[test]
    fn end_arguments_win_over_buffer() {
        let mut assembler = ToolCallAssembler::new();
        assembler.start("tc_1", "read_file");
        assembler.delta("tc_1", "{\"partial");
        assembler.end("tc_1", "read_file", json!({"path": "a.txt"}));

        let requests = assembler.finish(CallOrigin::Model).unwrap();
        assert_eq!(requests[0].arguments, json!({"path": "a.txt"}));
    }

    #[test]
    fn preserves_arrival_order_across_interleaved_deltas() {
        let mut assembler = ToolCallAssembler::new();
        assembler.start("tc_1", "first");
        assembler.start("tc_2", "second");
        assembler.delta("tc_2", "{}");
        assembler.delta("tc_1", "{}");

        let requests = assembler.finish(CallOrigin::Model).unwrap();
        let names: Vec<&str> = requests.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn empty_buffer_becomes_empty_object() {
        let mut assembler = ToolCallAssembler::new();
        assembler.start("tc_1", "list_files");

        let requests = assembler.finish(CallOrigin::Model).unwrap();
        assert_eq!(requests[0].arguments, json!({}));
    }

    #[test]
    fn end_without_start_is_accepted() {
        let mut assembler = ToolCallAssembler::new();
        assembler.end("tc_1", "read_file", json!({"path": "a.txt"}));

        let requests = assembler.finish(CallOrigin::Model).unwrap();
        assert_eq!(requests[0].call_id, "tc_1");
        assert_eq!(requests[0].name, "read_file");
    }

    #[test]
    fn malformed_buffered_json_is_an_error() {
        let mut assembler = ToolCallAssembler::new();
        assembler.start("tc_1", "run_command");
        assembler.delta("tc_1", "{\"command\": ");

        let error = assembler.finish(CallOrigin::Model).unwrap_err();
        assert!(matches!(error, AssemblyError::InvalidArgumentsJson { .. }));
        assert!(error.to_string().contains("tc_1"));
    }

    #[test]
    fn delta_only_call_without_name_is_an_error() {
        let mut assembler = ToolCallAssembler::new();
        assembler.delta("tc_1", "{}");

        let error = assembler.finish(CallOrigin::Model).unwrap_err();
        assert!(matches!(error, AssemblyError::MissingToolName { .. }));
    }
}
