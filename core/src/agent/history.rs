use crate::traits::{ChatMessage, ToolCall};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("tool result references unknown call id '{0}'")]
    UnknownCallId(String),
    #[error("call id '{0}' already has a result")]
    DuplicateResult(String),
}

/// Append-only message sequence for one turn.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
    open_calls: HashSet<String>,
    answered_calls: HashSet<String>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, tool_calls: Vec<ToolCall>) {
        self.open_calls
            .extend(tool_calls.iter().map(|call| call.id.clone()));
        self.messages
            .push(ChatMessage::assistant_with_tool_calls(content, tool_calls));
    }

    pub fn push_tool_result(
        &mut self,
        call_id: &str,
        content: impl Into<String>,
    ) -> Result<(), HistoryError> {
        if !self.open_calls.contains(call_id) {
            return Err(HistoryError::UnknownCallId(call_id.to_string()));
        }
        if !self.answered_calls.insert(call_id.to_string()) {
            return Err(HistoryError::DuplicateResult(call_id.to_string()));
        }
        self.messages.push(ChatMessage::tool_result(call_id, content));
        Ok(())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }
}
