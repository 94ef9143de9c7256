use crate::traits::{ChatMessage, ChatRequest, Provider, ProviderEvent, ToolCall, ToolSpec};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::collections::HashSet;
use std::sync::Arc;

/// What the model decided on the single-shot call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Content(String),
    ToolCalls {
        content: String,
        calls: Vec<ToolCall>,
    },
}

/// A provider with the tool set bound to every request.
#[derive(Clone)]
pub struct ModelGateway {
    provider: Arc<dyn Provider>,
    tools: Vec<ToolSpec>,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            tools: Vec::new(),
        }
    }

    pub fn bind_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    fn request<'a>(&'a self, history: &'a [ChatMessage]) -> ChatRequest<'a> {
        ChatRequest {
            messages: history,
            tools: if self.tools.is_empty() {
                None
            } else {
                Some(self.tools.as_slice())
            },
        }
    }

    pub async fn complete_or_call(&self, history: &[ChatMessage]) -> Result<ModelReply> {
        let response = self
            .provider
            .chat(self.request(history))
            .await
            .with_context(|| format!("{} request failed", self.provider.name()))?;

        if response.has_tool_calls() {
            return Ok(ModelReply::ToolCalls {
                content: response.text_or_empty().to_string(),
                calls: unique_call_ids(response.tool_calls),
            });
        }

        match response.text {
            Some(text) => Ok(ModelReply::Content(text)),
            None => Err(anyhow::anyhow!(
                "{} returned neither content nor tool calls",
                self.provider.name()
            )),
        }
    }

    /// Text chunks of the final answer. Tool calls requested at this stage
    /// are not dispatched.
    pub async fn stream_completion(
        &self,
        history: &[ChatMessage],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let events = self
            .provider
            .chat_stream(self.request(history))
            .await
            .with_context(|| format!("{} stream request failed", self.provider.name()))?;

        let chunks = events
            .take_while(|event| futures_util::future::ready(*event != ProviderEvent::Done))
            .filter_map(|event| async move {
                match event {
                    ProviderEvent::Token(text) => Some(Ok(text)),
                    ProviderEvent::Error(message) => {
                        Some(Err(anyhow::anyhow!("Model stream failed: {message}")))
                    }
                    ProviderEvent::ToolCall(call) => {
                        tracing::warn!(tool = %call.name, "Ignoring tool call in final answer stream");
                        None
                    }
                    ProviderEvent::Thinking(_) | ProviderEvent::Done => None,
                }
            });

        Ok(chunks.boxed())
    }

    /// Final answer as a single chunk, for providers or configs without streaming.
    pub async fn complete_once(
        &self,
        history: &[ChatMessage],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let response = self
            .provider
            .chat(self.request(history))
            .await
            .with_context(|| format!("{} request failed", self.provider.name()))?;
        if response.has_tool_calls() {
            tracing::warn!(
                count = response.tool_calls.len(),
                "Ignoring tool calls in final answer"
            );
        }
        let text = response.text.unwrap_or_default();
        Ok(futures_util::stream::iter(std::iter::once(Ok(text))).boxed())
    }
}

/// Call ids must be unique within a turn; blank or repeated ones are replaced.
fn unique_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.trim().is_empty() || !seen.insert(call.id.clone()) {
                call.id = ToolCall::generate_id();
                seen.insert(call.id.clone());
            }
            call
        })
        .collect()
}
