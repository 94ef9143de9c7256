use crate::agent::{ConversationHistory, ModelGateway, ModelReply, ToolRegistry};
use crate::traits::{ChatMessage, Renderer, ToolCall};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const TERMINATION_NOTICE: &str = "Execution stopped as requested.";

/// Where the termination token was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationSource {
    Content,
    ToolResult { tool: String, call_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Empty input; nothing was sent to the model.
    Ignored,
    /// The model answered directly without tools.
    Responded { content: String },
    /// The termination token halted the turn.
    Terminated { source: TerminationSource },
    /// Tools ran and the final answer was streamed.
    Answered { answer: String },
}

/// Notes tools hand back for the rest of the turn, e.g. `last_country`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnContext {
    notes: BTreeMap<String, String>,
}

impl TurnContext {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.notes.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.notes.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub history: Vec<ChatMessage>,
    pub context: TurnContext,
}

enum TurnState {
    ModelDeciding,
    Responding(String),
    Dispatching(Vec<ToolCall>),
    StreamingFinal,
    Done(TurnOutcome),
}

pub struct AgentLoop {
    gateway: ModelGateway,
    tool_registry: Arc<ToolRegistry>,
    termination_token: String,
    stream: bool,
}

impl AgentLoop {
    /// Binds the registry's tool specs to the gateway.
    pub fn new(gateway: ModelGateway, tool_registry: Arc<ToolRegistry>) -> Self {
        let gateway = gateway.bind_tools(tool_registry.specs());
        Self {
            gateway,
            tool_registry,
            termination_token: crate::config::DEFAULT_TERMINATION_TOKEN.to_string(),
            stream: true,
        }
    }

    /// An empty token disables the check.
    pub fn with_termination_token(mut self, token: impl Into<String>) -> Self {
        self.termination_token = token.into().to_lowercase();
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.stream = enabled;
        self
    }

    fn is_termination(&self, text: &str) -> bool {
        !self.termination_token.is_empty()
            && text.to_lowercase().contains(&self.termination_token)
    }

    /// Runs one turn: decide, dispatch at most one round of tool calls,
    /// then stream the final answer. Only model failures are returned as
    /// errors.
    pub async fn run_turn(&self, input: &str, renderer: &mut dyn Renderer) -> Result<TurnReport> {
        let mut history = ConversationHistory::new();
        let mut context = TurnContext::default();

        let input = input.trim();
        if input.is_empty() {
            return Ok(TurnReport {
                outcome: TurnOutcome::Ignored,
                history: Vec::new(),
                context,
            });
        }
        history.push_user(input);

        let mut state = TurnState::ModelDeciding;
        let outcome = loop {
            state = match state {
                TurnState::ModelDeciding => {
                    match self.gateway.complete_or_call(history.messages()).await? {
                        ModelReply::Content(content) => TurnState::Responding(content),
                        ModelReply::ToolCalls { content, calls } => {
                            debug!(count = calls.len(), "Model requested tool calls");
                            history.push_assistant(content, calls.clone());
                            TurnState::Dispatching(calls)
                        }
                    }
                }
                TurnState::Responding(content) => {
                    renderer.text_block(&content);
                    if self.is_termination(&content) {
                        renderer.termination_notice(TERMINATION_NOTICE);
                        TurnState::Done(TurnOutcome::Terminated {
                            source: TerminationSource::Content,
                        })
                    } else {
                        TurnState::Done(TurnOutcome::Responded { content })
                    }
                }
                TurnState::Dispatching(calls) => {
                    self.dispatch(calls, &mut history, &mut context, renderer)
                        .await?
                }
                TurnState::StreamingFinal => {
                    let answer = self.stream_final(history.messages(), renderer).await?;
                    TurnState::Done(TurnOutcome::Answered { answer })
                }
                TurnState::Done(outcome) => break outcome,
            };
        };

        info!(outcome = outcome_label(&outcome), messages = history.len(), "Turn finished");

        Ok(TurnReport {
            outcome,
            history: history.into_messages(),
            context,
        })
    }

    async fn dispatch(
        &self,
        calls: Vec<ToolCall>,
        history: &mut ConversationHistory,
        context: &mut TurnContext,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnState> {
        for call in calls {
            debug!(tool = %call.name, call_id = %call.id, "Dispatching tool call");
            let result = self
                .tool_registry
                .execute(&call.name, call.arguments)
                .await;

            for image in &result.images {
                renderer.image(&image.url, &image.caption);
            }
            for (key, value) in result.notes {
                context.set(key, value);
            }

            history
                .push_tool_result(&call.id, result.output.as_str())
                .with_context(|| format!("Model produced an invalid tool call id for {}", call.name))?;

            if self.is_termination(&result.output) {
                renderer.termination_notice(TERMINATION_NOTICE);
                return Ok(TurnState::Done(TurnOutcome::Terminated {
                    source: TerminationSource::ToolResult {
                        tool: call.name,
                        call_id: call.id,
                    },
                }));
            }
        }

        Ok(TurnState::StreamingFinal)
    }

    async fn stream_final(
        &self,
        history: &[ChatMessage],
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        let mut chunks = if self.stream {
            self.gateway.stream_completion(history).await?
        } else {
            self.gateway.complete_once(history).await?
        };

        let mut answer = String::new();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => {
                    renderer.stream_chunk(&chunk);
                    answer.push_str(&chunk);
                }
                Err(e) => {
                    renderer.finish_stream();
                    return Err(e);
                }
            }
        }
        renderer.finish_stream();

        Ok(answer)
    }
}

fn outcome_label(outcome: &TurnOutcome) -> &'static str {
    match outcome {
        TurnOutcome::Ignored => "ignored",
        TurnOutcome::Responded { .. } => "responded",
        TurnOutcome::Terminated { .. } => "terminated",
        TurnOutcome::Answered { .. } => "answered",
    }
}
