use crate::providers::stream::{LineParser, sse_data, spawn_line_stream};
use crate::traits::{
    ChatMessage, ChatRequest, ChatResponse, Provider, ProviderEvent, ToolCall, ToolSpec,
};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool<'a>>>,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest<'a> {
    id: &'a str,
    r#type: &'a str,
    function: OpenAIFunctionRequest<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionRequest<'a> {
    name: &'a str,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool<'a> {
    r#type: &'a str,
    function: OpenAIToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

/// Tool-call fragments keyed by index until the stream finishes them.
#[derive(Default)]
struct OpenAIStreamParser {
    pending: BTreeMap<usize, (String, String, String)>,
}

impl OpenAIStreamParser {
    fn drain_pending(&mut self) -> Vec<ProviderEvent> {
        std::mem::take(&mut self.pending)
            .into_values()
            .map(|(id, name, args)| {
                let id = if id.is_empty() { ToolCall::generate_id() } else { id };
                ProviderEvent::ToolCall(ToolCall::from_raw_arguments(id, name, &args))
            })
            .collect()
    }
}

impl LineParser for OpenAIStreamParser {
    fn parse_line(&mut self, line: &str) -> Vec<ProviderEvent> {
        let Some(data) = sse_data(line) else {
            return Vec::new();
        };

        let response = match serde_json::from_str::<StreamResponse>(data) {
            Ok(response) => response,
            Err(_) => {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(data)
                    && let Some(message) = value.pointer("/error/message").and_then(|m| m.as_str())
                {
                    return vec![ProviderEvent::Error(message.to_string())];
                }
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        for choice in response.choices {
            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                events.push(ProviderEvent::Token(content));
            }

            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                let entry = self.pending.entry(fragment.index).or_default();
                if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
                    entry.0 = id;
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name.filter(|n| !n.is_empty()) {
                        entry.1 = name;
                    }
                    entry.2.push_str(&function.arguments.unwrap_or_default());
                }
            }

            if choice.finish_reason.as_deref() == Some("tool_calls") {
                events.extend(self.drain_pending());
            }
        }
        events
    }

    fn finish(&mut self) -> Vec<ProviderEvent> {
        self.drain_pending()
    }
}

pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f64,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn convert_messages<'a>(&self, messages: &'a [ChatMessage]) -> Vec<OpenAIMessage<'a>> {
        messages
            .iter()
            .map(|m| match m {
                ChatMessage::User { content } => OpenAIMessage {
                    role: "user",
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: None,
                },
                ChatMessage::Assistant {
                    content,
                    tool_calls,
                } => OpenAIMessage {
                    role: "assistant",
                    content: if content.is_empty() && !tool_calls.is_empty() {
                        None
                    } else {
                        Some(content)
                    },
                    tool_calls: (!tool_calls.is_empty()).then(|| {
                        tool_calls
                            .iter()
                            .map(|tc| OpenAIToolCallRequest {
                                id: &tc.id,
                                r#type: "function",
                                function: OpenAIFunctionRequest {
                                    name: &tc.name,
                                    arguments: raw_arguments(&tc.arguments),
                                },
                            })
                            .collect()
                    }),
                    tool_call_id: None,
                },
                ChatMessage::Tool {
                    tool_call_id,
                    content,
                } => OpenAIMessage {
                    role: "tool",
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: Some(tool_call_id),
                },
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<OpenAITool<'_>> {
        tools
            .iter()
            .map(|t| OpenAITool {
                r#type: "function",
                function: OpenAIToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect()
    }

    async fn send(&self, request: ChatRequest<'_>, stream: bool) -> anyhow::Result<reqwest::Response> {
        let openai_request = OpenAIRequest {
            model: &self.model,
            messages: self.convert_messages(request.messages),
            tools: request.tools.map(Self::convert_tools),
            temperature: self.temperature,
            stream,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&openai_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("OpenAI API error {}: {}", status, error_text));
        }

        Ok(response)
    }
}

/// Tool arguments as the JSON string OpenAI expects.
fn raw_arguments(arguments: &serde_json::Value) -> String {
    match arguments {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let response = self.send(request, false).await?;
        let openai_response: OpenAIResponse = response.json().await?;

        let message = openai_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("No choices in response"))?;

        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall::from_raw_arguments(c.id, c.function.name, &c.function.arguments))
            .collect();

        let has_content = message
            .content
            .as_ref()
            .is_some_and(|c| !c.trim().is_empty());
        if !has_content && tool_calls.is_empty() {
            return Err(anyhow::anyhow!(
                "Empty response from API: no content or tool calls"
            ));
        }

        Ok(ChatResponse {
            text: message.content,
            tool_calls,
        })
    }

    async fn chat_stream(
        &self,
        request: ChatRequest<'_>,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let response = self.send(request, true).await?;
        Ok(spawn_line_stream(response, OpenAIStreamParser::default()))
    }
}
