use crate::providers::stream::{LineParser, spawn_line_stream};
use crate::traits::{
    ChatMessage, ChatRequest, ChatResponse, Provider, ProviderEvent, ToolCall, ToolSpec,
};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaTool<'a>>>,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCallRequest<'a>>>,
}

#[derive(Debug, Serialize)]
struct OllamaToolCallRequest<'a> {
    function: OllamaFunctionRequest<'a>,
}

#[derive(Debug, Serialize)]
struct OllamaFunctionRequest<'a> {
    name: &'a str,
    arguments: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaTool<'a> {
    r#type: &'a str,
    function: OllamaToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct OllamaToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCallResponse>>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCallResponse {
    function: OllamaFunctionResponse,
}

#[derive(Debug, Deserialize)]
struct OllamaFunctionResponse {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    message: Option<OllamaResponseMessage>,
    error: Option<String>,
}

impl OllamaToolCallResponse {
    fn into_tool_call(self) -> ToolCall {
        let arguments = match self.function.arguments {
            serde_json::Value::Null => serde_json::json!({}),
            serde_json::Value::String(raw) => {
                return ToolCall::from_raw_arguments(ToolCall::generate_id(), self.function.name, &raw);
            }
            other => other,
        };
        ToolCall::new(ToolCall::generate_id(), self.function.name, arguments)
    }
}

/// Newline-delimited JSON chunks from `/api/chat`.
struct OllamaStreamParser;

impl LineParser for OllamaStreamParser {
    fn parse_line(&mut self, line: &str) -> Vec<ProviderEvent> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        let Ok(response) = serde_json::from_str::<StreamResponse>(line) else {
            return Vec::new();
        };
        if let Some(error) = response.error {
            return vec![ProviderEvent::Error(error)];
        }
        let Some(message) = response.message else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if let Some(thinking) = message.thinking
            && !thinking.is_empty()
        {
            events.push(ProviderEvent::Thinking(thinking));
        }
        if let Some(content) = message.content
            && !content.is_empty()
        {
            events.push(ProviderEvent::Token(content));
        }
        events.extend(
            message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| ProviderEvent::ToolCall(tc.into_tool_call())),
        );
        events
    }
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
}

impl OllamaProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.3,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<OllamaMessage<'_>> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = (!m.tool_calls().is_empty()).then(|| {
                    m.tool_calls()
                        .iter()
                        .map(|tc| OllamaToolCallRequest {
                            function: OllamaFunctionRequest {
                                name: &tc.name,
                                arguments: &tc.arguments,
                            },
                        })
                        .collect()
                });
                OllamaMessage {
                    role: m.role(),
                    content: m.content(),
                    tool_calls,
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<OllamaTool<'_>> {
        tools
            .iter()
            .map(|t| OllamaTool {
                r#type: "function",
                function: OllamaToolFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect()
    }

    async fn send(&self, request: ChatRequest<'_>, stream: bool) -> anyhow::Result<reqwest::Response> {
        let ollama_request = OllamaRequest {
            model: &self.model,
            messages: Self::convert_messages(request.messages),
            tools: request.tools.map(Self::convert_tools),
            options: OllamaOptions {
                temperature: self.temperature,
            },
            stream,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&ollama_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Ollama API error ({}): {}",
                status,
                error_text
            ));
        }

        Ok(response)
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let response = self.send(request, false).await?;
        let ollama_response: OllamaResponse = response.json().await?;

        let tool_calls: Vec<ToolCall> = ollama_response
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(OllamaToolCallResponse::into_tool_call)
            .collect();

        let text = ollama_response.message.content.filter(|c| !c.is_empty());
        if text.is_none() && tool_calls.is_empty() {
            return Err(anyhow::anyhow!(
                "Empty response from Ollama: no content or tool calls"
            ));
        }

        Ok(ChatResponse { text, tool_calls })
    }

    async fn chat_stream(
        &self,
        request: ChatRequest<'_>,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let response = self.send(request, true).await?;
        Ok(spawn_line_stream(response, OllamaStreamParser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn chat_sends_options_and_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "qwen2.5",
                "stream": false,
                "options": {"temperature": 0.3}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{"function": {"name": "get_stock_price", "arguments": {"symbol": "AAPL"}}}]
                },
                "done": true
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new()
            .with_base_url(server.uri())
            .with_model("qwen2.5");
        let messages = [ChatMessage::user("AAPL price?")];
        let response = provider
            .chat(ChatRequest {
                messages: &messages,
                tools: None,
            })
            .await
            .unwrap();

        assert!(response.text.is_none());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "get_stock_price");
        assert_eq!(response.tool_calls[0].arguments, json!({"symbol": "AAPL"}));
        assert!(response.tool_calls[0].id.starts_with("call_"));
    }

    #[tokio::test]
    async fn tool_results_use_tool_role() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "user"},
                    {"role": "assistant", "tool_calls": [{"function": {"name": "get_ip_address"}}]},
                    {"role": "tool", "content": "Your IP is 1.2.3.4"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "It's 1.2.3.4."}
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new().with_base_url(server.uri());
        let messages = [
            ChatMessage::user("my ip?"),
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("c1", "get_ip_address", json!({}))],
            ),
            ChatMessage::tool_result("c1", "Your IP is 1.2.3.4"),
        ];
        let response = provider
            .chat(ChatRequest {
                messages: &messages,
                tools: None,
            })
            .await
            .unwrap();
        assert_eq!(response.text.as_deref(), Some("It's 1.2.3.4."));
    }

    #[tokio::test]
    async fn stream_reads_ndjson() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n"
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new().with_base_url(server.uri());
        let messages = [ChatMessage::user("hi")];
        let events: Vec<ProviderEvent> = provider
            .chat_stream(ChatRequest {
                messages: &messages,
                tools: None,
            })
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                ProviderEvent::Token("Hel".into()),
                ProviderEvent::Token("lo".into()),
                ProviderEvent::Done,
            ]
        );
    }

    #[test]
    fn stream_error_line_becomes_error_event() {
        let events = OllamaStreamParser.parse_line(r#"{"error":"model not found"}"#);
        assert_eq!(events, vec![ProviderEvent::Error("model not found".into())]);
    }
}
