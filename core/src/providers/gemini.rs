use crate::providers::stream::{LineParser, sse_data, spawn_line_stream};
use crate::traits::{
    ChatMessage, ChatRequest, ChatResponse, Provider, ProviderEvent, ToolCall, ToolSpec,
};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTools>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing)]
    thought: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: GeminiContent,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

impl FunctionCall {
    fn into_tool_call(self) -> ToolCall {
        let args = match self.args {
            Value::Null => json!({}),
            other => other,
        };
        ToolCall::new(ToolCall::generate_id(), self.name, args)
    }
}

/// Gemini's schema dialect rejects `default` and `additionalProperties`.
fn gemini_schema(schema: &Value) -> Option<Value> {
    let has_properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty());
    has_properties.then(|| strip_unsupported(schema))
}

fn strip_unsupported(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                match key.as_str() {
                    "default" | "additionalProperties" => {}
                    "properties" => {
                        let props = value
                            .as_object()
                            .map(|props| {
                                props
                                    .iter()
                                    .map(|(name, prop)| (name.clone(), strip_unsupported(prop)))
                                    .collect()
                            })
                            .unwrap_or_default();
                        out.insert(key.clone(), Value::Object(props));
                    }
                    _ => {
                        out.insert(key.clone(), strip_unsupported(value));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_unsupported).collect()),
        other => other.clone(),
    }
}

/// Pulls `error.message` out of a Gemini error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn response_events(response: GeminiResponse) -> Vec<ProviderEvent> {
    let mut events = Vec::new();
    for part in response
        .candidates
        .into_iter()
        .flat_map(|c| c.content.parts)
    {
        if let Some(call) = part.function_call {
            events.push(ProviderEvent::ToolCall(call.into_tool_call()));
        } else if let Some(text) = part.text
            && !text.is_empty()
        {
            events.push(if part.thought {
                ProviderEvent::Thinking(text)
            } else {
                ProviderEvent::Token(text)
            });
        }
    }
    events
}

struct GeminiStreamParser;

impl LineParser for GeminiStreamParser {
    fn parse_line(&mut self, line: &str) -> Vec<ProviderEvent> {
        let Some(data) = sse_data(line) else {
            return Vec::new();
        };
        match serde_json::from_str::<GeminiResponse>(data) {
            Ok(response) if !response.candidates.is_empty() => response_events(response),
            _ => {
                let message = error_message(data);
                if message != data {
                    vec![ProviderEvent::Error(message)]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f64,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            base_url: DEFAULT_BASE_URL.to_string(),
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

    /// Consecutive tool results are folded into one user turn of
    /// `functionResponse` parts, named after the call they answer.
    fn convert_messages(messages: &[ChatMessage]) -> Vec<GeminiContent> {
        let mut call_names: HashMap<&str, &str> = HashMap::new();
        let mut contents: Vec<GeminiContent> = Vec::new();
        let mut pending_results: Vec<GeminiPart> = Vec::new();

        for message in messages {
            if let ChatMessage::Tool {
                tool_call_id,
                content,
            } = message
            {
                let name = call_names
                    .get(tool_call_id.as_str())
                    .copied()
                    .unwrap_or(tool_call_id.as_str());
                pending_results.push(GeminiPart {
                    function_response: Some(FunctionResponse {
                        name: name.to_string(),
                        response: json!({ "content": content }),
                    }),
                    ..GeminiPart::default()
                });
                continue;
            }

            if !pending_results.is_empty() {
                contents.push(GeminiContent {
                    role: "user".to_string(),
                    parts: std::mem::take(&mut pending_results),
                });
            }

            match message {
                ChatMessage::User { content } => contents.push(GeminiContent {
                    role: "user".to_string(),
                    parts: vec![GeminiPart::text(content.as_str())],
                }),
                ChatMessage::Assistant {
                    content,
                    tool_calls,
                } => {
                    let mut parts = Vec::new();
                    if !content.is_empty() || tool_calls.is_empty() {
                        parts.push(GeminiPart::text(content.as_str()));
                    }
                    for call in tool_calls {
                        call_names.insert(&call.id, &call.name);
                        parts.push(GeminiPart {
                            function_call: Some(FunctionCall {
                                name: call.name.clone(),
                                args: call.arguments.clone(),
                            }),
                            ..GeminiPart::default()
                        });
                    }
                    contents.push(GeminiContent {
                        role: "model".to_string(),
                        parts,
                    });
                }
                ChatMessage::Tool { .. } => {}
            }
        }

        if !pending_results.is_empty() {
            contents.push(GeminiContent {
                role: "user".to_string(),
                parts: pending_results,
            });
        }

        contents
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<GeminiTools> {
        if tools.is_empty() {
            return Vec::new();
        }
        vec![GeminiTools {
            function_declarations: tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: gemini_schema(&t.parameters),
                })
                .collect(),
        }]
    }

    async fn send(&self, request: ChatRequest<'_>, stream: bool) -> anyhow::Result<reqwest::Response> {
        let gemini_request = GeminiRequest {
            contents: Self::convert_messages(request.messages),
            tools: request.tools.map(Self::convert_tools).unwrap_or_default(),
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let url = if stream {
            format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model
            )
        } else {
            format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            )
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Gemini API error ({}): {}",
                status,
                error_message(&error_text)
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let response = self.send(request, false).await?;
        let gemini_response: GeminiResponse = response.json().await?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for event in response_events(gemini_response) {
            match event {
                ProviderEvent::Token(chunk) => text.push_str(&chunk),
                ProviderEvent::ToolCall(call) => tool_calls.push(call),
                _ => {}
            }
        }

        if text.trim().is_empty() && tool_calls.is_empty() {
            return Err(anyhow::anyhow!(
                "Empty response from Gemini: no content or tool calls"
            ));
        }

        Ok(ChatResponse {
            text: (!text.is_empty()).then_some(text),
            tool_calls,
        })
    }

    async fn chat_stream(
        &self,
        request: ChatRequest<'_>,
    ) -> anyhow::Result<BoxStream<'static, ProviderEvent>> {
        let response = self.send(request, true).await?;
        Ok(spawn_line_stream(response, GeminiStreamParser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("g-key").with_base_url(server.uri())
    }

    #[tokio::test]
    async fn chat_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash-exp:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": {"temperature": 0.3}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hi there"}]}}]
            })))
            .mount(&server)
            .await;

        let messages = [ChatMessage::user("hello")];
        let response = provider(&server)
            .chat(ChatRequest {
                messages: &messages,
                tools: None,
            })
            .await
            .unwrap();
        assert_eq!(response.text.as_deref(), Some("Hi there"));
        assert!(response.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn chat_parses_function_calls_and_declares_tools() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "tools": [{"functionDeclarations": [{"name": "get_news_headlines"}, {"name": "get_ip_address"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [
                    {"functionCall": {"name": "get_news_headlines", "args": {"category": "sports"}}}
                ]}}]
            })))
            .mount(&server)
            .await;

        let tools = [
            ToolSpec {
                name: "get_news_headlines".into(),
                description: "news".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {"category": {"type": "string", "default": "general"}}
                }),
            },
            ToolSpec {
                name: "get_ip_address".into(),
                description: "ip".into(),
                parameters: json!({"type": "object", "properties": {}}),
            },
        ];
        let messages = [ChatMessage::user("sports news")];
        let response = provider(&server)
            .chat(ChatRequest {
                messages: &messages,
                tools: Some(&tools),
            })
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "get_news_headlines");
        assert_eq!(response.tool_calls[0].arguments, json!({"category": "sports"}));
        assert!(response.tool_calls[0].id.starts_with("call_"));
    }

    #[tokio::test]
    async fn error_body_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let messages = [ChatMessage::user("hi")];
        let err = provider(&server)
            .chat(ChatRequest {
                messages: &messages,
                tools: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API key not valid"));
    }

    #[tokio::test]
    async fn stream_uses_sse_endpoint() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Sunny \"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"today.\"}]}}]}\r\n\r\n"
        );
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash-exp:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let messages = [ChatMessage::user("weather")];
        let events: Vec<ProviderEvent> = provider(&server)
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
                ProviderEvent::Token("Sunny ".into()),
                ProviderEvent::Token("today.".into()),
                ProviderEvent::Done,
            ]
        );
    }

    #[test]
    fn tool_results_become_function_responses() {
        let messages = [
            ChatMessage::user("ip and time?"),
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![
                    ToolCall::new("c1", "get_ip_address", json!({})),
                    ToolCall::new("c2", "get_time_in_timezone", json!({"timezone_name": "UTC"})),
                ],
            ),
            ChatMessage::tool_result("c1", "1.2.3.4"),
            ChatMessage::tool_result("c2", "12:00"),
        ];
        let contents = serde_json::to_value(GeminiProvider::convert_messages(&messages)).unwrap();

        assert_eq!(
            contents,
            json!([
                {"role": "user", "parts": [{"text": "ip and time?"}]},
                {"role": "model", "parts": [
                    {"functionCall": {"name": "get_ip_address", "args": {}}},
                    {"functionCall": {"name": "get_time_in_timezone", "args": {"timezone_name": "UTC"}}}
                ]},
                {"role": "user", "parts": [
                    {"functionResponse": {"name": "get_ip_address", "response": {"content": "1.2.3.4"}}},
                    {"functionResponse": {"name": "get_time_in_timezone", "response": {"content": "12:00"}}}
                ]}
            ])
        );
    }

    #[test]
    fn schema_drops_unsupported_keys() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "default": {"type": "string", "default": "x"},
                "category": {"type": "string", "default": "general"}
            },
            "required": ["category"]
        });
        assert_eq!(
            gemini_schema(&schema),
            Some(json!({
                "type": "object",
                "properties": {
                    "default": {"type": "string"},
                    "category": {"type": "string"}
                },
                "required": ["category"]
            }))
        );
        assert_eq!(gemini_schema(&json!({"type": "object", "properties": {}})), None);
    }

    #[test]
    fn stream_error_line_is_reported() {
        let events = GeminiStreamParser.parse_line(r#"data: {"error":{"message":"quota exceeded"}}"#);
        assert_eq!(events, vec![ProviderEvent::Error("quota exceeded".into())]);
    }
}
