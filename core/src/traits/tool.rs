use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    /// Images for the host to display alongside the turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
    /// Key/value notes merged into the turn context.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<(String, String)>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            images: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Failure text that names the tool, so the model can reason about it.
    pub fn failure(tool: &str, error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            output: format!("Error: {error}\nTool used: {tool}"),
            images: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageRef>) -> Self {
        self.images = images;
        self
    }

    pub fn with_note(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.notes.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    /// True when the schema declares at least one property.
    pub fn has_parameters(&self) -> bool {
        self.parameters
            .get("properties")
            .and_then(|p| p.as_object())
            .is_some_and(|p| !p.is_empty())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult>;

    /// Runs the tool and folds any error or panic into a failure result.
    async fn invoke(&self, args: serde_json::Value) -> ToolResult {
        let outcome = AssertUnwindSafe(self.execute(args)).catch_unwind().await;
        let error = match outcome {
            Ok(Ok(result)) => return result,
            Ok(Err(e)) => format!("{:#}", e),
            Err(panic) => format!("tool panicked: {}", panic_message(panic.as_ref())),
        };
        tracing::debug!(tool = self.name(), error = %error, "Tool execution failed");
        ToolResult::failure(
            self.name(),
            format!("Unable to run {}. Details: {}", self.name(), error),
        )
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}
