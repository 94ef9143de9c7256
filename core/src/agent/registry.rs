use crate::traits::{Tool, ToolResult, ToolSpec};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool '{0}' not found")]
    NotFound(String),
    #[error("Tool '{0}' is already registered")]
    Duplicate(String),
}

/// Fixed set of capabilities the model may call, built at start up.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        if self.find(tool.name()).is_some() {
            return Err(RegistryError::Duplicate(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.find(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, name: &str, args: serde_json::Value) -> ToolResult {
        match self.resolve(name) {
            Ok(tool) => tool.invoke(args).await,
            Err(e) => {
                tracing::warn!(tool = name, "Model requested an unregistered tool");
                ToolResult::failure(name, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
            let text = crate::tools::extract_string_arg(&args, "text")?;
            Ok(ToolResult::success(text))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        registry
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.resolve("ECHO").unwrap().name(), "echo");
        assert_eq!(registry.resolve("Echo").unwrap().name(), "echo");
    }

    #[test]
    fn resolve_unknown_is_not_found() {
        let registry = registry();
        let err = registry.resolve("get_horoscope").err().unwrap();
        assert_eq!(err, RegistryError::NotFound("get_horoscope".into()));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = registry();
        let err = registry.register(Arc::new(EchoTool)).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("echo".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn specs_follow_registration() {
        let specs = registry().specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert!(specs[0].has_parameters());
    }

    #[tokio::test]
    async fn execute_unknown_tool_reports_not_found() {
        let result = registry().execute("get_horoscope", json!({})).await;
        assert!(!result.success);
        assert!(result.output.contains("not found"));
        assert!(result.output.contains("get_horoscope"));
    }

    #[tokio::test]
    async fn execute_folds_errors_into_text() {
        let result = registry().execute("echo", json!({})).await;
        assert!(!result.success);
        assert!(result.output.contains("Missing 'text' parameter"));
        assert!(result.output.contains("Tool used: echo"));
    }

    #[tokio::test]
    async fn execute_returns_tool_output() {
        let result = registry().execute("echo", json!({"text": "hi"})).await;
        assert!(result.success);
        assert_eq!(result.output, "hi");
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "get_stock_price"
        }

        fn description(&self) -> &str {
            "Always panics"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
            panic!("index out of range");
        }
    }

    #[tokio::test]
    async fn execute_folds_panics_into_text() {
        let mut registry = registry();
        registry.register(Arc::new(PanickingTool)).unwrap();

        let result = registry.execute("get_stock_price", json!({})).await;
        assert!(!result.success);
        assert!(result.output.contains("Unable to run get_stock_price"));
        assert!(result.output.contains("tool panicked: index out of range"));
        assert!(result.output.ends_with("Tool used: get_stock_price"));

        let after = registry.execute("echo", json!({"text": "still here"})).await;
        assert_eq!(after.output, "still here");
    }
}
