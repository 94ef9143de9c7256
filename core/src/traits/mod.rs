pub mod provider;
pub mod render;
pub mod tool;

pub use provider::{ChatMessage, ChatRequest, ChatResponse, Provider, ProviderEvent, ToolCall};
pub use render::Renderer;
pub use tool::{ImageRef, Tool, ToolResult, ToolSpec};
