pub mod agent;
pub mod config;
pub mod providers;
pub mod tools;
pub mod traits;

pub use agent::{AgentLoop, ModelGateway, ToolRegistry, TurnOutcome, TurnReport};
pub use config::*;
pub use providers::create_provider;
pub use tools::builtin_tools;
pub use traits::*;
