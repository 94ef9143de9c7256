pub mod gateway;
pub mod history;
pub mod loop_;
pub mod registry;

pub use gateway::{ModelGateway, ModelReply};
pub use history::{ConversationHistory, HistoryError};
pub use loop_::{
    AgentLoop, TERMINATION_NOTICE, TerminationSource, TurnContext, TurnOutcome, TurnReport,
};
pub use registry::{RegistryError, ToolRegistry};
