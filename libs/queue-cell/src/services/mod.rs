pub mod agent;
pub mod mapping;
pub mod queue;

pub use agent::{AgentError, AgentInput, AgentRunner, AzureAgentClient};
pub use mapping::MappingService;
pub use queue::QueueService;
