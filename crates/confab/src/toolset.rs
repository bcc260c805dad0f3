use async_trait::async_trait;

use crate::errors::AgentResult;
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// Core trait for a capability provider the agent can call into
#[async_trait]
pub trait Toolset: Send + Sync {
    /// Get the name of the toolset
    fn name(&self) -> &str;

    /// Get the toolset description
    fn description(&self) -> &str;

    /// Get usage instructions, rendered into the system prompt
    fn instructions(&self) -> &str;

    /// Get available tools
    fn tools(&self) -> &[Tool];

    /// Call a tool with the given arguments
    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>>;
}
