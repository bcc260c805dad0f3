//! Dispatch of model-issued tool calls to the toolsets that can serve them.

use serde_json::Value;

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};
use crate::toolset::Toolset;

/// The flat set of tools exposed to the agent, backed by one or more
/// toolsets. Tool names are unique across the registry; the first toolset
/// that registered a name serves it.
#[derive(Default)]
pub struct ToolRegistry {
    toolsets: Vec<Box<dyn Toolset>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a toolset to the registry
    pub fn add_toolset(&mut self, toolset: Box<dyn Toolset>) {
        self.toolsets.push(toolset);
    }

    pub fn toolsets(&self) -> &[Box<dyn Toolset>] {
        &self.toolsets
    }

    /// All tools across all toolsets as {name, schema} bindings
    pub fn tools(&self) -> Vec<Tool> {
        self.toolsets
            .iter()
            .flat_map(|toolset| toolset.tools().iter().cloned())
            .collect()
    }

    fn toolset_for(&self, tool_name: &str) -> Option<&dyn Toolset> {
        self.toolsets
            .iter()
            .find(|toolset| toolset.tools().iter().any(|tool| tool.name == tool_name))
            .map(|toolset| &**toolset)
    }

    /// Dispatch a single tool call to the toolset that serves it.
    ///
    /// Any failure (a request the model already got wrong, an unknown tool
    /// name, bad arguments, a backend error) comes back as an `Err` payload
    /// for the tool-result message rather than aborting the turn.
    pub async fn dispatch(&self, tool_call: AgentResult<ToolCall>) -> AgentResult<Vec<Content>> {
        let call = tool_call?;
        let toolset = self
            .toolset_for(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        let tool = toolset
            .tools()
            .iter()
            .find(|tool| tool.name == call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;
        check_required_arguments(&tool.input_schema, &call.arguments)?;

        tracing::debug!(tool = %call.name, toolset = %toolset.name(), "dispatching tool call");
        toolset.call(call).await
    }
}

/// Bind the argument payload against the tool's input schema: every
/// property the schema marks required must be present.
fn check_required_arguments(schema: &Value, arguments: &Value) -> AgentResult<()> {
    let required = match schema.get("required").and_then(|r| r.as_array()) {
        Some(required) => required,
        None => return Ok(()),
    };

    for property in required {
        let name = property.as_str().unwrap_or_default();
        if arguments.get(name).is_none() {
            return Err(AgentError::InvalidParameters(format!(
                "missing required argument '{}'",
                name
            )));
        }
    }
    Ok(())
}
