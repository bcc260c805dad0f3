//! A toolset served by a remote capability provider.
//!
//! The backend exposes a catalog of tools and a per-tool invocation
//! endpoint. The catalog is fetched once when the toolset connects;
//! invocations are one request per call.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};
use crate::toolset::Toolset;

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteToolsetConfig {
    /// Base URL of the tool backend
    pub endpoint: String,
    /// Bearer token for the backend, if it requires one
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolSpec {
    name: String,
    #[serde(default)]
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    content: Vec<Content>,
}

pub struct RemoteToolset {
    client: Client,
    config: RemoteToolsetConfig,
    tools: Vec<Tool>,
    instructions: String,
}

impl RemoteToolset {
    /// Connect to the backend and fetch its tool catalog.
    ///
    /// Discovery happens once here; a backend that changes its catalog
    /// needs a reconnect.
    pub async fn connect(config: RemoteToolsetConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let url = format!("{}/tools", config.endpoint.trim_end_matches('/'));
        let mut request = client.get(&url);
        if let Some(api_key) = &config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(anyhow!(
                "tool discovery failed: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            ));
        }

        let specs: Vec<ToolSpec> = response.json().await?;
        let tools = specs
            .into_iter()
            .map(|spec| Tool::new(spec.name, spec.description, spec.input_schema))
            .collect::<Vec<_>>();

        tracing::info!(endpoint = %config.endpoint, count = tools.len(), "connected to tool backend");

        let instructions = format!(
            "Tools in this set are executed by a remote backend at {}. \
             Results arrive as tool output; errors are reported in the result body.",
            config.endpoint
        );

        Ok(Self {
            client,
            config,
            tools,
            instructions,
        })
    }

    async fn invoke(&self, tool_call: &ToolCall) -> AgentResult<Vec<Content>> {
        let url = format!(
            "{}/tools/{}",
            self.config.endpoint.trim_end_matches('/'),
            tool_call.name
        );

        let mut request = self.client.post(&url).json(&tool_call.arguments);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: InvokeResponse = response
                    .json()
                    .await
                    .map_err(|e| AgentError::ExecutionError(e.to_string()))?;
                Ok(body.content)
            }
            StatusCode::NOT_FOUND => Err(AgentError::ToolNotFound(tool_call.name.clone())),
            StatusCode::BAD_REQUEST => {
                let error_text = response.text().await.unwrap_or_default();
                Err(AgentError::InvalidParameters(error_text))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                tracing::warn!(%status, tool = %tool_call.name, "tool backend error");
                Err(AgentError::ExecutionError(format!(
                    "{} - {}",
                    status, error_text
                )))
            }
        }
    }
}

#[async_trait]
impl Toolset for RemoteToolset {
    fn name(&self) -> &str {
        "remote"
    }

    fn description(&self) -> &str {
        "Tools served by a remote capability backend"
    }

    fn instructions(&self) -> &str {
        &self.instructions
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        self.invoke(&tool_call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn connect_with_catalog(server: &MockServer) -> RemoteToolset {
        Mock::given(method("GET"))
            .and(path("/tools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "name": "calculator",
                    "description": "Evaluate an arithmetic expression",
                    "input_schema": {
                        "type": "object",
                        "properties": {"expr": {"type": "string"}},
                        "required": ["expr"]
                    }
                }
            ])))
            .mount(server)
            .await;

        RemoteToolset::connect(RemoteToolsetConfig {
            endpoint: server.uri(),
            api_key: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_discovery_fetches_catalog() {
        let server = MockServer::start().await;
        let toolset = connect_with_catalog(&server).await;

        assert_eq!(toolset.tools().len(), 1);
        assert_eq!(toolset.tools()[0].name, "calculator");
    }

    #[tokio::test]
    async fn test_invoke_returns_content() {
        let server = MockServer::start().await;
        let toolset = connect_with_catalog(&server).await;

        Mock::given(method("POST"))
            .and(path("/tools/calculator"))
            .and(body_json(json!({"expr": "2+2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "4"}]
            })))
            .mount(&server)
            .await;

        let result = toolset
            .call(ToolCall::new("calculator", json!({"expr": "2+2"})))
            .await
            .unwrap();
        assert_eq!(result[0].as_text(), Some("4"));
    }

    #[tokio::test]
    async fn test_invoke_error_is_soft() {
        let server = MockServer::start().await;
        let toolset = connect_with_catalog(&server).await;

        Mock::given(method("POST"))
            .and(path("/tools/calculator"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
            .mount(&server)
            .await;

        let result = toolset
            .call(ToolCall::new("calculator", json!({"expr": "2+2"})))
            .await;
        assert!(matches!(result, Err(AgentError::ExecutionError(_))));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_hard() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tools"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = RemoteToolset::connect(RemoteToolsetConfig {
            endpoint: server.uri(),
            api_key: None,
        })
        .await;
        assert!(result.is_err());
    }
}
