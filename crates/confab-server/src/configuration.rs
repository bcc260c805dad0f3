use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use confab::agent::TurnConfig;
use confab::providers::configs::{AnthropicProviderConfig, ProviderConfig};
use confab::remote::RemoteToolsetConfig;
use confab::transcript::TrimConfig;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Anthropic {
        #[serde(default = "default_anthropic_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_temperature")]
        temperature: Option<f32>,
        #[serde(default = "default_max_tokens")]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    // Convert to the confab ProviderConfig
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::Anthropic {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::Anthropic(AnthropicProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolBackendSettings {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ToolBackendSettings {
    pub fn into_config(self) -> RemoteToolsetConfig {
        RemoteToolsetConfig {
            endpoint: self.endpoint,
            api_key: self.api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TurnSettings {
    #[serde(default = "default_trim_budget")]
    pub trim_budget: usize,
    #[serde(default = "default_include_system")]
    pub include_system: bool,
    #[serde(default = "default_streaming")]
    pub streaming: bool,
    #[serde(default)]
    pub max_steps: Option<u32>,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            trim_budget: default_trim_budget(),
            include_system: default_include_system(),
            streaming: default_streaming(),
            max_steps: None,
        }
    }
}

impl TurnSettings {
    pub fn into_config(self) -> TurnConfig {
        TurnConfig {
            trim: TrimConfig {
                max_messages: self.trim_budget,
                include_system: self.include_system,
            },
            streaming: self.streaming,
            max_steps: self.max_steps,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub tools: Option<ToolBackendSettings>,
    #[serde(default)]
    pub turn: TurnSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults
            .set_default("provider.host", default_anthropic_host())?
            .set_default("provider.model", default_model())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("CONFAB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Try to deserialize the configuration
        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Handle missing field errors specially
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Handle both NotFound and missing field message variants
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // Extract field name from error message "missing field `type`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_anthropic_host() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.7)
}

fn default_max_tokens() -> Option<i32> {
    Some(4096)
}

fn default_trim_budget() -> usize {
    10
}

fn default_include_system() -> bool {
    true
}

fn default_streaming() -> bool {
    true
}
