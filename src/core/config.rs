//! Configuration management for the council
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/council/config.toml

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{CouncilError, Result};

/// Main configuration for the council
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Language-model service connection
    #[serde(default)]
    pub llm: LlmConfig,
    /// Model tiers
    #[serde(default)]
    pub models: ModelConfig,
    /// Turn and interjection behavior
    #[serde(default)]
    pub council: CouncilConfig,
    /// Conversation window sizing
    #[serde(default)]
    pub context: ContextConfig,
    /// Tool execution and remote servers
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Language-model service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the Messages API
    pub base_url: String,
    /// API key; read from the environment, never written to disk
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Higher-capability model used for primary drafting
    pub primary: String,
    /// Low-latency model used for relevance classification and interjections
    pub fast: String,
}

/// Turn assembly behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilConfig {
    /// Output ceiling for a primary turn
    pub max_response_tokens: u32,
    /// Output ceiling for an interjection
    pub interjection_max_tokens: u32,
    /// Output ceiling for the relevance oracle
    pub oracle_max_tokens: u32,
    /// Maximum tool round-trips per turn
    pub max_tool_rounds: usize,
    /// Chance that an idle agent interjects after a primary turn
    pub interjection_probability: f64,
    /// Whether to show debug output
    pub debug: bool,
}

/// Conversation window sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub min_capacity: usize,
    pub max_capacity: usize,
    /// Number of recent messages the complexity estimate looks at
    pub complexity_sample: usize,
    /// Evicted messages accumulated before a summary is requested
    pub summary_trigger: usize,
}

/// Tool execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Timeout applied to bindings that do not set their own
    pub default_timeout_secs: u64,
    /// How long an unreachable server is skipped before it is probed again
    pub reconnect_cooldown_secs: u64,
    /// Remote tool servers by id
    #[serde(default)]
    pub servers: BTreeMap<String, RemoteServerConfig>,
}

/// How to launch one remote tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("COUNCIL_LLM_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            primary: env::var("COUNCIL_PRIMARY_MODEL")
                .unwrap_or_else(|_| "claude-opus-4-1-20250805".to_string()),
            fast: env::var("COUNCIL_FAST_MODEL")
                .unwrap_or_else(|_| "claude-3-haiku-20240307".to_string()),
        }
    }
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            max_response_tokens: 400,
            interjection_max_tokens: 150,
            oracle_max_tokens: 30,
            max_tool_rounds: 3,
            interjection_probability: 0.3,
            debug: env::var("COUNCIL_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            min_capacity: 5,
            max_capacity: 15,
            complexity_sample: 5,
            summary_trigger: 10,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let mut servers = BTreeMap::new();
        servers.insert(
            "gilfoyle_aws".to_string(),
            RemoteServerConfig {
                command: "npx".to_string(),
                args: vec!["-y".into(), "@modelcontextprotocol/server-aws".into()],
                env: BTreeMap::from([("AWS_PROFILE".to_string(), "default".to_string())]),
                description: "AWS infrastructure management".to_string(),
            },
        );
        servers.insert(
            "judy_k8s".to_string(),
            RemoteServerConfig {
                command: "docker".to_string(),
                args: vec!["run".into(), "--rm".into(), "-i".into(), "mcp-k8s-server".into()],
                env: BTreeMap::new(),
                description: "Kubernetes cluster management".to_string(),
            },
        );

        Self {
            default_timeout_secs: 30,
            reconnect_cooldown_secs: 30,
            servers,
        }
    }
}

impl ToolsConfig {
    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_secs(self.reconnect_cooldown_secs)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("council")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(CouncilError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| CouncilError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text; the API key always comes from the environment
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| CouncilError::config(format!("Failed to parse config: {}", e)))?;
        config.llm.api_key = env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty());
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| CouncilError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CouncilError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| CouncilError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Reject settings the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.llm.base_url)
            .map_err(|e| CouncilError::config(format!("Invalid LLM base URL: {}", e)))?;

        if self.context.min_capacity == 0 || self.context.min_capacity > self.context.max_capacity {
            return Err(CouncilError::config(format!(
                "Context capacity range [{}, {}] is invalid",
                self.context.min_capacity, self.context.max_capacity
            )));
        }

        if !(0.0..=1.0).contains(&self.council.interjection_probability) {
            return Err(CouncilError::config(format!(
                "Interjection probability {} is outside [0, 1]",
                self.council.interjection_probability
            )));
        }

        if self.council.max_response_tokens == 0 {
            return Err(CouncilError::config("max_response_tokens must be positive"));
        }

        Ok(())
    }

    /// The API key, or the session-fatal missing-credentials error
    pub fn require_api_key(&self) -> Result<&str> {
        self.llm
            .api_key
            .as_deref()
            .ok_or_else(|| CouncilError::MissingCredentials("ANTHROPIC_API_KEY".to_string()))
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
