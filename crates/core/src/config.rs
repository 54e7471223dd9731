use crate::error::{BidderError, BidderResult};
use crate::types::AgentDefinition;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Root application configuration. Loaded from environment variables
/// with the prefix `RTB_BIDDER__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_agents_file")]
    pub agents_file: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_acs")]
    pub acs: CollaboratorConfig,
    #[serde(default = "default_banker")]
    pub banker: CollaboratorConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Listening ports. Each endpoint gets its own listener.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_auction_port")]
    pub auction_port: u16,
    #[serde(default = "default_win_port")]
    pub win_port: u16,
    #[serde(default = "default_event_port")]
    pub event_port: u16,
    #[serde(default = "default_error_port")]
    pub error_port: u16,
    /// Larger auction bodies are answered with no bid.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Address of an outbound HTTP collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorConfig {
    #[serde(default = "default_collaborator_host")]
    pub host: String,
    /// Defaulted per collaborator in [`AppConfig::load`].
    pub port: u16,
    #[serde(default = "default_collaborator_timeout_ms")]
    pub timeout_ms: u64,
}

impl CollaboratorConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_agents_file() -> String {
    "agents.json".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_auction_port() -> u16 {
    7654
}
fn default_win_port() -> u16 {
    7653
}
fn default_event_port() -> u16 {
    7652
}
fn default_error_port() -> u16 {
    7651
}
fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}
fn default_collaborator_host() -> String {
    "127.0.0.1".to_string()
}
const DEFAULT_ACS_PORT: u16 = 9986;
const DEFAULT_BANKER_PORT: u16 = 9985;
fn default_collaborator_timeout_ms() -> u64 {
    1000
}
fn default_acs() -> CollaboratorConfig {
    CollaboratorConfig {
        host: default_collaborator_host(),
        port: DEFAULT_ACS_PORT,
        timeout_ms: default_collaborator_timeout_ms(),
    }
}
fn default_banker() -> CollaboratorConfig {
    CollaboratorConfig {
        host: default_collaborator_host(),
        port: DEFAULT_BANKER_PORT,
        timeout_ms: default_collaborator_timeout_ms(),
    }
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            auction_port: default_auction_port(),
            win_port: default_win_port(),
            event_port: default_event_port(),
            error_port: default_error_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agents_file: default_agents_file(),
            api: ApiConfig::default(),
            acs: default_acs(),
            banker: default_banker(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::from_environment(
            config::Environment::with_prefix("RTB_BIDDER")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_environment(env: config::Environment) -> Result<Self, config::ConfigError> {
        // Collaborator ports differ per section, so a partial override such as
        // only `ACS__HOST` still needs the port filled in here.
        let config = config::Config::builder()
            .set_default("acs.port", i64::from(DEFAULT_ACS_PORT))?
            .set_default("banker.port", i64::from(DEFAULT_BANKER_PORT))?
            .add_source(env)
            .build()?;
        config.try_deserialize()
    }
}

/// Parse a JSON file holding a single agent definition.
pub fn load_agent(path: impl AsRef<Path>) -> BidderResult<AgentDefinition> {
    let data = std::fs::read(path.as_ref())?;
    let agent: AgentDefinition = serde_json::from_slice(&data)?;
    validate_agents(std::slice::from_ref(&agent))?;
    Ok(agent)
}

/// Parse a JSON file holding an array of agent definitions.
///
/// Any failure here is fatal at boot.
pub fn load_agents_from_file(path: impl AsRef<Path>) -> BidderResult<Vec<AgentDefinition>> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let agents = parse_agents(&data)?;
    tracing::info!(path = %path.display(), count = agents.len(), "Agents loaded");
    Ok(agents)
}

/// Parse and validate an agents document.
pub fn parse_agents(data: &[u8]) -> BidderResult<Vec<AgentDefinition>> {
    let agents: Vec<AgentDefinition> = serde_json::from_slice(data)?;
    validate_agents(&agents)?;
    Ok(agents)
}

fn validate_agents(agents: &[AgentDefinition]) -> BidderResult<()> {
    let mut names = HashSet::new();
    for agent in agents {
        if agent.name.is_empty() {
            return Err(BidderError::Config("agent name must not be empty".into()));
        }
        // The name addresses the agent's resource in the configuration service.
        if agent.name.contains('/') {
            return Err(BidderError::Config(format!(
                "agent name '{}' must not contain '/'",
                agent.name
            )));
        }
        if !names.insert(agent.name.as_str()) {
            return Err(BidderError::Config(format!(
                "duplicate agent name '{}'",
                agent.name
            )));
        }
        if agent.period == 0 {
            return Err(BidderError::Config(format!(
                "agent '{}' has a zero pacing period",
                agent.name
            )));
        }
    }
    Ok(())
}
