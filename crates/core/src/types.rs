use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An ad asset an agent may serve. Exchanges refer to creatives by their
/// position in the agent's creative list, not by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creative {
    #[serde(default)]
    pub format: String,
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Agent configuration as stored by the agent-configuration service.
///
/// Serialized verbatim as the body of the registration call, so field names
/// follow that service's schema. `augmentations` and `bid_control` are never
/// interpreted by the bidder, only cached and forwarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default)]
    pub account: Vec<String>,
    #[serde(default)]
    pub augmentations: Option<serde_json::Value>,
    #[serde(default)]
    pub bid_control: Option<serde_json::Value>,
    #[serde(default)]
    pub bid_probability: f64,
    #[serde(default)]
    pub creatives: Vec<Creative>,
    #[serde(default)]
    pub error_format: String,
    #[serde(default)]
    pub external: bool,
    pub external_id: i64,
    #[serde(default)]
    pub loss_format: String,
    #[serde(default)]
    pub min_time_available_ms: f64,
    #[serde(default)]
    pub win_format: String,
}

/// One entry of the agents file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub config: AgentConfig,
    /// Fixed price bid on every matched impression.
    pub price: f64,
    /// Pacing period in milliseconds.
    pub period: u64,
    /// Balance reported to the banker on every pacing tick.
    pub balance: i64,
}

impl AgentDefinition {
    pub fn pacing_period(&self) -> Duration {
        Duration::from_millis(self.period)
    }

    /// Banker account path, e.g. `hello:world`.
    pub fn account_path(&self) -> String {
        self.config.account.join(":")
    }
}
