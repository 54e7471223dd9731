//! Clients for the agent-configuration service (ACS) and the banker.

use async_trait::async_trait;
use bidder_core::config::CollaboratorConfig;
use bidder_core::types::AgentConfig;
use bidder_core::{BidderError, BidderResult};
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::debug;

/// Stores agent configurations, addressed by agent name.
#[async_trait]
pub trait AgentConfigStore: Send + Sync {
    async fn upsert(&self, name: &str, config: &AgentConfig) -> BidderResult<()>;
    async fn remove(&self, name: &str) -> BidderResult<()>;
}

/// Receives periodic balance targets for an account.
#[async_trait]
pub trait Banker: Send + Sync {
    async fn report_balance(&self, accounts: &[String], balance: i64) -> BidderResult<()>;
}

fn collaborator_error(e: reqwest::Error) -> BidderError {
    BidderError::Collaborator(e.to_string())
}

// ─── ACS ────────────────────────────────────────────────────────────────────

pub struct HttpAgentConfigStore {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAgentConfigStore {
    pub fn new(client: reqwest::Client, config: &CollaboratorConfig) -> Self {
        Self {
            client,
            base_url: config.base_url(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn url(&self, name: &str) -> String {
        format!("{}/v1/agents/{}/config", self.base_url, name)
    }
}

#[async_trait]
impl AgentConfigStore for HttpAgentConfigStore {
    async fn upsert(&self, name: &str, config: &AgentConfig) -> BidderResult<()> {
        let url = self.url(name);
        debug!(agent = name, url = %url, "Registering agent configuration");

        self.client
            .post(&url)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .json(config)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(collaborator_error)?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> BidderResult<()> {
        let url = self.url(name);
        debug!(agent = name, url = %url, "Removing agent configuration");

        self.client
            .delete(&url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(collaborator_error)?;
        Ok(())
    }
}

// ─── Banker ─────────────────────────────────────────────────────────────────

/// Currency/unit key of the balance body: micro-dollars.
pub const BALANCE_UNIT: &str = "USD/1M";

pub struct HttpBanker {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBanker {
    pub fn new(client: reqwest::Client, config: &CollaboratorConfig) -> Self {
        Self {
            client,
            base_url: config.base_url(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[async_trait]
impl Banker for HttpBanker {
    async fn report_balance(&self, accounts: &[String], balance: i64) -> BidderResult<()> {
        let url = format!("{}/v1/accounts/{}/balance", self.base_url, accounts.join(":"));
        let mut body = serde_json::Map::new();
        body.insert(BALANCE_UNIT.to_string(), balance.into());

        self.client
            .post(&url)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(collaborator_error)?;
        Ok(())
    }
}
