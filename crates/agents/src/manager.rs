//! Agent registry: owns the configured agents and drives their lifecycle:
//! registration with the agent-configuration service, pacing, and teardown.

use crate::agent::BiddingAgent;
use crate::clients::{AgentConfigStore, Banker};
use bidder_core::types::AgentDefinition;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The fixed set of agents for this process. Membership never changes after
/// construction.
pub struct AgentRegistry {
    agents: Arc<[Arc<BiddingAgent>]>,
    store: Arc<dyn AgentConfigStore>,
    banker: Arc<dyn Banker>,
    shutdown: CancellationToken,
}

impl AgentRegistry {
    pub fn new(
        definitions: Vec<AgentDefinition>,
        store: Arc<dyn AgentConfigStore>,
        banker: Arc<dyn Banker>,
        shutdown: CancellationToken,
    ) -> Self {
        let agents: Vec<Arc<BiddingAgent>> = definitions
            .into_iter()
            .map(|d| Arc::new(BiddingAgent::new(d)))
            .collect();

        Self {
            agents: agents.into(),
            store,
            banker,
            shutdown,
        }
    }

    /// Shared, ordered view of the agents for the auction path.
    pub fn agents(&self) -> Arc<[Arc<BiddingAgent>]> {
        self.agents.clone()
    }

    /// Push the agent's configuration to the configuration service. A failure
    /// leaves the agent unregistered; it keeps bidding regardless.
    pub async fn register(&self, agent: &BiddingAgent) -> bool {
        match self.store.upsert(agent.name(), agent.config()).await {
            Ok(()) => {
                agent.set_registered(true);
                info!(agent = %agent.name(), "Agent registered");
                true
            }
            Err(e) => {
                error!(agent = %agent.name(), error = %e, "Agent registration failed");
                metrics::counter!("bidder.acs.failures").increment(1);
                false
            }
        }
    }

    /// Remove the agent's configuration. Best effort, no retry.
    pub async fn unregister(&self, agent: &BiddingAgent) -> bool {
        match self.store.remove(agent.name()).await {
            Ok(()) => {
                agent.set_registered(false);
                info!(agent = %agent.name(), "Agent unregistered");
                true
            }
            Err(e) => {
                warn!(agent = %agent.name(), error = %e, "Agent unregistration failed");
                metrics::counter!("bidder.acs.failures").increment(1);
                false
            }
        }
    }

    /// Register every agent and start its pacer.
    pub async fn start(&self) {
        for agent in self.agents.iter() {
            self.register(agent).await;
            agent.start_pacer(self.banker.clone(), &self.shutdown);
        }

        let registered = self.agents.iter().filter(|a| a.is_registered()).count();
        info!(count = self.agents.len(), registered, "All agents started");
    }

    /// Stop every pacer, then unregister every agent whether or not its
    /// registration succeeded.
    pub async fn stop(&self) {
        for agent in self.agents.iter() {
            agent.stop_pacer().await;
        }
        for agent in self.agents.iter() {
            self.unregister(agent).await;
        }
        info!(count = self.agents.len(), "All agents stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bidder_core::types::AgentConfig;
    use bidder_core::{BidderError, BidderResult};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeStore {
        rejected: HashSet<String>,
        calls: Mutex<Vec<(&'static str, String)>>,
    }

    #[async_trait]
    impl AgentConfigStore for FakeStore {
        async fn upsert(&self, name: &str, _config: &AgentConfig) -> BidderResult<()> {
            self.calls.lock().push(("upsert", name.to_string()));
            if self.rejected.contains(name) {
                return Err(BidderError::Collaborator("connection refused".into()));
            }
            Ok(())
        }

        async fn remove(&self, name: &str) -> BidderResult<()> {
            self.calls.lock().push(("remove", name.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingBanker {
        reports: AtomicUsize,
    }

    #[async_trait]
    impl Banker for CountingBanker {
        async fn report_balance(&self, _accounts: &[String], _balance: i64) -> BidderResult<()> {
            self.reports.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn definition(name: &str) -> AgentDefinition {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "config": {"account": ["acc", name], "externalId": 1, "creatives": []},
            "price": 1.0,
            "period": 100,
            "balance": 10
        }))
        .unwrap()
    }

    fn registry(store: Arc<FakeStore>, banker: Arc<CountingBanker>) -> AgentRegistry {
        AgentRegistry::new(
            vec![definition("a1"), definition("a2")],
            store,
            banker,
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_registers_and_paces_every_agent() {
        let store = Arc::new(FakeStore::default());
        let banker = Arc::new(CountingBanker::default());
        let registry = registry(store.clone(), banker.clone());

        registry.start().await;
        assert!(registry.agents().iter().all(|a| a.is_registered()));
        assert!(registry.agents().iter().all(|a| a.is_pacing()));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(banker.reports.load(Ordering::SeqCst), 6);

        registry.stop().await;
        assert!(registry.agents().iter().all(|a| !a.is_registered()));
        assert!(registry.agents().iter().all(|a| !a.is_pacing()));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(banker.reports.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_registration_does_not_block_boot() {
        let store = Arc::new(FakeStore {
            rejected: HashSet::from(["a1".to_string()]),
            ..Default::default()
        });
        let banker = Arc::new(CountingBanker::default());
        let registry = registry(store.clone(), banker);

        registry.start().await;
        let agents = registry.agents();
        assert!(!agents[0].is_registered());
        assert!(agents[1].is_registered());
        assert!(agents[0].is_pacing());

        registry.stop().await;
        let calls = store.calls.lock();
        assert_eq!(
            *calls,
            [
                ("upsert", "a1".to_string()),
                ("upsert", "a2".to_string()),
                ("remove", "a1".to_string()),
                ("remove", "a2".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_twice_is_harmless() {
        let store = Arc::new(FakeStore::default());
        let registry = registry(store.clone(), Arc::new(CountingBanker::default()));

        registry.start().await;
        registry.stop().await;
        registry.stop().await;

        assert_eq!(store.calls.lock().len(), 6);
    }
}
