pub mod agent;
pub mod clients;
pub mod dispatcher;
pub mod manager;
pub mod matcher;
pub mod pacer;

pub use agent::BiddingAgent;
pub use clients::{AgentConfigStore, Banker, HttpAgentConfigStore, HttpBanker};
pub use dispatcher::{AuctionDispatcher, AuctionOutcome};
pub use manager::AgentRegistry;
pub use matcher::CreativeIndex;
pub use pacer::PacingTask;
