//! A configured bidding agent: its immutable definition, its process-local
//! state, and the per-request bid decision.

use crate::clients::Banker;
use crate::matcher::CreativeIndex;
use crate::pacer::PacingTask;
use bidder_core::openrtb::{Bid, BidRequest, SeatBid};
use bidder_core::types::{AgentConfig, AgentDefinition, Creative};
use bidder_core::{BidderError, BidderResult};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Priority attached to every bid's extension.
pub const BID_PRIORITY: f64 = 1.0;

/// A single demand agent. Shared between auction requests and its pacer.
pub struct BiddingAgent {
    definition: AgentDefinition,
    registered: AtomicBool,
    next_bid_id: AtomicU64,
    pacer: Mutex<Option<PacingTask>>,
}

impl BiddingAgent {
    pub fn new(definition: AgentDefinition) -> Self {
        Self {
            definition,
            registered: AtomicBool::new(false),
            next_bid_id: AtomicU64::new(0),
            pacer: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.definition.config
    }

    pub fn external_id(&self) -> i64 {
        self.definition.config.external_id
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub(crate) fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::Release);
    }

    /// Number of bid ids handed out since boot.
    pub fn bids_issued(&self) -> u64 {
        self.next_bid_id.load(Ordering::Relaxed)
    }

    fn allocate_bid_id(&self) -> String {
        self.next_bid_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn creative(&self, index: usize) -> BidderResult<&Creative> {
        let creatives = &self.definition.config.creatives;
        creatives.get(index).ok_or_else(|| BidderError::CreativeOutOfRange {
            agent: self.definition.name.clone(),
            index,
            available: creatives.len(),
        })
    }

    /// Bid on every impression this agent is eligible for, appending to `seat`.
    ///
    /// A random creative is picked from the exchange's candidate list for each
    /// impression. Candidates that point outside the agent's creative list are
    /// skipped. Returns whether at least one bid was placed.
    pub fn do_bid<R: Rng + ?Sized>(
        &self,
        request: &BidRequest,
        index: &CreativeIndex<'_>,
        seat: &mut SeatBid,
        rng: &mut R,
    ) -> bool {
        let external_id = self.external_id();
        let mut placed = 0usize;

        for imp in &request.imp {
            let Some(candidates) = index.candidates(&imp.id, external_id) else {
                continue;
            };
            let Some(&creative_index) = candidates.choose(rng) else {
                continue;
            };

            let creative = match self.creative(creative_index) {
                Ok(c) => c,
                Err(e) => {
                    error!(
                        request_id = %request.id,
                        impression_id = %imp.id,
                        error = %e,
                        "Skipping bid"
                    );
                    metrics::counter!("bidder.bids.creative_out_of_range").increment(1);
                    continue;
                }
            };

            seat.bid.push(Bid {
                id: self.allocate_bid_id(),
                impid: imp.id.clone(),
                price: self.definition.price,
                adid: None,
                nurl: None,
                adm: None,
                crid: Some(creative.id.to_string()),
                w: 0,
                h: 0,
                ext: Some(serde_json::json!({
                    "priority": BID_PRIORITY,
                    "external-id": external_id,
                })),
            });
            placed += 1;
        }

        if placed > 0 {
            metrics::counter!("bidder.bids", "agent" => self.definition.name.clone())
                .increment(placed as u64);
        }
        placed > 0
    }

    /// Start reporting this agent's balance to the banker.
    pub fn start_pacer(&self, banker: Arc<dyn Banker>, shutdown: &CancellationToken) {
        let mut pacer = self.pacer.lock();
        if pacer.is_some() {
            warn!(agent = %self.name(), "Pacer already running");
            return;
        }
        *pacer = Some(PacingTask::spawn(
            self.definition.name.clone(),
            self.definition.config.account.clone(),
            self.definition.balance,
            self.definition.pacing_period(),
            banker,
            shutdown,
        ));
    }

    /// Stop the pacer if one is running. A second call is a no-op.
    pub async fn stop_pacer(&self) {
        let task = self.pacer.lock().take();
        if let Some(task) = task {
            task.shutdown().await;
        }
    }

    pub fn is_pacing(&self) -> bool {
        self.pacer.lock().as_ref().is_some_and(|t| !t.is_stopped())
    }
}
