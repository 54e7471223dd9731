//! Auction dispatcher: runs one auction round across every configured agent.

use crate::agent::BiddingAgent;
use crate::matcher::CreativeIndex;
use bidder_core::openrtb::{BidRequest, BidResponse};
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Result of an auction round as seen by the exchange.
#[derive(Debug)]
pub enum AuctionOutcome {
    Bid(BidResponse),
    /// Nothing to offer, or the request could not be read.
    NoBid,
}

/// Runs auction rounds against a fixed, ordered list of agents.
///
/// Decisions are local: no outbound calls happen while deciding.
pub struct AuctionDispatcher {
    agents: Arc<[Arc<BiddingAgent>]>,
}

impl AuctionDispatcher {
    pub fn new(agents: Arc<[Arc<BiddingAgent>]>) -> Self {
        Self { agents }
    }

    pub fn agents(&self) -> &[Arc<BiddingAgent>] {
        &self.agents
    }

    /// Handle a raw request body. Unparsable bodies are answered with no bid
    /// and never reach an agent.
    pub fn handle(&self, body: &[u8]) -> AuctionOutcome {
        match BidRequest::from_slice(body) {
            Ok(request) => self.dispatch(&request),
            Err(e) => {
                warn!(error = %e, "Rejecting bid request");
                metrics::counter!("bidder.requests.malformed").increment(1);
                AuctionOutcome::NoBid
            }
        }
    }

    pub fn dispatch(&self, request: &BidRequest) -> AuctionOutcome {
        self.dispatch_with(request, &mut rand::thread_rng())
    }

    /// Run one round with the given source of randomness for creative rotation.
    ///
    /// Bids land in the single seat in agent configuration order, then in each
    /// agent's impression order.
    pub fn dispatch_with<R: Rng + ?Sized>(
        &self,
        request: &BidRequest,
        rng: &mut R,
    ) -> AuctionOutcome {
        let start = Instant::now();

        let index = CreativeIndex::build(request);
        let mut response = BidResponse::with_one_seat(request.id.clone());

        let mut any_bid = false;
        for agent in self.agents.iter() {
            any_bid |= agent.do_bid(request, &index, response.seat_mut(), rng);
        }

        metrics::counter!("bidder.auctions").increment(1);
        metrics::histogram!("bidder.auction.latency_us")
            .record(start.elapsed().as_micros() as f64);

        if any_bid {
            metrics::counter!("bidder.auctions.bid").increment(1);
            debug!(request_id = %request.id, bids = response.bid_count(), "Bidding");
            AuctionOutcome::Bid(response)
        } else {
            metrics::counter!("bidder.auctions.no_bid").increment(1);
            debug!(request_id = %request.id, "No bid");
            AuctionOutcome::NoBid
        }
    }
}
