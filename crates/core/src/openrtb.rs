//! OpenRTB 2.x bid request/response types.
//!
//! Only the fields the bidder reads or writes are typed. Objects the bidder
//! never inspects (site, app, device, user) are carried as raw JSON so that an
//! exchange sending a shape we do not model is not rejected.

use serde::{Deserialize, Serialize};

/// Header carrying the protocol version on every bid response.
pub const OPENRTB_VERSION_HEADER: &str = "x-openrtb-version";

/// Protocol version announced to the exchange.
pub const OPENRTB_VERSION: &str = "2.1";

/// OpenRTB Bid Request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRequest {
    pub id: String,
    #[serde(default)]
    pub imp: Vec<Impression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
    #[serde(default)]
    pub tmax: u32,
    #[serde(default)]
    pub at: u32,
    #[serde(default)]
    pub cur: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

impl BidRequest {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> crate::BidderResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| crate::BidderError::MalformedRequest(e.to_string()))
    }
}

/// One placement on offer. `ext` holds the exchange's eligibility data and is
/// validated by the creative matcher, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Impression {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<serde_json::Value>,
    #[serde(default)]
    pub bidfloor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidfloorcur: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

/// OpenRTB Bid Response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidResponse {
    pub id: String,
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatBid {
    pub bid: Vec<Bid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub group: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub impid: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nurl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crid: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub w: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub h: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl BidResponse {
    /// An empty response correlated with `request_id`, holding exactly one seat.
    pub fn with_one_seat(request_id: impl Into<String>) -> Self {
        Self {
            id: request_id.into(),
            seatbid: vec![SeatBid::default()],
            bidid: None,
            cur: None,
            ext: None,
        }
    }

    /// The single seat bids are appended to.
    pub fn seat_mut(&mut self) -> &mut SeatBid {
        if self.seatbid.is_empty() {
            self.seatbid.push(SeatBid::default());
        }
        &mut self.seatbid[0]
    }

    pub fn bid_count(&self) -> usize {
        self.seatbid.iter().map(|s| s.bid.len()).sum()
    }
}
