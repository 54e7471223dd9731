//! Creative matcher: maps (impression, external agent id) to the creative
//! indices the exchange allows for that pair.
//!
//! The index is rebuilt for every request and borrows the request's
//! impression ids, so it cannot outlive the auction round it was built for.

use bidder_core::openrtb::{BidRequest, Impression};
use bidder_core::{BidderError, BidderResult};
use serde::Deserialize;
use serde_json::Number;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Eligibility data as the exchange embeds it in `imp.ext`. Ids are read as
/// raw JSON numbers since some exchanges encode them as floats (`42.0`).
#[derive(Debug, Deserialize)]
struct RawEligibility {
    #[serde(rename = "external-ids")]
    external_ids: Vec<Number>,
    /// Keyed by the external id rendered as a decimal string.
    #[serde(rename = "creative-ids")]
    creative_ids: HashMap<String, Vec<Number>>,
}

#[derive(Debug)]
struct Eligibility {
    external_ids: Vec<i64>,
    creative_ids: HashMap<String, Vec<usize>>,
}

/// Integer value of `n`, accepting float encodings with no fractional part.
fn whole_number(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn parse_eligibility(imp: &Impression) -> BidderResult<Eligibility> {
    let malformed = |reason: String| BidderError::MalformedExtension {
        impression_id: imp.id.clone(),
        reason,
    };

    let ext = imp
        .ext
        .as_ref()
        .ok_or_else(|| malformed("missing ext".to_string()))?;
    let raw = RawEligibility::deserialize(ext).map_err(|e| malformed(e.to_string()))?;

    let external_ids = raw
        .external_ids
        .iter()
        .map(|n| {
            whole_number(n).ok_or_else(|| malformed(format!("external id {n} is not an integer")))
        })
        .collect::<BidderResult<Vec<_>>>()?;

    let mut creative_ids = HashMap::with_capacity(raw.creative_ids.len());
    for (external_id, indices) in raw.creative_ids {
        let indices = indices
            .iter()
            .map(|n| {
                whole_number(n)
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| malformed(format!("creative index {n} is not a valid index")))
            })
            .collect::<BidderResult<Vec<_>>>()?;
        creative_ids.insert(external_id, indices);
    }

    Ok(Eligibility {
        external_ids,
        creative_ids,
    })
}

/// Per-request creative eligibility index.
#[derive(Debug, Default)]
pub struct CreativeIndex<'a> {
    entries: HashMap<&'a str, HashMap<i64, Vec<usize>>>,
    skipped: usize,
}

impl<'a> CreativeIndex<'a> {
    /// Build the index from every impression of `request`.
    ///
    /// An impression whose extension is missing or does not match the expected
    /// schema contributes nothing; the rest of the request is still indexed.
    pub fn build(request: &'a BidRequest) -> Self {
        let mut index = Self::default();

        for imp in &request.imp {
            let eligibility = match parse_eligibility(imp) {
                Ok(e) => e,
                Err(e) => {
                    if imp.ext.is_some() {
                        warn!(request_id = %request.id, error = %e, "Skipping impression");
                    } else {
                        debug!(request_id = %request.id, error = %e, "Skipping impression");
                    }
                    metrics::counter!("bidder.impressions.malformed_ext").increment(1);
                    index.skipped += 1;
                    continue;
                }
            };

            let Eligibility {
                external_ids,
                mut creative_ids,
            } = eligibility;

            for external_id in external_ids {
                // An eligible agent without a creative list has nothing to show.
                if let Some(creatives) = creative_ids.remove(&external_id.to_string()) {
                    index
                        .entries
                        .entry(imp.id.as_str())
                        .or_default()
                        .insert(external_id, creatives);
                }
            }
        }

        index
    }

    /// Candidate creative indices for an impression and external agent id.
    /// Empty candidate lists are reported as absent.
    pub fn candidates(&self, impression_id: &str, external_id: i64) -> Option<&[usize]> {
        self.entries
            .get(impression_id)
            .and_then(|by_agent| by_agent.get(&external_id))
            .map(Vec::as_slice)
            .filter(|v| !v.is_empty())
    }

    /// Number of indexed (impression, external id) pairs.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of impressions skipped because of bad extension data.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(imps: serde_json::Value) -> BidRequest {
        serde_json::from_value(json!({"id": "r1", "imp": imps})).unwrap()
    }

    #[test]
    fn test_indexes_every_eligible_pair() {
        let req = request(json!([
            {"id": "1", "ext": {"external-ids": [42, 7], "creative-ids": {"42": [0, 1], "7": [2]}}},
            {"id": "2", "ext": {"external-ids": [7], "creative-ids": {"7": [0]}}}
        ]));
        let index = CreativeIndex::build(&req);

        assert_eq!(index.len(), 3);
        assert_eq!(index.candidates("1", 42), Some(&[0, 1][..]));
        assert_eq!(index.candidates("1", 7), Some(&[2][..]));
        assert_eq!(index.candidates("2", 7), Some(&[0][..]));
        assert_eq!(index.candidates("2", 42), None);
        assert_eq!(index.skipped(), 0);
    }

    #[test]
    fn test_malformed_impression_is_skipped_alone() {
        let req = request(json!([
            {"id": "bad-type", "ext": {"external-ids": "42", "creative-ids": {}}},
            {"id": "no-ext"},
            {"id": "missing-map", "ext": {"external-ids": [42]}},
            {"id": "bad-index", "ext": {"external-ids": [42], "creative-ids": {"42": [-1]}}},
            {"id": "good", "ext": {"external-ids": [42], "creative-ids": {"42": [3]}}}
        ]));
        let index = CreativeIndex::build(&req);

        assert_eq!(index.skipped(), 4);
        assert_eq!(index.len(), 1);
        assert_eq!(index.candidates("good", 42), Some(&[3][..]));
    }

    #[test]
    fn test_eligible_id_without_creatives_has_no_entry() {
        let req = request(json!([
            {"id": "1", "ext": {"external-ids": [42, 99], "creative-ids": {"42": [0], "99": []}}}
        ]));
        let index = CreativeIndex::build(&req);

        assert_eq!(index.candidates("1", 42), Some(&[0][..]));
        assert_eq!(index.candidates("1", 99), None);
        assert_eq!(index.candidates("1", 5), None);
    }

    #[test]
    fn test_unknown_ext_fields_are_ignored() {
        let req = request(json!([
            {"id": "1", "ext": {"external-ids": [1], "creative-ids": {"1": [0]}, "other": {"x": 1}}}
        ]));
        assert_eq!(CreativeIndex::build(&req).len(), 1);
    }

    #[test]
    fn test_float_encoded_ids_are_accepted_when_whole() {
        let req = request(json!([
            {"id": "1", "ext": {"external-ids": [42.0], "creative-ids": {"42": [0.0, 2]}}},
            {"id": "2", "ext": {"external-ids": [42.5], "creative-ids": {"42": [0]}}},
            {"id": "3", "ext": {"external-ids": [42], "creative-ids": {"42": [1.5]}}}
        ]));
        let index = CreativeIndex::build(&req);

        assert_eq!(index.candidates("1", 42), Some(&[0, 2][..]));
        assert_eq!(index.skipped(), 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_candidates_outlive_the_lookup_key() {
        let req = request(json!([
            {"id": "1", "ext": {"external-ids": [42], "creative-ids": {"42": [0]}}}
        ]));
        let index = CreativeIndex::build(&req);

        let found = {
            let key = String::from("1");
            index.candidates(&key, 42)
        };
        assert_eq!(found, Some(&[0][..]));
    }

    #[test]
    fn test_request_without_eligibility_builds_empty_index() {
        let req = request(json!([{"id": "1"}, {"id": "2", "ext": {}}]));
        let index = CreativeIndex::build(&req);

        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.skipped(), 2);
    }
}
