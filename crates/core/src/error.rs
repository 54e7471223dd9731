use thiserror::Error;

pub type BidderResult<T> = Result<T, BidderError>;

#[derive(Error, Debug)]
pub enum BidderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed bid request: {0}")]
    MalformedRequest(String),

    #[error("Malformed extension on impression {impression_id}: {reason}")]
    MalformedExtension {
        impression_id: String,
        reason: String,
    },

    #[error("Agent {agent} references creative index {index} but has {available} creatives")]
    CreativeOutOfRange {
        agent: String,
        index: usize,
        available: usize,
    },

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
