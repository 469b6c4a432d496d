use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    #[error("index has not been built")]
    IndexNotBuilt,
    #[error("unknown ranking algorithm `{0}` (expected `bm25` or `hybrid`)")]
    UnknownAlgorithm(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
