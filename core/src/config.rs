//! Ranking parameters and search defaults.
//!
//! Every field has a default, so a partial JSON file only overrides what it names.

use crate::error::SearchError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// BM25 term frequency saturation.
pub const BM25_K1: f64 = 1.2;

/// BM25 length normalization strength.
pub const BM25_B: f64 = 0.75;

/// Weight of the normalized BM25 score in the hybrid blend.
pub const HYBRID_BM25_WEIGHT: f64 = 0.8;

/// Weight of the normalized rating in the hybrid blend.
pub const HYBRID_RATING_WEIGHT: f64 = 0.2;

/// Top of the rating scale.
pub const MAX_RATING: f64 = 5.0;

pub const DEFAULT_TOP_K: usize = 20;

/// Upper bound on `k` accepted from callers over the network.
pub const MAX_K: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub k1: f64,
    pub b: f64,
    pub bm25_weight: f64,
    pub rating_weight: f64,
    pub max_rating: f64,
    pub default_top_k: usize,
    pub extra_stopwords: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k1: BM25_K1,
            b: BM25_B,
            bm25_weight: HYBRID_BM25_WEIGHT,
            rating_weight: HYBRID_RATING_WEIGHT,
            max_rating: MAX_RATING,
            default_top_k: DEFAULT_TOP_K,
            extra_stopwords: Vec::new(),
        }
    }
}

impl SearchConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: SearchConfig = serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_json_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        let invalid = |msg: String| -> Result<(), SearchError> { Err(SearchError::InvalidConfig(msg)) };
        if !(self.k1.is_finite() && self.k1 >= 0.0) {
            return invalid(format!("k1 must be a non-negative number, got {}", self.k1));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return invalid(format!("b must lie in [0, 1], got {}", self.b));
        }
        for (name, w) in [("bm25_weight", self.bm25_weight), ("rating_weight", self.rating_weight)] {
            if !(w.is_finite() && w >= 0.0) {
                return invalid(format!("{name} must be a non-negative number, got {w}"));
            }
        }
        if !(self.max_rating.is_finite() && self.max_rating > 0.0) {
            return invalid(format!("max_rating must be positive, got {}", self.max_rating));
        }
        Ok(())
    }

    pub fn bm25_params(&self) -> Bm25Params { Bm25Params { k1: self.k1, b: self.b } }

    pub fn hybrid_weights(&self) -> HybridWeights {
        HybridWeights { bm25: self.bm25_weight, rating: self.rating_weight, max_rating: self.max_rating }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: BM25_K1, b: BM25_B } }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub bm25: f64,
    pub rating: f64,
    pub max_rating: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self { bm25: HYBRID_BM25_WEIGHT, rating: HYBRID_RATING_WEIGHT, max_rating: MAX_RATING }
    }
}
