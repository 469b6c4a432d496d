//! In-memory product search: tokenizer, inverted index, conjunctive filtering,
//! BM25 ranking and a rating-aware hybrid re-rank.

pub mod bm25;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hybrid;
pub mod index;
pub mod tokenizer;

use serde::Serialize;

pub use config::SearchConfig;
pub use corpus::{load_catalog, Corpus, Document, LoadedCatalog, SkippedRecord};
pub use engine::{Algorithm, IndexSnapshot, IndexState, SearchEngine, SearchHit, SearchPage};
pub use error::SearchError;
pub use index::{CorpusStats, InvertedIndex, Posting};
pub use tokenizer::Tokenizer;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult<Id> {
    pub doc_id: Id,
    pub score: f64,
}

/// Score descending, then id ascending.
pub fn sort_ranked<Id: Ord>(ranked: &mut [RankedResult<Id>]) {
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
}
