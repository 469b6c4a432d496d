//! Search orchestration over an immutable, atomically swapped index snapshot.
//!
//! The engine starts [`IndexState::Unbuilt`]. [`SearchEngine::build_index`] builds a
//! complete [`IndexSnapshot`] without holding the lock, then publishes it in one swap, so
//! concurrent searches see either the previous snapshot or the new one.

use crate::config::SearchConfig;
use crate::corpus::{Corpus, Document};
use crate::error::SearchError;
use crate::index::{CorpusStats, InvertedIndex};
use crate::tokenizer::Tokenizer;
use crate::{bm25, filter, hybrid, RankedResult};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Bm25,
    /// BM25 re-ranked with product rating.
    Hybrid,
}

impl FromStr for Algorithm {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bm25" => Ok(Algorithm::Bm25),
            "hybrid" | "your_score" => Ok(Algorithm::Hybrid),
            _ => Err(SearchError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Bm25 => "bm25",
            Algorithm::Hybrid => "hybrid",
        })
    }
}

/// Everything a search reads, built once from a corpus and never mutated.
#[derive(Debug)]
pub struct IndexSnapshot<Id> {
    pub index: InvertedIndex<Id>,
    pub stats: CorpusStats,
    ratings: HashMap<Id, f64>,
    corpus: Arc<Corpus<Id>>,
}

impl<Id: Clone + Eq + Hash + Ord + fmt::Debug> IndexSnapshot<Id> {
    pub fn build(tokenizer: &Tokenizer, corpus: Arc<Corpus<Id>>, max_rating: f64) -> Self {
        let index = InvertedIndex::build(tokenizer, corpus.iter());
        let stats = index.stats();

        let mut ratings = HashMap::new();
        for (doc_id, doc) in corpus.iter() {
            match doc.average_rating {
                None => {}
                Some(r) if !r.is_finite() => tracing::warn!(?doc_id, "ignoring non-finite rating"),
                Some(r) if !(0.0..=max_rating).contains(&r) => {
                    tracing::warn!(?doc_id, rating = r, max_rating, "rating out of range, clamping");
                    ratings.insert(doc_id.clone(), r.clamp(0.0, max_rating.max(0.0)));
                }
                Some(r) => {
                    ratings.insert(doc_id.clone(), r);
                }
            }
        }
        Self { index, stats, ratings, corpus }
    }

    pub fn corpus(&self) -> &Corpus<Id> { &self.corpus }

    pub fn document(&self, doc_id: &Id) -> Option<&Document> { self.corpus.get(doc_id) }

    pub fn rating(&self, doc_id: &Id) -> Option<f64> { self.ratings.get(doc_id).copied() }
}

#[derive(Debug)]
pub enum IndexState<Id> {
    Unbuilt,
    Ready(Arc<IndexSnapshot<Id>>),
}

impl<Id> Clone for IndexState<Id> {
    fn clone(&self) -> Self {
        match self {
            IndexState::Unbuilt => IndexState::Unbuilt,
            IndexState::Ready(snapshot) => IndexState::Ready(Arc::clone(snapshot)),
        }
    }
}

/// A ranked document with the fields needed to display it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit<Id> {
    pub doc_id: Id,
    pub score: f64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub actual_price: Option<f64>,
    pub selling_price: Option<f64>,
    pub average_rating: Option<f64>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage<Id> {
    /// Matching documents before truncation to `top_k`.
    pub total_hits: usize,
    pub hits: Vec<SearchHit<Id>>,
}

pub struct SearchEngine<Id> {
    tokenizer: Arc<Tokenizer>,
    config: SearchConfig,
    state: RwLock<IndexState<Id>>,
}

impl<Id: Clone + Eq + Hash + Ord + fmt::Debug> SearchEngine<Id> {
    /// Rejects configurations the rankers cannot use (see [`SearchConfig::validate`]).
    pub fn new(tokenizer: Arc<Tokenizer>, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self { tokenizer, config, state: RwLock::new(IndexState::Unbuilt) })
    }

    /// English tokenizer extended with the configured stopwords.
    pub fn from_config(config: SearchConfig) -> Result<Self, SearchError> {
        let tokenizer = Tokenizer::english().with_extra_stopwords(&config.extra_stopwords);
        Self::new(Arc::new(tokenizer), config)
    }

    pub fn config(&self) -> &SearchConfig { &self.config }

    pub fn tokenizer(&self) -> &Tokenizer { &self.tokenizer }

    pub fn state(&self) -> IndexState<Id> { self.state.read().clone() }

    pub fn is_ready(&self) -> bool { matches!(*self.state.read(), IndexState::Ready(_)) }

    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot<Id>>> {
        match &*self.state.read() {
            IndexState::Ready(snapshot) => Some(Arc::clone(snapshot)),
            IndexState::Unbuilt => None,
        }
    }

    /// Build a fresh snapshot and replace whatever was there.
    pub fn build_index(&self, corpus: Arc<Corpus<Id>>) -> CorpusStats {
        let snapshot = self.build_snapshot(corpus);
        let stats = snapshot.stats;
        *self.state.write() = IndexState::Ready(snapshot);
        stats
    }

    /// Build from `corpus` only if nothing is built yet. Concurrent callers build at most once.
    pub fn ensure_index<F>(&self, corpus: F) -> Arc<IndexSnapshot<Id>>
    where
        F: FnOnce() -> Arc<Corpus<Id>>,
    {
        if let Some(snapshot) = self.snapshot() {
            return snapshot;
        }
        let mut state = self.state.write();
        if let IndexState::Ready(snapshot) = &*state {
            return Arc::clone(snapshot);
        }
        let snapshot = self.build_snapshot(corpus());
        *state = IndexState::Ready(Arc::clone(&snapshot));
        snapshot
    }

    fn build_snapshot(&self, corpus: Arc<Corpus<Id>>) -> Arc<IndexSnapshot<Id>> {
        let snapshot = IndexSnapshot::build(&self.tokenizer, corpus, self.config.max_rating);
        let s = snapshot.stats;
        tracing::info!(
            num_docs = s.num_docs,
            num_terms = s.num_terms,
            total_postings = s.total_postings,
            avg_doc_length = s.avg_doc_length,
            "index built"
        );
        Arc::new(snapshot)
    }

    /// Top `top_k` documents for `query`. Fails if no index has been built.
    pub fn search(&self, query: &str, algorithm: Algorithm, top_k: usize) -> Result<Vec<RankedResult<Id>>, SearchError> {
        let snapshot = self.snapshot().ok_or(SearchError::IndexNotBuilt)?;
        let mut ranked = self.rank_all(&snapshot, query, algorithm);
        ranked.truncate(top_k);
        Ok(ranked)
    }

    /// Like [`search`](Self::search), building the index from `corpus` first if needed.
    pub fn search_or_build<F>(&self, query: &str, algorithm: Algorithm, top_k: usize, corpus: F) -> Vec<RankedResult<Id>>
    where
        F: FnOnce() -> Arc<Corpus<Id>>,
    {
        let snapshot = self.ensure_index(corpus);
        let mut ranked = self.rank_all(&snapshot, query, algorithm);
        ranked.truncate(top_k);
        ranked
    }

    /// Top `top_k` hits with display fields from the indexed corpus.
    pub fn search_hits(&self, query: &str, algorithm: Algorithm, top_k: usize) -> Result<SearchPage<Id>, SearchError> {
        let snapshot = self.snapshot().ok_or(SearchError::IndexNotBuilt)?;
        let ranked = self.rank_all(&snapshot, query, algorithm);
        let total_hits = ranked.len();
        let hits = ranked
            .into_iter()
            .take(top_k)
            .filter_map(|r| {
                let doc = snapshot.document(&r.doc_id)?;
                Some(SearchHit {
                    score: r.score,
                    title: doc.title.clone(),
                    description: doc.description.clone(),
                    url: doc.url.clone(),
                    actual_price: doc.actual_price,
                    selling_price: doc.selling_price,
                    average_rating: doc.average_rating,
                    images: doc.images.clone(),
                    doc_id: r.doc_id,
                })
            })
            .collect();
        Ok(SearchPage { total_hits, hits })
    }

    fn rank_all(&self, snapshot: &IndexSnapshot<Id>, query: &str, algorithm: Algorithm) -> Vec<RankedResult<Id>> {
        let terms = self.tokenizer.normalize(query);
        let candidates = filter::candidates(&terms, &snapshot.index);
        tracing::debug!(query, %algorithm, terms = terms.len(), candidates = candidates.len(), "search");
        if candidates.is_empty() {
            return Vec::new();
        }
        let ranking = bm25::rank(&terms, &candidates, &snapshot.index, &snapshot.stats, self.config.bm25_params());
        match algorithm {
            Algorithm::Bm25 => ranking,
            Algorithm::Hybrid => hybrid::rank(&ranking, |id| snapshot.rating(id), self.config.hybrid_weights()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn catalog() -> Arc<Corpus<u32>> {
        let mut c = Corpus::new();
        c.insert(1, Document::titled("red shoes").with_rating(4.5));
        c.insert(2, Document::titled("red shoes shoes").with_rating(2.0));
        c.insert(3, Document::titled("green jacket").with_rating(9.0));
        Arc::new(c)
    }

    fn engine() -> SearchEngine<u32> { SearchEngine::from_config(SearchConfig::default()).unwrap() }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let tokenizer = Arc::new(Tokenizer::english());
        for config in [
            SearchConfig { max_rating: -1.0, ..SearchConfig::default() },
            SearchConfig { max_rating: 0.0, ..SearchConfig::default() },
            SearchConfig { max_rating: f64::NAN, ..SearchConfig::default() },
            SearchConfig { rating_weight: -0.2, ..SearchConfig::default() },
        ] {
            let result = SearchEngine::<u32>::new(Arc::clone(&tokenizer), config);
            assert!(matches!(result, Err(SearchError::InvalidConfig(_))));
        }
    }

    #[test]
    fn snapshot_tolerates_a_degenerate_rating_scale() {
        let snapshot = IndexSnapshot::build(&Tokenizer::english(), catalog(), 0.0);
        assert_eq!(snapshot.rating(&1), Some(0.0));
        assert_eq!(snapshot.rating(&3), Some(0.0));
    }

    #[test]
    fn algorithm_names() {
        assert_eq!("bm25".parse::<Algorithm>(), Ok(Algorithm::Bm25));
        assert_eq!(" Hybrid ".parse::<Algorithm>(), Ok(Algorithm::Hybrid));
        assert_eq!("your_score".parse::<Algorithm>(), Ok(Algorithm::Hybrid));
        assert_eq!("tfidf".parse::<Algorithm>(), Err(SearchError::UnknownAlgorithm("tfidf".into())));
        assert_eq!(Algorithm::Hybrid.to_string(), "hybrid");
    }

    #[test]
    fn search_requires_built_index() {
        let e = engine();
        assert!(!e.is_ready());
        assert!(matches!(e.state(), IndexState::Unbuilt));
        assert_eq!(e.search("red", Algorithm::Bm25, 20), Err(SearchError::IndexNotBuilt));
        e.build_index(catalog());
        assert!(e.is_ready());
        assert_eq!(e.search("red", Algorithm::Bm25, 20).unwrap().len(), 2);
    }

    #[test]
    fn lazy_build_happens_once() {
        let e = engine();
        let builds = Cell::new(0);
        let load = || {
            builds.set(builds.get() + 1);
            catalog()
        };
        let first = e.search_or_build("red shoes", Algorithm::Bm25, 20, load);
        let second = e.search_or_build("red shoes", Algorithm::Bm25, 20, load);
        assert_eq!(builds.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn rebuild_replaces_snapshot() {
        let e = engine();
        e.build_index(catalog());
        let old = e.snapshot().unwrap();
        let mut c = Corpus::new();
        c.insert(7, Document::titled("linen trousers"));
        let stats = e.build_index(Arc::new(c));
        assert_eq!(stats.num_docs, 1);
        assert!(e.search("red", Algorithm::Bm25, 20).unwrap().is_empty());
        // earlier readers keep their complete snapshot
        assert_eq!(old.stats.num_docs, 3);
    }

    #[test]
    fn truncates_to_top_k() {
        let e = engine();
        e.build_index(catalog());
        assert_eq!(e.search("shoes", Algorithm::Bm25, 1).unwrap().len(), 1);
        assert!(e.search("shoes", Algorithm::Bm25, 0).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_rating_is_clamped() {
        let e = engine();
        e.build_index(catalog());
        let snap = e.snapshot().unwrap();
        assert_eq!(snap.rating(&3), Some(5.0));
        let ranked = e.search("jacket", Algorithm::Hybrid, 20).unwrap();
        assert_eq!(ranked, vec![RankedResult { doc_id: 3, score: 1.0 }]);
    }

    #[test]
    fn hits_carry_display_fields() {
        let e = engine();
        e.build_index(catalog());
        let page = e.search_hits("shoes", Algorithm::Bm25, 1).unwrap();
        assert_eq!(page.total_hits, 2);
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].doc_id, 2);
        assert_eq!(page.hits[0].title.as_deref(), Some("red shoes shoes"));
        assert_eq!(page.hits[0].average_rating, Some(2.0));
    }

    #[test]
    fn readers_never_see_partial_builds() {
        let e = engine();
        e.build_index(catalog());
        let big: Arc<Corpus<u32>> = Arc::new((0..200).map(|i| (i, Document::titled("red shoes"))).collect());
        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..5 {
                    e.build_index(Arc::clone(&big));
                    e.build_index(catalog());
                }
            });
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let snap = e.snapshot().unwrap();
                        assert!(snap.stats.num_docs == 3 || snap.stats.num_docs == 200);
                        assert_eq!(snap.index.num_docs(), snap.stats.num_docs);
                    }
                });
            }
        });
    }
}
