//! Okapi BM25 over the conjunctive candidate set.
//!
//! ```text
//! idf(t)    = ln(1 + (N - df(t) + 0.5) / (df(t) + 0.5))
//! score(D)  = sum over query terms t of idf(t) * tf * (k1 + 1) / (tf + k1 * (1 - b + b * |D| / avgdl))
//! ```

use crate::config::Bm25Params;
use crate::index::{CorpusStats, InvertedIndex};
use crate::tokenizer::Tokenizer;
use crate::{sort_ranked, RankedResult};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

pub fn idf(num_docs: usize, df: u32) -> f64 {
    let n = num_docs as f64;
    let df = f64::from(df);
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Saturated, length-normalized term frequency (without the idf factor).
pub fn tf_weight(tf: u32, doc_len: f64, avg_doc_len: f64, params: Bm25Params) -> f64 {
    let tf = f64::from(tf);
    let Bm25Params { k1, b } = params;
    (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * (doc_len / avg_doc_len)))
}

/// Normalize `query` and rank `candidates` with BM25.
pub fn rank_query<Id: Clone + Eq + Hash + Ord>(
    tokenizer: &Tokenizer,
    query: &str,
    candidates: &HashSet<Id>,
    index: &InvertedIndex<Id>,
    stats: &CorpusStats,
    params: Bm25Params,
) -> Vec<RankedResult<Id>> {
    rank(&tokenizer.normalize(query), candidates, index, stats, params)
}

/// Score every candidate against `terms`, best first, ties by id ascending.
///
/// Each occurrence of a term in `terms` contributes, so repeated query words weigh more.
/// Terms unknown to the index add nothing; a candidate without a posting for a term gets
/// zero for it and stays in the ranking.
pub fn rank<Id: Clone + Eq + Hash + Ord>(
    terms: &[String],
    candidates: &HashSet<Id>,
    index: &InvertedIndex<Id>,
    stats: &CorpusStats,
    params: Bm25Params,
) -> Vec<RankedResult<Id>> {
    if candidates.is_empty() || stats.num_docs == 0 || stats.avg_doc_length <= 0.0 {
        return Vec::new();
    }

    let mut idf_cache: HashMap<&str, f64> = HashMap::new();
    for term in terms {
        let df = index.doc_freq(term);
        if df > 0 {
            idf_cache.insert(term.as_str(), idf(stats.num_docs, df));
        }
    }

    let mut scores: HashMap<&Id, f64> = candidates.iter().map(|id| (id, 0.0)).collect();
    for term in terms {
        let Some(&term_idf) = idf_cache.get(term.as_str()) else { continue };
        for posting in index.postings(term) {
            if let Some(score) = scores.get_mut(&posting.doc_id) {
                let doc_len = f64::from(index.doc_length(&posting.doc_id));
                *score += term_idf * tf_weight(posting.tf, doc_len, stats.avg_doc_length, params);
            }
        }
    }

    let mut ranked: Vec<RankedResult<Id>> =
        scores.into_iter().map(|(id, score)| RankedResult { doc_id: id.clone(), score }).collect();
    sort_ranked(&mut ranked);
    ranked
}
