//! Conjunctive candidate selection.

use crate::index::InvertedIndex;
use crate::tokenizer::Tokenizer;
use std::collections::HashSet;
use std::hash::Hash;

/// Normalize `query` and select the documents matching all of its terms.
pub fn filter<Id: Clone + Eq + Hash>(tokenizer: &Tokenizer, query: &str, index: &InvertedIndex<Id>) -> HashSet<Id> {
    candidates(&tokenizer.normalize(query), index)
}

/// Documents containing every one of `terms`. Empty when `terms` is empty or
/// any term is missing from the index.
pub fn candidates<Id: Clone + Eq + Hash>(terms: &[String], index: &InvertedIndex<Id>) -> HashSet<Id> {
    let mut result: Option<HashSet<Id>> = None;
    for term in terms {
        let postings = match index.postings.get(term) {
            Some(p) => p,
            None => return HashSet::new(),
        };
        let next = match result {
            None => postings.iter().map(|p| p.doc_id.clone()).collect(),
            Some(current) => {
                let mut kept = HashSet::with_capacity(current.len().min(postings.len()));
                for p in postings {
                    if current.contains(&p.doc_id) {
                        kept.insert(p.doc_id.clone());
                    }
                }
                kept
            }
        };
        if next.is_empty() {
            return next;
        }
        result = Some(next);
    }
    result.unwrap_or_default()
}
