use crate::corpus::Document;
use crate::tokenizer::Tokenizer;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posting<Id> {
    pub doc_id: Id,
    /// Raw occurrences of the term in the document.
    pub tf: u32,
}

/// Postings, document frequencies and document lengths built in one pass over a corpus.
///
/// Postings for a term follow corpus iteration order. A document appears at most once
/// per term, and `df[t] == postings[t].len()` for every term.
#[derive(Debug, Clone)]
pub struct InvertedIndex<Id> {
    pub postings: HashMap<String, Vec<Posting<Id>>>,
    pub df: HashMap<String, u32>,
    /// Normalized token count per document, zero for empty text.
    pub doc_lengths: HashMap<Id, u32>,
}

impl<Id> Default for InvertedIndex<Id> {
    fn default() -> Self {
        Self { postings: HashMap::new(), df: HashMap::new(), doc_lengths: HashMap::new() }
    }
}

// Posting order counts.
impl<Id: Eq + Hash> PartialEq for InvertedIndex<Id> {
    fn eq(&self, other: &Self) -> bool {
        self.postings == other.postings && self.df == other.df && self.doc_lengths == other.doc_lengths
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorpusStats {
    pub num_docs: usize,
    pub num_terms: usize,
    pub total_postings: usize,
    /// Mean document length; 0 for an empty corpus.
    pub avg_doc_length: f64,
}

impl<Id: Clone + Eq + Hash> InvertedIndex<Id> {
    pub fn new() -> Self { Self::default() }

    pub fn build<'a, I>(tokenizer: &Tokenizer, docs: I) -> Self
    where
        I: IntoIterator<Item = (&'a Id, &'a Document)>,
        Id: 'a,
    {
        let mut index = Self::new();
        for (doc_id, doc) in docs {
            let terms = tokenizer.normalize(&doc.searchable_text());
            index.doc_lengths.insert(doc_id.clone(), terms.len() as u32);

            let mut tf_counts: HashMap<String, u32> = HashMap::new();
            for term in terms {
                *tf_counts.entry(term).or_insert(0) += 1;
            }
            for (term, tf) in tf_counts {
                *index.df.entry(term.clone()).or_insert(0) += 1;
                index.postings.entry(term).or_default().push(Posting { doc_id: doc_id.clone(), tf });
            }
        }
        index
    }

    pub fn num_docs(&self) -> usize { self.doc_lengths.len() }

    pub fn postings(&self, term: &str) -> &[Posting<Id>] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn doc_freq(&self, term: &str) -> u32 { self.df.get(term).copied().unwrap_or(0) }

    pub fn doc_length(&self, doc_id: &Id) -> u32 { self.doc_lengths.get(doc_id).copied().unwrap_or(0) }

    pub fn avg_doc_length(&self) -> f64 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        let total: u64 = self.doc_lengths.values().map(|&l| u64::from(l)).sum();
        total as f64 / self.doc_lengths.len() as f64
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            num_docs: self.num_docs(),
            num_terms: self.postings.len(),
            total_postings: self.postings.values().map(Vec::len).sum(),
            avg_doc_length: self.avg_doc_length(),
        }
    }

    /// The `n` most widespread terms, ties by term ascending.
    pub fn top_terms(&self, n: usize) -> Vec<(&str, u32)> {
        let mut terms: Vec<(&str, u32)> = self.df.iter().map(|(t, &df)| (t.as_str(), df)).collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        terms.truncate(n);
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::tokenizer::NoStemming;

    fn plain() -> Tokenizer { Tokenizer::new(["the", "and"], NoStemming) }

    fn corpus() -> Corpus<u32> {
        let mut c = Corpus::new();
        c.insert(1, Document::titled("red shoes").with_description("the red sole"));
        c.insert(2, Document::titled("blue shoes"));
        c.insert(3, Document::default());
        c
    }

    #[test]
    fn counts_raw_term_frequency_over_title_and_description() {
        let idx = InvertedIndex::build(&plain(), &corpus());
        assert_eq!(idx.postings("red"), &[Posting { doc_id: 1, tf: 2 }]);
        assert_eq!(idx.postings("shoes"), &[Posting { doc_id: 1, tf: 1 }, Posting { doc_id: 2, tf: 1 }]);
        assert!(idx.postings("the").is_empty());
    }

    #[test]
    fn document_lengths_include_empty_documents() {
        let idx = InvertedIndex::build(&plain(), &corpus());
        assert_eq!(idx.doc_length(&1), 4);
        assert_eq!(idx.doc_length(&2), 2);
        assert_eq!(idx.doc_lengths.get(&3), Some(&0));
        assert_eq!(idx.num_docs(), 3);
        assert!((idx.avg_doc_length() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn df_matches_postings() {
        let idx = InvertedIndex::build(&plain(), &corpus());
        for (term, plist) in &idx.postings {
            assert_eq!(idx.doc_freq(term) as usize, plist.len(), "term {term}");
        }
        assert_eq!(idx.df.len(), idx.postings.len());
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let c = corpus();
        assert_eq!(InvertedIndex::build(&plain(), &c), InvertedIndex::build(&plain(), &c));
    }

    #[test]
    fn differing_lengths_make_indexes_unequal() {
        let a = InvertedIndex::build(&plain(), &corpus());
        let mut b = a.clone();
        b.doc_lengths.insert(3, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_corpus() {
        let idx = InvertedIndex::<u32>::build(&plain(), &Corpus::new());
        assert!(idx.postings.is_empty() && idx.df.is_empty() && idx.doc_lengths.is_empty());
        assert_eq!(idx.avg_doc_length(), 0.0);
    }

    #[test]
    fn top_terms_orders_by_df_then_term() {
        let idx = InvertedIndex::build(&plain(), &corpus());
        assert_eq!(idx.top_terms(2), vec![("shoes", 2), ("blue", 1)]);
    }
}
