//! Blend of relevance and product rating.
//!
//! `score = bm25_weight * bm25 / max(bm25) + rating_weight * rating / max_rating`

use crate::config::HybridWeights;
use crate::{sort_ranked, RankedResult};

/// Rating clamped to `[0, max_rating]`; absent or non-finite ratings count as 0,
/// and so does every rating when `max_rating` is not a positive number.
pub fn normalized_rating(rating: Option<f64>, max_rating: f64) -> f64 {
    if !(max_rating.is_finite() && max_rating > 0.0) {
        return 0.0;
    }
    match rating {
        Some(r) if r.is_finite() => r.clamp(0.0, max_rating) / max_rating,
        _ => 0.0,
    }
}

/// Re-rank a BM25 ranking. `rating_of` looks up a document's rating.
pub fn rank<Id, F>(bm25: &[RankedResult<Id>], rating_of: F, weights: HybridWeights) -> Vec<RankedResult<Id>>
where
    Id: Clone + Ord,
    F: Fn(&Id) -> Option<f64>,
{
    let mut max_bm25 = bm25.iter().map(|r| r.score).fold(0.0f64, f64::max);
    if max_bm25 <= 0.0 {
        max_bm25 = 1.0;
    }

    let mut ranked: Vec<RankedResult<Id>> = bm25
        .iter()
        .map(|r| {
            let norm_bm25 = r.score / max_bm25;
            let norm_rating = normalized_rating(rating_of(&r.doc_id), weights.max_rating);
            RankedResult { doc_id: r.doc_id.clone(), score: weights.bm25 * norm_bm25 + weights.rating * norm_rating }
        })
        .collect();
    sort_ranked(&mut ranked);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn r(doc_id: u32, score: f64) -> RankedResult<u32> { RankedResult { doc_id, score } }

    #[test]
    fn rating_can_overturn_relevance() {
        let ratings = HashMap::from([(1, 5.0), (2, 0.0)]);
        let out = rank(&[r(2, 10.0), r(1, 9.0)], |id| ratings.get(id).copied(), HybridWeights::default());
        assert_eq!(out[0].doc_id, 1);
        assert!((out[0].score - (0.8 * 0.9 + 0.2)).abs() < 1e-12);
        assert!((out[1].score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let ratings = HashMap::from([(1, 7.5), (2, -1.0), (3, f64::NAN)]);
        let out = rank(&[r(1, 3.0), r(2, 1.5), r(3, 0.0), r(4, 2.0)], |id| ratings.get(id).copied(), HybridWeights::default());
        for res in &out {
            assert!((0.0..=1.0).contains(&res.score), "{res:?}");
        }
        assert_eq!(out[0], r(1, 1.0));
    }

    #[test]
    fn all_zero_scores_do_not_divide_by_zero() {
        let out = rank(&[r(1, 0.0), r(2, 0.0)], |_| Some(2.5), HybridWeights::default());
        assert_eq!(out, vec![r(1, 0.1), r(2, 0.1)]);
    }

    #[test]
    fn degenerate_rating_scale_ignores_ratings() {
        for max_rating in [0.0, -1.0, f64::NAN] {
            let weights = HybridWeights { max_rating, ..HybridWeights::default() };
            let out = rank(&[r(1, 2.0), r(2, 1.0)], |_| Some(4.0), weights);
            assert_eq!(out, vec![r(1, 0.8), r(2, 0.4)]);
        }
    }

    #[test]
    fn empty_in_empty_out() {
        assert!(rank::<u32, _>(&[], |_| None, HybridWeights::default()).is_empty());
    }

    #[test]
    fn weights_are_configurable() {
        let weights = HybridWeights { bm25: 0.0, rating: 1.0, max_rating: 10.0 };
        let out = rank(&[r(1, 5.0), r(2, 1.0)], |id| Some(if *id == 2 { 8.0 } else { 2.0 }), weights);
        assert_eq!(out, vec![r(2, 0.8), r(1, 0.2)]);
    }
}
