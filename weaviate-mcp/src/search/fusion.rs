// Weighted Reciprocal Rank Fusion

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Retrieval path that contributed to a fused result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Semantic,
    Keyword,
}

/// One fused entry with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct FusedEntry<T> {
    pub id: T,
    pub score: f64,
    /// 1-indexed rank in the semantic list
    pub semantic_rank: Option<usize>,
    /// 1-indexed rank in the keyword list
    pub keyword_rank: Option<usize>,
}

impl<T> FusedEntry<T> {
    /// Modes whose weighted contribution to the score was non-zero
    pub fn sources(&self, alpha: f64) -> Vec<SearchSource> {
        let mut sources = Vec::with_capacity(2);
        if self.semantic_rank.is_some() && alpha > 0.0 {
            sources.push(SearchSource::Semantic);
        }
        if self.keyword_rank.is_some() && alpha < 1.0 {
            sources.push(SearchSource::Keyword);
        }
        sources
    }
}

/// Fuse a semantic and a keyword ranking.
///
/// Score: `alpha / (k + rank_semantic) + (1 - alpha) / (k + rank_keyword)`,
/// where an absent rank contributes nothing. Ids are deduplicated (first
/// occurrence in each list wins). Output is sorted by score descending, exact
/// ties by semantic rank, then keyword rank, with absent ranks last. Entries
/// with a zero score (present only in a list weighted zero) are dropped, so
/// `alpha = 1.0` reproduces the semantic order and `alpha = 0.0` the keyword
/// order.
pub fn reciprocal_rank_fusion<T: Clone + Eq + Hash>(
    semantic: &[T],
    keyword: &[T],
    alpha: f64,
    k: u32,
) -> Vec<FusedEntry<T>> {
    let k = k as f64;
    let mut entries: Vec<FusedEntry<T>> = Vec::with_capacity(semantic.len() + keyword.len());
    let mut index: HashMap<T, usize> = HashMap::new();

    for (i, id) in semantic.iter().enumerate() {
        if index.contains_key(id) {
            continue;
        }
        let rank = i + 1;
        index.insert(id.clone(), entries.len());
        entries.push(FusedEntry {
            id: id.clone(),
            score: alpha / (k + rank as f64),
            semantic_rank: Some(rank),
            keyword_rank: None,
        });
    }

    for (i, id) in keyword.iter().enumerate() {
        let rank = i + 1;
        let contribution = (1.0 - alpha) / (k + rank as f64);
        match index.get(id) {
            Some(&pos) => {
                let entry = &mut entries[pos];
                if entry.keyword_rank.is_none() {
                    entry.keyword_rank = Some(rank);
                    entry.score += contribution;
                }
            }
            None => {
                index.insert(id.clone(), entries.len());
                entries.push(FusedEntry {
                    id: id.clone(),
                    score: contribution,
                    semantic_rank: None,
                    keyword_rank: Some(rank),
                });
            }
        }
    }

    entries.retain(|e| e.score > 0.0);
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| rank_key(a.semantic_rank).cmp(&rank_key(b.semantic_rank)))
            .then_with(|| rank_key(a.keyword_rank).cmp(&rank_key(b.keyword_rank)))
    });
    entries
}

fn rank_key(rank: Option<usize>) -> usize {
    rank.unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: u32 = 60;

    fn ids<T: Clone>(fused: &[FusedEntry<T>]) -> Vec<T> {
        fused.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_red_bicycle_scenario() {
        let semantic = ["P7", "P2", "P9"];
        let keyword = ["P2", "P7", "P15"];

        let fused = reciprocal_rank_fusion(&semantic, &keyword, 0.3, K);

        // P2: 0.3/62 + 0.7/61, P7: 0.3/61 + 0.7/62, P15: 0.7/63, P9: 0.3/63
        assert_eq!(ids(&fused), vec!["P2", "P7", "P15", "P9"]);
    }

    #[test]
    fn test_alpha_one_matches_semantic() {
        let semantic = [3, 1, 4, 5];
        let keyword = [9, 2, 6, 5, 3];

        let fused = reciprocal_rank_fusion(&semantic, &keyword, 1.0, K);
        assert_eq!(ids(&fused), semantic.to_vec());
    }

    #[test]
    fn test_alpha_zero_matches_keyword() {
        let semantic = [3, 1, 4, 5];
        let keyword = [9, 2, 6, 5, 3];

        let fused = reciprocal_rank_fusion(&semantic, &keyword, 0.0, K);
        assert_eq!(ids(&fused), keyword.to_vec());
    }

    #[test]
    fn test_no_duplicates() {
        let semantic = [1, 2, 3, 2];
        let keyword = [3, 1, 4, 4];

        let fused = reciprocal_rank_fusion(&semantic, &keyword, 0.5, K);
        let mut seen = ids(&fused);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), fused.len());
        assert_eq!(fused.len(), 4);
    }

    #[test]
    fn test_exact_tie_broken_by_semantic_rank() {
        // Symmetric ranks with equal weights give bit-identical scores
        let semantic = ["a", "b"];
        let keyword = ["b", "a"];

        let fused = reciprocal_rank_fusion(&semantic, &keyword, 0.5, K);
        assert_eq!(fused[0].score, fused[1].score);
        assert_eq!(ids(&fused), vec!["a", "b"]);
    }

    #[test]
    fn test_tie_between_single_list_entries() {
        // "s" only in semantic at rank 2, "k" only in keyword at rank 2
        let semantic = ["x", "s"];
        let keyword = ["y", "k"];

        let fused = reciprocal_rank_fusion(&semantic, &keyword, 0.5, K);
        let pos_s = fused.iter().position(|e| e.id == "s").unwrap();
        let pos_k = fused.iter().position(|e| e.id == "k").unwrap();
        assert!(pos_s < pos_k);
    }

    #[test]
    fn test_single_list_contributions_only() {
        let semantic = ["only_semantic"];
        let keyword = ["only_keyword"];

        let fused = reciprocal_rank_fusion(&semantic, &keyword, 0.5, K);
        for entry in &fused {
            assert!((entry.score - 0.5 / 61.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_monotonic_in_alpha() {
        let semantic = ["s_only", "both"];
        let keyword = ["k1", "both", "k2", "k3"];

        let mut last_position = usize::MAX;
        for step in 0..=10 {
            let alpha = step as f64 / 10.0;
            let fused = reciprocal_rank_fusion(&semantic, &keyword, alpha, K);
            let Some(position) = fused.iter().position(|e| e.id == "s_only") else {
                // alpha = 0 drops semantic-only entries
                assert_eq!(step, 0);
                continue;
            };
            assert!(
                position <= last_position,
                "semantic-only entry fell from {} to {} at alpha {}",
                last_position,
                position,
                alpha
            );
            last_position = position;
        }
        assert_eq!(last_position, 0);
    }

    #[test]
    fn test_empty_inputs() {
        let empty: [u32; 0] = [];
        assert!(reciprocal_rank_fusion(&empty, &empty, 0.5, K).is_empty());

        let keyword = [1, 2];
        let fused = reciprocal_rank_fusion(&empty, &keyword, 0.5, K);
        assert_eq!(ids(&fused), vec![1, 2]);
    }

    #[test]
    fn test_smaller_k_favors_top_rank() {
        // "top" ranks first in semantic only; "mid" ranks second in both
        let semantic = ["top", "mid"];
        let keyword = ["other", "mid"];

        let small = reciprocal_rank_fusion(&semantic, &keyword, 0.5, 1);
        let large = reciprocal_rank_fusion(&semantic, &keyword, 0.5, 1000);

        // k=1: top = 0.25, mid = 0.5/3 * 2 = 0.333
        assert_eq!(small[0].id, "mid");
        // k=1000: both near 0.5/1000 per list; mid collects two shares
        assert_eq!(large[0].id, "mid");
        let top_small = small.iter().find(|e| e.id == "top").unwrap().score;
        let mid_small = small.iter().find(|e| e.id == "mid").unwrap().score;
        let top_large = large.iter().find(|e| e.id == "top").unwrap().score;
        let mid_large = large.iter().find(|e| e.id == "mid").unwrap().score;
        assert!(top_small / mid_small > top_large / mid_large);
    }

    #[test]
    fn test_sources() {
        let semantic = ["a"];
        let keyword = ["a", "b"];

        let fused = reciprocal_rank_fusion(&semantic, &keyword, 0.3, K);
        let a = fused.iter().find(|e| e.id == "a").unwrap();
        assert_eq!(a.sources(0.3), vec![SearchSource::Semantic, SearchSource::Keyword]);
        assert_eq!(a.sources(1.0), vec![SearchSource::Semantic]);
        let b = fused.iter().find(|e| e.id == "b").unwrap();
        assert_eq!(b.sources(0.3), vec![SearchSource::Keyword]);
    }
}
