//! Read-only query surface over the vector index.
//!
//! # Ranking
//!
//! 1. Cosine similarity of the query against every component.
//! 2. Stable sort by similarity (desc); equal scores keep collection order.
//! 3. Keep `similarity > 0`, `similarity >= min_similarity`,
//!    `quality >= min_quality`.
//! 4. Truncate to `top_k`.
//!
//! Category and cost-range searches over-fetch `2 × top_k` results with the
//! broad similarity floor and filter afterwards. An unavailable index
//! yields no results rather than an error.

use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::index::VectorIndex;
use crate::knowledge_base::KnowledgeBase;
use crate::models::SearchResult;
use crate::quality;

/// Similarity floor for category, cost-range, and summary searches.
pub const BROAD_MIN_SIMILARITY: f64 = 0.1;

const SUMMARY_TOP_GROUPS: usize = 5;

/// Everything a search reads: the collection, its vectors, and quality scores.
#[derive(Debug)]
pub struct SearchCorpus {
    kb: KnowledgeBase,
    index: VectorIndex,
    quality: Vec<f64>,
}

impl SearchCorpus {
    pub fn new(kb: KnowledgeBase, index: VectorIndex) -> Self {
        let quality = kb.components().iter().map(quality::quality_score).collect();
        Self { kb, index, quality }
    }

    /// A corpus with no data; every search returns nothing.
    pub fn empty() -> Self {
        let kb = KnowledgeBase::default();
        let index = VectorIndex::build(&kb);
        Self::new(kb, index)
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Quality score of the component at `index`.
    pub fn quality(&self, index: usize) -> Option<f64> {
        self.quality.get(index).copied()
    }

    pub fn quality_scores(&self) -> &[f64] {
        &self.quality
    }
}

/// Aggregate view over one result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSummary {
    pub query: String,
    pub total_results: usize,
    pub total_cost: f64,
    pub average_cost: f64,
    pub min_cost: f64,
    pub max_cost: f64,
    pub top_categories: Vec<(String, usize)>,
    pub top_trades: Vec<(String, usize)>,
}

/// Cheap to clone; holds a shared snapshot of the corpus.
#[derive(Debug, Clone)]
pub struct ComponentSearch {
    corpus: Arc<SearchCorpus>,
}

impl ComponentSearch {
    pub fn new(corpus: Arc<SearchCorpus>) -> Self {
        Self { corpus }
    }

    pub fn corpus(&self) -> &SearchCorpus {
        &self.corpus
    }

    /// Ranked components similar to `query`.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f64,
        min_quality: f64,
    ) -> Vec<SearchResult> {
        if query.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }

        let similarities = match self.corpus.index.similarities(query) {
            Some(s) => s,
            None => {
                warn!("vector index unavailable; returning no results");
                return Vec::new();
            }
        };

        let mut ranked: Vec<(usize, f64)> = similarities.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        ranked
            .into_iter()
            .filter(|&(_, sim)| sim > 0.0 && sim >= min_similarity)
            .filter_map(|(i, sim)| {
                let quality = self.corpus.quality(i)?;
                if quality < min_quality {
                    return None;
                }
                let component = self.corpus.kb.get(i)?.clone();
                Some(SearchResult {
                    component_index: i,
                    similarity_score: sim.clamp(0.0, 1.0),
                    quality_score: quality,
                    component,
                })
            })
            .take(top_k)
            .collect()
    }

    /// Results whose category equals `category`, ignoring case.
    pub fn search_by_category(&self, query: &str, category: &str, top_k: usize) -> Vec<SearchResult> {
        let wanted = category.to_lowercase();
        self.search(query, top_k.saturating_mul(2), BROAD_MIN_SIMILARITY, 0.0)
            .into_iter()
            .filter(|r| r.component.category.to_lowercase() == wanted)
            .take(top_k)
            .collect()
    }

    /// Results priced within `[min_cost, max_cost]`; `None` leaves the top open.
    pub fn search_by_cost_range(
        &self,
        query: &str,
        min_cost: f64,
        max_cost: Option<f64>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        self.search(query, top_k.saturating_mul(2), BROAD_MIN_SIMILARITY, 0.0)
            .into_iter()
            .filter(|r| {
                let price = r.component.total();
                price >= min_cost && max_cost.map_or(true, |max| price <= max)
            })
            .take(top_k)
            .collect()
    }

    /// Statistics over the results for `query`; `None` when nothing matched.
    pub fn summarize(&self, query: &str, top_k: usize) -> Option<SearchSummary> {
        let results = self.search(query, top_k, BROAD_MIN_SIMILARITY, 0.0);
        if results.is_empty() {
            return None;
        }

        let prices: Vec<f64> = results.iter().map(|r| r.component.total()).collect();
        let total_cost: f64 = prices.iter().sum();

        Some(SearchSummary {
            query: query.to_string(),
            total_results: results.len(),
            total_cost,
            average_cost: total_cost / prices.len() as f64,
            min_cost: prices.iter().copied().fold(f64::INFINITY, f64::min),
            max_cost: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            top_categories: top_groups(results.iter().map(|r| r.component.category.as_str())),
            top_trades: top_groups(results.iter().map(|r| r.component.trade.as_str())),
        })
    }
}

/// Most frequent labels, ties in first-seen order.
pub(crate) fn top_groups<'a, I>(labels: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    for label in labels {
        let label = if label.trim().is_empty() {
            "Unknown"
        } else {
            label
        };
        match counts.iter_mut().find(|(l, _)| l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(SUMMARY_TOP_GROUPS);
    counts
}
