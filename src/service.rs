//! The process-scoped service object.
//!
//! [`BudgetService`] owns the configuration and the live search corpus.
//! It is constructed once at startup and passed to whatever drives it
//! (the CLI here). Searches take a cheap snapshot of the corpus; a rebuild
//! loads and indexes the collection fully before swapping it in, so readers
//! never observe a half-built index.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::GenerationError;
use crate::generate::Generator;
use crate::index::{IndexInfo, VectorIndex};
use crate::knowledge_base::KnowledgeBase;
use crate::llm::CompletionProvider;
use crate::models::{GeneratedComponent, SearchResult};
use crate::search::{ComponentSearch, SearchCorpus, SearchSummary};

/// State of the on-disk vector cache relative to the loaded collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum CacheState {
    Fresh,
    Missing,
    Stale(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub components_path: PathBuf,
    pub cache_path: PathBuf,
    pub available: bool,
    pub index: IndexInfo,
    pub cache: CacheState,
}

pub struct BudgetService {
    config: Config,
    corpus: RwLock<Arc<SearchCorpus>>,
}

impl BudgetService {
    /// Load the collection and its index.
    ///
    /// An unreadable collection is not an error: the service starts with an
    /// empty corpus and every search returns nothing.
    pub fn open(config: Config) -> Self {
        let corpus = match load_corpus(&config, false) {
            Some(corpus) => corpus,
            None => SearchCorpus::empty(),
        };
        Self {
            config,
            corpus: RwLock::new(Arc::new(corpus)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A search handle over the current corpus snapshot.
    pub fn searcher(&self) -> ComponentSearch {
        let corpus = self
            .corpus
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ComponentSearch::new(Arc::clone(&corpus))
    }

    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        min_similarity: f64,
        min_quality: f64,
    ) -> Vec<SearchResult> {
        self.searcher()
            .search(query, top_k, min_similarity, min_quality)
    }

    pub fn search_by_category(&self, query: &str, category: &str, top_k: usize) -> Vec<SearchResult> {
        self.searcher().search_by_category(query, category, top_k)
    }

    pub fn search_by_cost_range(
        &self,
        query: &str,
        min_cost: f64,
        max_cost: Option<f64>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        self.searcher()
            .search_by_cost_range(query, min_cost, max_cost, top_k)
    }

    pub fn summarize(&self, query: &str, top_k: usize) -> Option<SearchSummary> {
        self.searcher().summarize(query, top_k)
    }

    /// Draft, enforce, and return one component for `query`.
    pub fn generate(
        &self,
        query: &str,
        use_high_quality_only: bool,
        provider: &dyn CompletionProvider,
    ) -> Result<GeneratedComponent, GenerationError> {
        let searcher = self.searcher();
        Generator::new(&searcher, &self.config).generate(query, use_high_quality_only, provider)
    }

    /// Reload the collection, rebuild (or reload) its vectors, and swap the
    /// result in. Returns `false` and keeps the current index when the
    /// collection cannot be loaded.
    pub fn rebuild_index(&self, force_regenerate: bool) -> bool {
        let corpus = match load_corpus(&self.config, force_regenerate) {
            Some(corpus) => corpus,
            None => return false,
        };
        info!(
            components = corpus.knowledge_base().len(),
            dims = corpus.index().dims(),
            force_regenerate,
            "index swapped"
        );
        let mut slot = self
            .corpus
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Arc::new(corpus);
        true
    }

    pub fn index_status(&self) -> IndexStatus {
        let searcher = self.searcher();
        let corpus = searcher.corpus();
        let cache_path = self.config.data.cache_path();

        let cache = match VectorIndex::load_cache(corpus.knowledge_base(), &cache_path) {
            Ok(Some(_)) => CacheState::Fresh,
            Ok(None) => CacheState::Missing,
            Err(e) => CacheState::Stale(e.to_string()),
        };

        IndexStatus {
            components_path: self.config.data.components.clone(),
            cache_path,
            available: corpus.index().is_available(),
            index: corpus.index().info().clone(),
            cache,
        }
    }
}

fn load_corpus(config: &Config, force_regenerate: bool) -> Option<SearchCorpus> {
    let kb = match KnowledgeBase::load(&config.data.components) {
        Ok(kb) => kb,
        Err(e) => {
            warn!(error = %e, "historical data unavailable; searches will return nothing");
            return None;
        }
    };
    let index = VectorIndex::load_or_build(&kb, &config.data.cache_path(), force_regenerate);
    Some(SearchCorpus::new(kb, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexOrigin;
    use std::fs;
    use tempfile::TempDir;

    const COLLECTION: &str = r#"{"components": [
        {"task_text": "remove wall tiles", "category": "Demolition", "trade": "in-house", "total_price": 4000},
        {"task_text": "paint ceiling", "category": "Painting", "trade": "Painters", "total_price": 3000}
    ]}"#;

    fn workspace() -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("components.json");
        fs::write(&path, COLLECTION).unwrap();
        let config = Config::for_components(&path);
        (tmp, config)
    }

    #[test]
    fn test_open_builds_and_caches() {
        let (_tmp, config) = workspace();
        let cache = config.data.cache_path();
        let service = BudgetService::open(config);
        assert!(cache.exists());
        assert_eq!(service.search("tiles", 5, 0.0, 0.0).len(), 1);

        let status = service.index_status();
        assert!(status.available);
        assert_eq!(status.cache, CacheState::Fresh);
        assert_eq!(status.index.component_count, 2);
    }

    #[test]
    fn test_second_open_uses_cache() {
        let (_tmp, config) = workspace();
        BudgetService::open(config.clone());
        let service = BudgetService::open(config);
        assert_eq!(service.index_status().index.origin, IndexOrigin::Cache);
    }

    #[test]
    fn test_missing_collection_degrades_to_empty() {
        let tmp = TempDir::new().unwrap();
        let config = Config::for_components(&tmp.path().join("missing.json"));
        let service = BudgetService::open(config);
        assert!(service.search("tiles", 5, 0.0, 0.0).is_empty());
        assert!(service.summarize("tiles", 5).is_none());
        assert!(!service.index_status().available);
    }

    #[test]
    fn test_rebuild_picks_up_new_data() {
        let (_tmp, config) = workspace();
        let path = config.data.components.clone();
        let service = BudgetService::open(config);
        assert!(service.search("roof", 5, 0.0, 0.0).is_empty());

        fs::write(
            &path,
            r#"[{"task_text": "repair roof gutters", "total_price": 900}]"#,
        )
        .unwrap();
        assert!(service.rebuild_index(false));
        assert_eq!(service.search("roof", 5, 0.0, 0.0).len(), 1);
        assert_eq!(service.index_status().index.origin, IndexOrigin::Built);
    }

    #[test]
    fn test_failed_rebuild_keeps_old_index() {
        let (_tmp, config) = workspace();
        let path = config.data.components.clone();
        let service = BudgetService::open(config);
        fs::remove_file(&path).unwrap();
        assert!(!service.rebuild_index(true));
        assert_eq!(service.search("tiles", 5, 0.0, 0.0).len(), 1);
    }

    #[test]
    fn test_forced_rebuild_ignores_cache() {
        let (_tmp, config) = workspace();
        let service = BudgetService::open(config);
        assert!(service.rebuild_index(true));
        assert_eq!(service.index_status().index.origin, IndexOrigin::Built);
    }
}
