//! Search functionality
//!
//! Three modes run against the shared session:
//! - **Semantic**: one `nearText` query, backend order
//! - **Keyword**: one BM25 query, backend order
//! - **Hybrid**: both queries concurrently under one deadline, merged with
//!   weighted Reciprocal Rank Fusion (see [`fusion`])

pub mod fusion;

use crate::backend::{DataObject, QueryScope};
use crate::connection::Session;
use crate::error::{Error, Result};
use crate::objects::validate_limit;
use crate::schema::{check_tenant, SchemaService};
use fusion::{reciprocal_rank_fusion, FusedEntry, SearchSource};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of search results
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Alpha used by the `search` tool and as the `hybrid_search` default
pub const DEFAULT_ALPHA: f64 = 0.3;

/// Search mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchMode {
    /// Vector similarity only
    Semantic,
    /// BM25 only
    Keyword,
    /// Fusion of both; `alpha` weights the semantic side
    Hybrid { alpha: f64 },
}

impl SearchMode {
    pub fn name(&self) -> &'static str {
        match self {
            SearchMode::Semantic => "semantic",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid { .. } => "hybrid",
        }
    }

    fn needs_vectorizer(&self) -> bool {
        !matches!(self, SearchMode::Keyword)
    }
}

/// Search request
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub collection: String,
    pub query: String,
    pub mode: SearchMode,
    pub limit: usize,
    pub tenant_id: Option<String>,
}

/// Search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    /// Object UUID
    pub id: String,
    /// Collection name
    pub collection: String,
    /// Object properties
    pub properties: Map<String, Value>,
    /// Backend-native score (certainty or BM25)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Fused RRF score (hybrid only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fused_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_rank: Option<usize>,
    /// Modes that contributed to a hybrid result
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SearchSource>,
}

impl RankedResult {
    fn from_object(collection: &str, object: DataObject) -> Self {
        RankedResult {
            id: object.id,
            collection: collection.to_string(),
            properties: object.properties,
            score: object.score,
            fused_score: None,
            semantic_rank: None,
            keyword_rank: None,
            sources: Vec::new(),
        }
    }
}

/// Search response as returned by the search tools
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    pub total: usize,
    pub query: String,
    pub collection_name: String,
    pub tenant_id: Option<String>,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

/// Both sub-rankings of a hybrid search and their fusion
#[derive(Debug)]
struct FusionOutcome {
    semantic: Vec<DataObject>,
    keyword: Vec<DataObject>,
    fused: Vec<FusedEntry<String>>,
}

impl FusionOutcome {
    /// Materialize the top `limit` fused entries.
    ///
    /// The native score comes from the semantic hit when there is one,
    /// otherwise from the keyword hit.
    fn into_results(self, collection: &str, limit: usize, alpha: f64) -> Vec<RankedResult> {
        let mut semantic: HashMap<String, DataObject> = self
            .semantic
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect();
        let mut keyword: HashMap<String, DataObject> = self
            .keyword
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect();

        self.fused
            .into_iter()
            .take(limit)
            .filter_map(|entry| {
                let from_semantic = semantic.remove(&entry.id);
                let from_keyword = keyword.remove(&entry.id);
                let score = from_semantic
                    .as_ref()
                    .and_then(|o| o.score)
                    .or_else(|| from_keyword.as_ref().and_then(|o| o.score));
                let object = from_semantic.or(from_keyword)?;
                Some(RankedResult {
                    id: object.id,
                    collection: collection.to_string(),
                    properties: object.properties,
                    score,
                    fused_score: Some(entry.score),
                    semantic_rank: entry.semantic_rank,
                    keyword_rank: entry.keyword_rank,
                    sources: entry.sources(alpha),
                })
            })
            .collect()
    }
}

/// Search engine bound to a session
pub struct SearchEngine<'a> {
    session: &'a Session,
}

impl<'a> SearchEngine<'a> {
    pub fn new(session: &'a Session) -> Self {
        SearchEngine { session }
    }

    /// Run a search request
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let result = self.execute(&request).await;
        if let Err(e) = &result {
            tracing::debug!(
                "{} search on {} failed: {}",
                request.mode.name(),
                request.collection,
                e
            );
        }
        let results = result?;

        Ok(SearchResponse {
            total: results.len(),
            results,
            query: request.query,
            collection_name: request.collection,
            tenant_id: request.tenant_id,
            mode: request.mode.name(),
            alpha: match request.mode {
                SearchMode::Hybrid { alpha } => Some(alpha),
                _ => None,
            },
        })
    }

    async fn execute(&self, request: &SearchRequest) -> Result<Vec<RankedResult>> {
        validate_request(request, self.session.config().max_limit)?;

        let schema = SchemaService::new(self.session)
            .resolve(&request.collection)
            .await?;
        let tenant = request.tenant_id.as_deref();
        check_tenant(&schema, tenant)?;
        if request.mode.needs_vectorizer() && !schema.has_vectorizer() {
            return Err(Error::UnsupportedOperation(format!(
                "Collection {} has no vectorizer configured; {} search needs one",
                schema.name,
                request.mode.name()
            )));
        }
        tracing::debug!(
            "{} search on {} validated (limit {})",
            request.mode.name(),
            schema.name,
            request.limit
        );

        let scope = QueryScope {
            collection: &schema,
            tenant,
        };
        let query = request.query.as_str();
        let limit = request.limit;
        let timeout = self.session.config().timeout_query;
        let deadline = Instant::now() + timeout;
        let backend = self.session.backend();

        let results = match request.mode {
            SearchMode::Semantic => {
                let hits = bounded(
                    "semantic query",
                    deadline,
                    timeout,
                    backend.near_text(scope, query, limit),
                )
                .await?;
                into_results(&schema.name, hits, limit)
            }
            SearchMode::Keyword => {
                let hits = bounded(
                    "keyword query",
                    deadline,
                    timeout,
                    backend.bm25(scope, query, limit),
                )
                .await?;
                into_results(&schema.name, hits, limit)
            }
            SearchMode::Hybrid { alpha } => self
                .hybrid(scope, query, limit, alpha, deadline)
                .await?
                .into_results(&schema.name, limit, alpha),
        };

        tracing::debug!(
            "{} search on {} completed with {} results",
            request.mode.name(),
            schema.name,
            results.len()
        );
        Ok(results)
    }

    /// Run both sub-queries concurrently and fuse them.
    ///
    /// Both sub-queries fetch [`fusion_depth`] candidates and the full lists
    /// are fused; truncation to `limit` happens afterwards, so the top `n`
    /// results never depend on `limit`. The first failure, or the shared
    /// deadline, drops the other sub-query.
    async fn hybrid(
        &self,
        scope: QueryScope<'_>,
        query: &str,
        limit: usize,
        alpha: f64,
        deadline: Instant,
    ) -> Result<FusionOutcome> {
        let backend = self.session.backend();
        let config = self.session.config();
        let timeout = config.timeout_query;
        let depth = fusion_depth(limit, config.max_limit);
        let semantic = bounded(
            "semantic query",
            deadline,
            timeout,
            backend.near_text(scope, query, depth),
        );
        let keyword = bounded(
            "keyword query",
            deadline,
            timeout,
            backend.bm25(scope, query, depth),
        );
        let (mut semantic, mut keyword) = tokio::try_join!(semantic, keyword)?;
        semantic.truncate(depth);
        keyword.truncate(depth);

        tracing::debug!(
            "Fusing {} semantic and {} keyword hits (depth {}, alpha {})",
            semantic.len(),
            keyword.len(),
            depth,
            alpha
        );

        let semantic_ids: Vec<String> = semantic.iter().map(|o| o.id.clone()).collect();
        let keyword_ids: Vec<String> = keyword.iter().map(|o| o.id.clone()).collect();
        let fused = reciprocal_rank_fusion(
            &semantic_ids,
            &keyword_ids,
            alpha,
            self.session.config().rrf_k,
        );

        Ok(FusionOutcome {
            semantic,
            keyword,
            fused,
        })
    }
}

/// Candidates fetched per hybrid sub-query.
///
/// Independent of `limit` (which validation already caps at `max_limit`), so
/// every limit fuses the same candidate lists.
fn fusion_depth(limit: usize, max_limit: usize) -> usize {
    max_limit.max(limit)
}

/// Await `query` until the shared `deadline`
async fn bounded<T, F>(operation: &str, deadline: Instant, timeout: Duration, query: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(deadline, query).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, timeout)),
    }
}

fn into_results(collection: &str, mut hits: Vec<DataObject>, limit: usize) -> Vec<RankedResult> {
    hits.truncate(limit);
    hits.into_iter()
        .map(|o| RankedResult::from_object(collection, o))
        .collect()
}

/// Argument checks that need no backend access
fn validate_request(request: &SearchRequest, max_limit: usize) -> Result<()> {
    if request.query.trim().is_empty() {
        return Err(Error::Validation("query must not be empty".to_string()));
    }
    validate_limit(request.limit, max_limit)?;
    if let SearchMode::Hybrid { alpha } = request.mode {
        if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
            return Err(Error::Validation(format!(
                "alpha must be between 0 and 1, got {}",
                alpha
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: SearchMode) -> SearchRequest {
        SearchRequest {
            collection: "Products".to_string(),
            query: "red bicycle".to_string(),
            mode,
            limit: 5,
            tenant_id: None,
        }
    }

    #[test]
    fn test_validate_request() {
        assert!(validate_request(&request(SearchMode::Semantic), 100).is_ok());
        assert!(validate_request(&request(SearchMode::Hybrid { alpha: 0.0 }), 100).is_ok());
        assert!(validate_request(&request(SearchMode::Hybrid { alpha: 1.0 }), 100).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_alpha() {
        for alpha in [-0.1, 1.01, f64::NAN, f64::INFINITY] {
            let err = validate_request(&request(SearchMode::Hybrid { alpha }), 100).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "alpha {} accepted", alpha);
        }
    }

    #[test]
    fn test_validate_rejects_blank_query_and_limits() {
        let mut req = request(SearchMode::Keyword);
        req.query = "   ".to_string();
        assert!(matches!(validate_request(&req, 100), Err(Error::Validation(_))));

        let mut req = request(SearchMode::Keyword);
        req.limit = 0;
        assert!(matches!(validate_request(&req, 100), Err(Error::Validation(_))));

        let mut req = request(SearchMode::Keyword);
        req.limit = 101;
        assert!(matches!(validate_request(&req, 100), Err(Error::Validation(_))));
    }

    #[test]
    fn test_fusion_depth_ignores_limit() {
        assert_eq!(fusion_depth(1, 100), 100);
        assert_eq!(fusion_depth(100, 100), 100);
        assert_eq!(fusion_depth(1, 1), 1);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(SearchMode::Semantic.name(), "semantic");
        assert_eq!(SearchMode::Keyword.name(), "keyword");
        assert_eq!(SearchMode::Hybrid { alpha: 0.3 }.name(), "hybrid");
        assert!(!SearchMode::Keyword.needs_vectorizer());
        assert!(SearchMode::Hybrid { alpha: 0.0 }.needs_vectorizer());
    }
}
