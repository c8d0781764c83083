//! Backend store abstraction
//!
//! The [`Backend`] trait is the seam between the services and the search
//! store. [`WeaviateBackend`] talks to a real Weaviate instance;
//! [`MemoryBackend`] keeps everything in process for tests and offline demos.

mod memory;
mod weaviate;

pub use memory::{MemoryBackend, QueryKind};
pub use weaviate::WeaviateBackend;

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// Property definition within a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    pub name: String,
    pub data_type: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertySchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        PropertySchema {
            name: name.into(),
            data_type: vec![data_type.into()],
            description: None,
        }
    }
}

/// Read-only view of a collection (a Weaviate class)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSchema {
    pub name: String,
    pub properties: Vec<PropertySchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectorizer: Option<String>,
    pub multi_tenancy_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_tenant_creation: Option<bool>,
}

impl CollectionSchema {
    /// Whether the backend can embed query text for this collection
    pub fn has_vectorizer(&self) -> bool {
        matches!(self.vectorizer.as_deref(), Some(v) if !v.is_empty() && v != "none")
    }
}

/// Object returned by the backend, in backend order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataObject {
    pub id: String,
    pub properties: Map<String, Value>,
    /// Backend-native relevance score (certainty for vector queries, BM25
    /// score for keyword queries); absent for plain fetches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Target of a data query: a resolved collection plus optional tenant
#[derive(Debug, Clone, Copy)]
pub struct QueryScope<'a> {
    pub collection: &'a CollectionSchema,
    pub tenant: Option<&'a str>,
}

/// Read-only operations the services need from the store.
///
/// Implementations must be safe to share across concurrent tool calls.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Readiness probe
    async fn is_ready(&self) -> Result<bool>;

    /// All collections, in backend order
    async fn list_collections(&self) -> Result<Vec<CollectionSchema>>;

    /// A single collection, `None` when it does not exist
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionSchema>>;

    /// Tenant names of a multi-tenant collection
    async fn list_tenants(&self, collection: &CollectionSchema) -> Result<Vec<String>>;

    /// Plain paginated retrieval
    async fn fetch_objects(
        &self,
        scope: QueryScope<'_>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DataObject>>;

    /// Vector-similarity query; the backend embeds `query`
    async fn near_text(
        &self,
        scope: QueryScope<'_>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<DataObject>>;

    /// Lexical (BM25) query
    async fn bm25(&self, scope: QueryScope<'_>, query: &str, limit: usize)
        -> Result<Vec<DataObject>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_vectorizer() {
        let mut schema = CollectionSchema {
            name: "Articles".to_string(),
            properties: vec![PropertySchema::new("title", "text")],
            vectorizer: Some("text2vec-openai".to_string()),
            multi_tenancy_enabled: false,
            auto_tenant_creation: None,
        };
        assert!(schema.has_vectorizer());

        schema.vectorizer = Some("none".to_string());
        assert!(!schema.has_vectorizer());

        schema.vectorizer = None;
        assert!(!schema.has_vectorizer());
    }
}
