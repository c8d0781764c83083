//! In-process backend for tests and offline demos
//!
//! Holds collections and objects in memory. Query rankings can be pinned per
//! query text, and failures or latency can be injected per query kind so the
//! search engine's error and deadline handling can be exercised without a
//! running Weaviate.

use super::{Backend, CollectionSchema, DataObject, QueryScope};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Which query path a pinned ranking, failure or delay applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Semantic,
    Keyword,
}

type FailureFn = Arc<dyn Fn() -> Error + Send + Sync>;

#[derive(Debug, Default)]
struct MemoryCollection {
    schema: Option<CollectionSchema>,
    objects: Vec<DataObject>,
    tenants: BTreeMap<String, Vec<DataObject>>,
}

/// In-memory [`Backend`]
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<Vec<MemoryCollection>>,
    rankings: RwLock<HashMap<(String, QueryKind, String), Vec<String>>>,
    failures: RwLock<HashMap<QueryKind, FailureFn>>,
    delays: RwLock<HashMap<QueryKind, Duration>>,
    not_ready: AtomicBool,
    in_flight: Arc<AtomicUsize>,
}

/// Counts a query as in flight until dropped, including on cancellation
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection; re-adding a name replaces its schema
    pub fn add_collection(&self, schema: CollectionSchema) {
        let mut collections = write(&self.collections);
        match collections
            .iter_mut()
            .find(|c| c.schema.as_ref().is_some_and(|s| s.name == schema.name))
        {
            Some(existing) => existing.schema = Some(schema),
            None => collections.push(MemoryCollection {
                schema: Some(schema),
                ..Default::default()
            }),
        }
    }

    /// Create an (empty) tenant in a multi-tenant collection
    pub fn add_tenant(&self, collection: &str, tenant: &str) -> Result<()> {
        let mut collections = write(&self.collections);
        let entry = find_mut(&mut collections, collection)?;
        entry.tenants.entry(tenant.to_string()).or_default();
        Ok(())
    }

    /// Append an object; `tenant` selects the tenant partition
    pub fn insert(
        &self,
        collection: &str,
        tenant: Option<&str>,
        id: &str,
        properties: Value,
    ) -> Result<()> {
        let properties = match properties {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(Error::Validation(format!(
                    "Object properties must be a JSON object, got {}",
                    other
                )))
            }
        };
        let object = DataObject {
            id: id.to_string(),
            properties,
            score: None,
        };

        let mut collections = write(&self.collections);
        let entry = find_mut(&mut collections, collection)?;
        match tenant {
            Some(t) => entry.tenants.entry(t.to_string()).or_default().push(object),
            None => entry.objects.push(object),
        }
        Ok(())
    }

    /// Pin the ranking (best first) returned for `query` on `collection`.
    ///
    /// Ids that do not exist in the queried scope are skipped at query time.
    pub fn set_ranking(&self, collection: &str, kind: QueryKind, query: &str, ids: &[&str]) {
        write(&self.rankings).insert(
            (collection.to_string(), kind, query.to_string()),
            ids.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Make every query of `kind` fail with the error built by `make_error`
    pub fn fail_with<F>(&self, kind: QueryKind, make_error: F)
    where
        F: Fn() -> Error + Send + Sync + 'static,
    {
        write(&self.failures).insert(kind, Arc::new(make_error));
    }

    /// Delay every query of `kind` before it answers
    pub fn delay(&self, kind: QueryKind, duration: Duration) {
        write(&self.delays).insert(kind, duration);
    }

    pub fn set_ready(&self, ready: bool) {
        self.not_ready.store(!ready, Ordering::SeqCst);
    }

    /// Number of vector/keyword queries currently executing
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn scoped_objects(&self, scope: QueryScope<'_>) -> Result<Vec<DataObject>> {
        let collections = read(&self.collections);
        let entry = find(&collections, &scope.collection.name)?;
        match scope.tenant {
            Some(tenant) => entry
                .tenants
                .get(tenant)
                .cloned()
                .ok_or_else(|| Error::TenantNotFound {
                    collection: scope.collection.name.clone(),
                    tenant: tenant.to_string(),
                }),
            None => Ok(entry.objects.clone()),
        }
    }

    async fn run_query(
        &self,
        kind: QueryKind,
        scope: QueryScope<'_>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<DataObject>> {
        let _guard = InFlight::enter(&self.in_flight);

        let delay = read(&self.delays).get(&kind).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = read(&self.failures).get(&kind).cloned();
        if let Some(make_error) = failure {
            return Err(make_error());
        }

        let objects = self.scoped_objects(scope)?;
        let pinned = read(&self.rankings)
            .get(&(scope.collection.name.clone(), kind, query.to_string()))
            .cloned();

        let mut ranked: Vec<DataObject> = match pinned {
            Some(ids) => ids
                .iter()
                .filter_map(|id| objects.iter().find(|o| &o.id == id).cloned())
                .collect(),
            None => rank_by_term_overlap(objects, query),
        };
        ranked.truncate(limit);

        let total = ranked.len();
        for (rank, object) in ranked.iter_mut().enumerate() {
            object.score = Some(match kind {
                QueryKind::Semantic => 1.0 - rank as f64 / (total.max(1) as f64 * 2.0),
                QueryKind::Keyword => (total - rank) as f64,
            });
        }
        Ok(ranked)
    }
}

fn find<'a>(collections: &'a [MemoryCollection], name: &str) -> Result<&'a MemoryCollection> {
    collections
        .iter()
        .find(|c| c.schema.as_ref().is_some_and(|s| s.name == name))
        .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
}

fn find_mut<'a>(
    collections: &'a mut [MemoryCollection],
    name: &str,
) -> Result<&'a mut MemoryCollection> {
    collections
        .iter_mut()
        .find(|c| c.schema.as_ref().is_some_and(|s| s.name == name))
        .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
}

/// Fallback ranking: number of query terms found in string properties.
/// Stable on ties, so insertion order breaks them.
fn rank_by_term_overlap(objects: Vec<DataObject>, query: &str) -> Vec<DataObject> {
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    let mut scored: Vec<(usize, DataObject)> = objects
        .into_iter()
        .map(|o| {
            let text = o
                .properties
                .values()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            let hits = terms.iter().filter(|t| text.contains(t.as_str())).count();
            (hits, o)
        })
        .filter(|(hits, _)| *hits > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, o)| o).collect()
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn is_ready(&self) -> Result<bool> {
        Ok(!self.not_ready.load(Ordering::SeqCst))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSchema>> {
        Ok(read(&self.collections)
            .iter()
            .filter_map(|c| c.schema.clone())
            .collect())
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionSchema>> {
        Ok(read(&self.collections)
            .iter()
            .filter_map(|c| c.schema.as_ref())
            .find(|s| s.name == name)
            .cloned())
    }

    async fn list_tenants(&self, collection: &CollectionSchema) -> Result<Vec<String>> {
        let collections = read(&self.collections);
        let entry = find(&collections, &collection.name)?;
        Ok(entry.tenants.keys().cloned().collect())
    }

    async fn fetch_objects(
        &self,
        scope: QueryScope<'_>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DataObject>> {
        Ok(self
            .scoped_objects(scope)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn near_text(
        &self,
        scope: QueryScope<'_>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<DataObject>> {
        self.run_query(QueryKind::Semantic, scope, query, limit).await
    }

    async fn bm25(
        &self,
        scope: QueryScope<'_>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<DataObject>> {
        self.run_query(QueryKind::Keyword, scope, query, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PropertySchema;
    use serde_json::json;

    fn products() -> CollectionSchema {
        CollectionSchema {
            name: "Products".to_string(),
            properties: vec![PropertySchema::new("name", "text")],
            vectorizer: Some("text2vec-openai".to_string()),
            multi_tenancy_enabled: false,
            auto_tenant_creation: None,
        }
    }

    #[tokio::test]
    async fn test_pinned_ranking_skips_unknown_ids() {
        let backend = MemoryBackend::new();
        backend.add_collection(products());
        backend.insert("Products", None, "P1", json!({"name": "a"})).unwrap();
        backend.insert("Products", None, "P2", json!({"name": "b"})).unwrap();
        backend.set_ranking("Products", QueryKind::Semantic, "q", &["P2", "P404", "P1"]);

        let schema = products();
        let scope = QueryScope {
            collection: &schema,
            tenant: None,
        };
        let hits = backend.near_text(scope, "q", 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["P2", "P1"]);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(backend.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_term_overlap_fallback() {
        let backend = MemoryBackend::new();
        backend.add_collection(products());
        backend
            .insert("Products", None, "P1", json!({"name": "blue bicycle"}))
            .unwrap();
        backend
            .insert("Products", None, "P2", json!({"name": "red bicycle"}))
            .unwrap();
        backend.insert("Products", None, "P3", json!({"name": "lamp"})).unwrap();

        let schema = products();
        let scope = QueryScope {
            collection: &schema,
            tenant: None,
        };
        let hits = backend.bm25(scope, "red bicycle", 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["P2", "P1"]);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let backend = MemoryBackend::new();
        backend.add_collection(products());
        backend.fail_with(QueryKind::Semantic, || {
            Error::EmbeddingProvider("invalid key".to_string())
        });

        let schema = products();
        let scope = QueryScope {
            collection: &schema,
            tenant: None,
        };
        let err = backend.near_text(scope, "q", 5).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider(_)));
        assert!(backend.bm25(scope, "q", 5).await.is_ok());
    }

    #[test]
    fn test_insert_unknown_collection() {
        let backend = MemoryBackend::new();
        let err = backend.insert("Nope", None, "x", json!({})).unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(_)));
    }
}
