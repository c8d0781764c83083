//! MCP tool definitions and dispatch
//!
//! A `tools/call` request is parsed into a typed [`ToolCall`] and routed to
//! the owning service. Every failure, argument errors included, comes back as
//! a [`ToolResult`] flagged `isError` with the error kind preserved.

use super::protocol::{ToolDefinition, ToolResult};
use crate::connection::{ConnectionManager, Session};
use crate::error::{Error, Result};
use crate::objects::{PaginatedFetcher, DEFAULT_PAGE_LIMIT};
use crate::schema::SchemaService;
use crate::search::{SearchEngine, SearchMode, SearchRequest, DEFAULT_ALPHA, DEFAULT_SEARCH_LIMIT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

fn default_page_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_alpha() -> f64 {
    DEFAULT_ALPHA
}

/// Arguments naming a single collection
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionParams {
    #[serde(alias = "collection")]
    pub collection_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetSchemaParams {
    #[serde(default, alias = "collection")]
    pub collection_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetObjectsParams {
    #[serde(alias = "collection")]
    pub collection_name: String,
    #[serde(default = "default_page_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Arguments shared by `search`, `semantic_search` and `keyword_search`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(alias = "collection")]
    pub collection_name: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl SearchParams {
    fn into_request(self, mode: SearchMode) -> SearchRequest {
        SearchRequest {
            collection: self.collection_name,
            query: self.query,
            mode,
            limit: self.limit,
            tenant_id: self.tenant_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HybridSearchParams {
    pub query: String,
    #[serde(alias = "collection")]
    pub collection_name: String,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// A parsed tool invocation
#[derive(Debug, Clone)]
pub enum ToolCall {
    GetConfig,
    CheckConnection,
    ListCollections,
    GetSchema(GetSchemaParams),
    GetCollectionObjects(GetObjectsParams),
    Search(SearchParams),
    SemanticSearch(SearchParams),
    KeywordSearch(SearchParams),
    HybridSearch(HybridSearchParams),
    IsMultiTenancyEnabled(CollectionParams),
    GetTenantList(CollectionParams),
}

impl ToolCall {
    /// Parse a tool name and its argument object.
    ///
    /// Unknown names fail with [`Error::UnknownTool`]; missing or mistyped
    /// arguments with [`Error::Validation`]. A null argument bag counts as
    /// empty.
    pub fn parse(name: &str, arguments: Value) -> Result<Self> {
        let arguments = match arguments {
            Value::Object(_) => arguments,
            Value::Null => Value::Object(Map::new()),
            other => {
                return Err(Error::Validation(format!(
                    "Tool arguments must be a JSON object, got {}",
                    other
                )))
            }
        };

        let call = match name {
            "get_config" => ToolCall::GetConfig,
            "check_connection" => ToolCall::CheckConnection,
            "list_collections" => ToolCall::ListCollections,
            "get_schema" => ToolCall::GetSchema(params(name, arguments)?),
            "get_collection_objects" => ToolCall::GetCollectionObjects(params(name, arguments)?),
            "search" => ToolCall::Search(params(name, arguments)?),
            "semantic_search" => ToolCall::SemanticSearch(params(name, arguments)?),
            "keyword_search" => ToolCall::KeywordSearch(params(name, arguments)?),
            "hybrid_search" => ToolCall::HybridSearch(params(name, arguments)?),
            "is_multi_tenancy_enabled" => ToolCall::IsMultiTenancyEnabled(params(name, arguments)?),
            "get_tenant_list" => ToolCall::GetTenantList(params(name, arguments)?),
            _ => return Err(Error::UnknownTool(name.to_string())),
        };
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetConfig => "get_config",
            ToolCall::CheckConnection => "check_connection",
            ToolCall::ListCollections => "list_collections",
            ToolCall::GetSchema(_) => "get_schema",
            ToolCall::GetCollectionObjects(_) => "get_collection_objects",
            ToolCall::Search(_) => "search",
            ToolCall::SemanticSearch(_) => "semantic_search",
            ToolCall::KeywordSearch(_) => "keyword_search",
            ToolCall::HybridSearch(_) => "hybrid_search",
            ToolCall::IsMultiTenancyEnabled(_) => "is_multi_tenancy_enabled",
            ToolCall::GetTenantList(_) => "get_tenant_list",
        }
    }
}

fn params<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| Error::Validation(format!("Invalid arguments for {}: {}", tool, e)))
}

fn to_value<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Routes tool calls to the services sharing one [`Session`]
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    session: Session,
}

impl ToolDispatcher {
    pub fn new(session: Session) -> Self {
        ToolDispatcher { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run a tool and render its outcome as MCP content
    pub async fn call(&self, name: &str, arguments: Value) -> ToolResult {
        let rendered = match self.dispatch(name, arguments).await {
            Ok(value) => serde_json::to_string_pretty(&value).map_err(Error::from),
            Err(e) => Err(e),
        };

        match rendered {
            Ok(text) => ToolResult::text(text),
            Err(e) => {
                tracing::warn!("Tool {} failed ({}): {}", name, e.kind(), e);
                ToolResult::error(&e)
            }
        }
    }

    /// Parse and execute a tool call, returning its JSON payload
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Value> {
        let call = ToolCall::parse(name, arguments)?;
        tracing::debug!("Dispatching tool {}", call.name());
        self.execute(call).await
    }

    pub async fn execute(&self, call: ToolCall) -> Result<Value> {
        let session = &self.session;
        match call {
            ToolCall::GetConfig => Ok(session.config().masked()),
            ToolCall::CheckConnection => to_value(ConnectionManager::check(session).await),
            ToolCall::ListCollections => {
                let collections = SchemaService::new(session).list_collections().await?;
                Ok(json!({
                    "total": collections.len(),
                    "collections": collections,
                }))
            }
            ToolCall::GetSchema(p) => to_value(
                SchemaService::new(session)
                    .get_schema(p.collection_name.as_deref())
                    .await?,
            ),
            ToolCall::GetCollectionObjects(p) => to_value(
                PaginatedFetcher::new(session)
                    .get_objects(&p.collection_name, p.limit, p.offset, p.tenant_id.as_deref())
                    .await?,
            ),
            ToolCall::Search(p) => {
                self.search(p.into_request(SearchMode::Hybrid {
                    alpha: DEFAULT_ALPHA,
                }))
                .await
            }
            ToolCall::SemanticSearch(p) => self.search(p.into_request(SearchMode::Semantic)).await,
            ToolCall::KeywordSearch(p) => self.search(p.into_request(SearchMode::Keyword)).await,
            ToolCall::HybridSearch(p) => {
                self.search(SearchRequest {
                    collection: p.collection_name,
                    query: p.query,
                    mode: SearchMode::Hybrid { alpha: p.alpha },
                    limit: p.limit,
                    tenant_id: p.tenant_id,
                })
                .await
            }
            ToolCall::IsMultiTenancyEnabled(p) => {
                let enabled = SchemaService::new(session)
                    .is_multi_tenancy_enabled(&p.collection_name)
                    .await?;
                Ok(json!({
                    "collection_name": p.collection_name,
                    "multi_tenancy_enabled": enabled,
                }))
            }
            ToolCall::GetTenantList(p) => {
                let service = SchemaService::new(session);
                let enabled = service.is_multi_tenancy_enabled(&p.collection_name).await?;
                let tenants = service.get_tenant_list(&p.collection_name).await?;
                Ok(json!({
                    "collection_name": p.collection_name,
                    "multi_tenancy_enabled": enabled,
                    "tenant_count": tenants.len(),
                    "tenants": tenants,
                }))
            }
        }
    }

    async fn search(&self, request: SearchRequest) -> Result<Value> {
        to_value(SearchEngine::new(&self.session).search(request).await?)
    }
}

fn collection_property() -> Value {
    json!({
        "type": "string",
        "description": "Name of the collection"
    })
}

fn tenant_property() -> Value {
    json!({
        "type": "string",
        "description": "Tenant to scope the query to (required for multi-tenant collections)"
    })
}

fn search_schema(extra: Option<(&str, Value)>) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "query".to_string(),
        json!({ "type": "string", "description": "Search query text" }),
    );
    properties.insert("collection_name".to_string(), collection_property());
    properties.insert(
        "limit".to_string(),
        json!({
            "type": "integer",
            "description": format!("Maximum number of results (default: {})", DEFAULT_SEARCH_LIMIT),
            "default": DEFAULT_SEARCH_LIMIT,
            "minimum": 1
        }),
    );
    properties.insert("tenant_id".to_string(), tenant_property());
    if let Some((name, schema)) = extra {
        properties.insert(name.to_string(), schema);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": ["query", "collection_name"]
    })
}

fn collection_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "collection_name": collection_property() },
        "required": ["collection_name"]
    })
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Get all tool definitions
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    let no_arguments = json!({ "type": "object", "properties": {} });

    vec![
        tool(
            "get_config",
            "Show the active Weaviate connection configuration with secrets masked.",
            no_arguments.clone(),
        ),
        tool(
            "check_connection",
            "Check whether the Weaviate instance is reachable and ready.",
            no_arguments.clone(),
        ),
        tool(
            "list_collections",
            "List the names of all collections in the Weaviate instance.",
            no_arguments,
        ),
        tool(
            "get_schema",
            "Get the schema of one collection, or of every collection when no name is given.",
            json!({
                "type": "object",
                "properties": { "collection_name": collection_property() }
            }),
        ),
        tool(
            "get_collection_objects",
            "Fetch objects from a collection with offset/limit pagination.",
            json!({
                "type": "object",
                "properties": {
                    "collection_name": collection_property(),
                    "limit": {
                        "type": "integer",
                        "description": format!("Maximum number of objects (default: {})", DEFAULT_PAGE_LIMIT),
                        "default": DEFAULT_PAGE_LIMIT,
                        "minimum": 1
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Number of objects to skip (default: 0)",
                        "default": 0,
                        "minimum": 0
                    },
                    "tenant_id": tenant_property()
                },
                "required": ["collection_name"]
            }),
        ),
        tool(
            "search",
            "Search a collection combining semantic and keyword relevance (hybrid search with alpha 0.3).",
            search_schema(None),
        ),
        tool(
            "semantic_search",
            "Vector similarity search using the collection's vectorizer.",
            search_schema(None),
        ),
        tool(
            "keyword_search",
            "BM25 keyword search.",
            search_schema(None),
        ),
        tool(
            "hybrid_search",
            "Hybrid search fusing semantic and keyword rankings with weighted Reciprocal Rank Fusion. alpha weights the semantic side: 1.0 is pure semantic, 0.0 pure keyword.",
            search_schema(Some((
                "alpha",
                json!({
                    "type": "number",
                    "description": format!("Semantic weight between 0 and 1 (default: {})", DEFAULT_ALPHA),
                    "default": DEFAULT_ALPHA,
                    "minimum": 0.0,
                    "maximum": 1.0
                }),
            ))),
        ),
        tool(
            "is_multi_tenancy_enabled",
            "Check whether a collection has multi-tenancy enabled.",
            collection_schema(),
        ),
        tool(
            "get_tenant_list",
            "List the tenants of a multi-tenant collection.",
            collection_schema(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CollectionSchema, MemoryBackend, PropertySchema};
    use crate::config::Config;
    use std::sync::Arc;

    async fn dispatcher() -> ToolDispatcher {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_collection(CollectionSchema {
            name: "Articles".to_string(),
            properties: vec![PropertySchema::new("title", "text")],
            vectorizer: Some("text2vec-openai".to_string()),
            multi_tenancy_enabled: false,
            auto_tenant_creation: None,
        });
        backend
            .insert("Articles", None, "a1", json!({"title": "Rust ownership"}))
            .unwrap();
        let session = ConnectionManager::connect_with(Config::local("localhost", 8080, 50051), backend)
            .await
            .unwrap();
        ToolDispatcher::new(session)
    }

    fn error_body(result: &ToolResult) -> Value {
        assert!(result.is_error);
        serde_json::from_str(&result.content[0].text).unwrap()
    }

    #[test]
    fn test_tool_definitions_valid() {
        let tools = get_tool_definitions();
        assert_eq!(tools.len(), 11);

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        for expected in [
            "get_config",
            "check_connection",
            "list_collections",
            "get_schema",
            "get_collection_objects",
            "search",
            "semantic_search",
            "keyword_search",
            "hybrid_search",
            "is_multi_tenancy_enabled",
            "get_tenant_list",
        ] {
            assert!(names.contains(&expected), "missing tool {}", expected);
        }
    }

    #[test]
    fn test_tool_definitions_have_schemas() {
        for tool in get_tool_definitions() {
            assert!(!tool.description.is_empty(), "{} has empty description", tool.name);
            assert_eq!(tool.input_schema["type"], "object", "{} has invalid schema", tool.name);
        }
    }

    #[test]
    fn test_every_definition_parses() {
        for tool in get_tool_definitions() {
            let err = ToolCall::parse(&tool.name, json!({})).err();
            assert!(
                !matches!(err, Some(Error::UnknownTool(_))),
                "{} is published but not dispatched",
                tool.name
            );
        }
    }

    #[test]
    fn test_parse_defaults_and_alias() {
        let call = ToolCall::parse("hybrid_search", json!({"query": "q", "collection": "Articles"}))
            .unwrap();
        let ToolCall::HybridSearch(p) = call else {
            panic!("expected hybrid_search");
        };
        assert_eq!(p.collection_name, "Articles");
        assert_eq!(p.alpha, DEFAULT_ALPHA);
        assert_eq!(p.limit, DEFAULT_SEARCH_LIMIT);
        assert!(p.tenant_id.is_none());

        let ToolCall::GetCollectionObjects(p) =
            ToolCall::parse("get_collection_objects", json!({"collection_name": "Articles"})).unwrap()
        else {
            panic!("expected get_collection_objects");
        };
        assert_eq!(p.limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(matches!(
            ToolCall::parse("search", json!({"collection_name": "Articles"})),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ToolCall::parse("search", json!({"query": "q", "collection_name": "Articles", "limit": "ten"})),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ToolCall::parse("get_collection_objects", json!({"collection_name": "Articles", "offset": -1})),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            ToolCall::parse("list_collections", json!(["not", "an", "object"])),
            Err(Error::Validation(_))
        ));
        assert!(ToolCall::parse("list_collections", Value::Null).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_tool_error() {
        let dispatcher = dispatcher().await;
        let result = dispatcher.call("drop_everything", json!({})).await;
        let body = error_body(&result);
        assert_eq!(body["error"]["kind"], "UnknownToolError");
    }

    #[tokio::test]
    async fn test_missing_query_error() {
        let dispatcher = dispatcher().await;
        let result = dispatcher
            .call("keyword_search", json!({"collection_name": "Articles"}))
            .await;
        let body = error_body(&result);
        assert_eq!(body["error"]["kind"], "ValidationError");
        assert!(body["error"]["message"].as_str().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn test_list_collections_tool() {
        let dispatcher = dispatcher().await;
        let result = dispatcher.call("list_collections", json!({})).await;
        assert!(!result.is_error);
        let value: Value = serde_json::from_str(&result.content[0].text).unwrap();
        assert_eq!(value["collections"], json!(["Articles"]));
        assert_eq!(value["total"], 1);
    }

    #[tokio::test]
    async fn test_get_config_is_masked() {
        let dispatcher = dispatcher().await;
        let value = dispatcher.dispatch("get_config", json!({})).await.unwrap();
        assert_eq!(value["connection_type"], "local");
        assert_eq!(value["host"], "localhost");
    }

    #[tokio::test]
    async fn test_not_found_kind_preserved() {
        let dispatcher = dispatcher().await;
        let result = dispatcher
            .call("get_schema", json!({"collection_name": "Ghost"}))
            .await;
        let body = error_body(&result);
        assert_eq!(body["error"]["kind"], "NotFoundError");
    }

    #[tokio::test]
    async fn test_tenant_list_single_tenant_collection() {
        let dispatcher = dispatcher().await;
        let value = dispatcher
            .dispatch("get_tenant_list", json!({"collection_name": "Articles"}))
            .await
            .unwrap();
        assert_eq!(value["multi_tenancy_enabled"], false);
        assert_eq!(value["tenants"], json!([]));
        assert_eq!(value["tenant_count"], 0);
    }
}
