//! Weaviate REST + GraphQL backend
//!
//! Schema, tenants and plain fetches use the REST API (`/v1/schema`,
//! `/v1/objects`); vector and keyword queries go through GraphQL `Get`.

use super::{Backend, CollectionSchema, DataObject, PropertySchema, QueryScope};
use crate::config::{Config, Endpoint};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Property data types that can be selected as scalar GraphQL fields
const SCALAR_TYPES: &[&str] = &[
    "text", "string", "int", "number", "boolean", "date", "uuid", "blob", "text[]", "string[]",
    "int[]", "number[]", "boolean[]", "date[]", "uuid[]",
];

/// Error message fragments that identify embedding-provider failures
const PROVIDER_ERROR_MARKERS: &[&str] = &[
    "api key",
    "apikey",
    "x-openai",
    "x-voyageai",
    "openai",
    "voyageai",
    "vectorize",
    "vectorizer",
    "embedding",
];

/// Weaviate's wording for a request naming a tenant the collection lacks,
/// e.g. `tenant not found: "tenantZ"` or `tenant "tenantZ" does not exist`
const TENANT_NOT_FOUND_PATTERN: &str =
    r#"(?i)tenant not found:?\s*"?([^"\s,;]*)|tenant\s+"?([^"\s,;]+)"?\s+(?:does not exist|not found)"#;

/// Backend speaking to a Weaviate instance over HTTP
#[derive(Debug, Clone)]
pub struct WeaviateBackend {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    #[serde(default)]
    classes: Vec<WeaviateClass>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeaviateClass {
    class: String,
    #[serde(default)]
    properties: Vec<WeaviateProperty>,
    #[serde(default)]
    vectorizer: Option<String>,
    #[serde(default)]
    vector_config: Option<Map<String, Value>>,
    #[serde(default)]
    multi_tenancy_config: Option<MultiTenancyConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeaviateProperty {
    name: String,
    #[serde(default)]
    data_type: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiTenancyConfig {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    auto_tenant_creation: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TenantEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectsResponse {
    #[serde(default)]
    objects: Vec<ObjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl From<WeaviateClass> for CollectionSchema {
    fn from(class: WeaviateClass) -> Self {
        let vectorizer = resolve_vectorizer(class.vectorizer, class.vector_config.as_ref());
        let (multi_tenancy_enabled, auto_tenant_creation) = match class.multi_tenancy_config {
            Some(mt) => (mt.enabled, mt.auto_tenant_creation.filter(|_| mt.enabled)),
            None => (false, None),
        };
        CollectionSchema {
            name: class.class,
            properties: class
                .properties
                .into_iter()
                .map(|p| PropertySchema {
                    name: p.name,
                    data_type: p.data_type,
                    description: p.description.filter(|d| !d.is_empty()),
                })
                .collect(),
            vectorizer,
            multi_tenancy_enabled,
            auto_tenant_creation,
        }
    }
}

/// Legacy single-vector classes carry `vectorizer`; named-vector classes
/// carry it per vector under `vectorConfig.<name>.vectorizer.<module>`.
fn resolve_vectorizer(
    vectorizer: Option<String>,
    vector_config: Option<&Map<String, Value>>,
) -> Option<String> {
    if let Some(v) = vectorizer.filter(|v| v != "none") {
        return Some(v);
    }
    vector_config
        .into_iter()
        .flat_map(|named| named.values())
        .filter_map(|cfg| cfg.get("vectorizer").and_then(Value::as_object))
        .flat_map(|modules| modules.keys())
        .find(|module| module.as_str() != "none")
        .cloned()
}

impl WeaviateBackend {
    /// Build a client for the configured endpoint.
    ///
    /// Authentication and embedding-provider credentials are attached as
    /// default headers so every request carries them.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Endpoint::Cloud { api_key, .. } = &config.endpoint {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", api_key))?);
        }
        for (name, value) in config.provider_headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Configuration(format!("Invalid header name {}: {}", name, e)))?;
            headers.insert(name, header_value(value)?);
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.timeout_init)
            .timeout(config.timeout_query)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.endpoint.base_url(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn graphql_get(&self, scope: QueryScope<'_>, query: &str) -> Result<Vec<Value>> {
        let collection = scope.collection.name.as_str();
        tracing::debug!("GraphQL: {}", query);
        let response = self
            .client
            .post(self.url("/v1/graphql"))
            .json(&json!({ "query": query }))
            .send()
            .await?;
        let response = check_status(response, collection, scope.tenant).await?;
        let body: GraphQlResponse = response.json().await?;

        if !body.errors.is_empty() {
            let message = body
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(classify_graphql_error(collection, scope.tenant, message));
        }

        Ok(body
            .data
            .as_ref()
            .and_then(|d| d.get("Get"))
            .and_then(|g| g.get(collection))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Configuration("API key contains invalid header characters".to_string()))
}

/// Map non-success HTTP statuses onto the error taxonomy
async fn check_status(
    response: Response,
    collection: &str,
    tenant: Option<&str>,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => Error::CollectionNotFound(collection.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Connection(format!("Authentication failed ({}): {}", status, body))
        }
        StatusCode::UNPROCESSABLE_ENTITY => {
            classify_graphql_error(collection, tenant, error_message(body))
        }
        _ => Error::Backend(format!("{}: {}", status, body)),
    })
}

/// Weaviate reports REST failures as `{"error": [{"message": ...}]}`; other
/// bodies pass through untouched
fn error_message(body: String) -> String {
    let messages: Vec<String> = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_array).cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(|e| e.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if messages.is_empty() {
        body
    } else {
        messages.join("; ")
    }
}

/// Map a backend error message onto the error taxonomy.
///
/// A missing tenant is reported under the name found in the message, or the
/// requested `tenant` when the message does not carry one.
fn classify_graphql_error(collection: &str, tenant: Option<&str>, message: String) -> Error {
    if let Some(missing) = missing_tenant(&message) {
        return Error::TenantNotFound {
            collection: collection.to_string(),
            tenant: missing
                .or(tenant)
                .unwrap_or_default()
                .to_string(),
        };
    }
    let lower = message.to_lowercase();
    if PROVIDER_ERROR_MARKERS.iter().any(|m| lower.contains(m)) {
        Error::EmbeddingProvider(message)
    } else if lower.contains("tenant") {
        Error::Validation(message)
    } else if lower.contains("no such class") || lower.contains("could not find class") {
        Error::CollectionNotFound(collection.to_string())
    } else {
        Error::Backend(message)
    }
}

/// `Some` when `message` reports an unknown tenant; the inner value is the
/// tenant name if the message includes it
fn missing_tenant(message: &str) -> Option<Option<&str>> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(TENANT_NOT_FOUND_PATTERN).expect("tenant pattern is valid"));
    let captures = pattern.captures(message)?;
    Some(
        captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str())
            .filter(|name| !name.is_empty()),
    )
}

/// Scalar property names to select in a GraphQL `Get`
fn selectable_properties(collection: &CollectionSchema) -> Vec<&str> {
    collection
        .properties
        .iter()
        .filter(|p| {
            p.data_type
                .first()
                .is_some_and(|t| SCALAR_TYPES.contains(&t.as_str()))
        })
        .map(|p| p.name.as_str())
        .collect()
}

/// Build a GraphQL `Get` query.
///
/// `search` is the already-rendered search argument (e.g. `nearText: {...}`);
/// string values are escaped with JSON string syntax, which GraphQL accepts.
fn build_get_query(
    scope: QueryScope<'_>,
    search: &str,
    limit: usize,
    additional: &str,
) -> String {
    let mut args = vec![search.to_string(), format!("limit: {}", limit)];
    if let Some(tenant) = scope.tenant {
        args.push(format!("tenant: {}", quote(tenant)));
    }
    let mut fields = selectable_properties(scope.collection).join(" ");
    if !fields.is_empty() {
        fields.push(' ');
    }
    format!(
        "{{ Get {{ {}({}) {{ {}_additional {{ {} }} }} }} }}",
        scope.collection.name,
        args.join(", "),
        fields,
        additional
    )
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Convert one GraphQL hit into a [`DataObject`]
fn parse_hit(hit: Value) -> Result<DataObject> {
    let Value::Object(mut properties) = hit else {
        return Err(Error::Backend("GraphQL hit is not an object".to_string()));
    };
    let additional = properties.remove("_additional").unwrap_or(Value::Null);
    let id = additional
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Backend("GraphQL hit is missing _additional.id".to_string()))?
        .to_string();

    let score = number(additional.get("score"))
        .or_else(|| number(additional.get("certainty")))
        .or_else(|| number(additional.get("distance")).map(|d| 1.0 - d));

    Ok(DataObject {
        id,
        properties,
        score,
    })
}

#[async_trait]
impl Backend for WeaviateBackend {
    async fn is_ready(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/v1/.well-known/ready"))
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSchema>> {
        let response = self.client.get(self.url("/v1/schema")).send().await?;
        let response = check_status(response, "", None).await?;
        let schema: SchemaResponse = response.json().await?;
        Ok(schema.classes.into_iter().map(CollectionSchema::from).collect())
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionSchema>> {
        let response = self
            .client
            .get(self.url(&format!("/v1/schema/{}", name)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response, name, None).await?;
        let class: WeaviateClass = response.json().await?;
        Ok(Some(class.into()))
    }

    async fn list_tenants(&self, collection: &CollectionSchema) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url(&format!("/v1/schema/{}/tenants", collection.name)))
            .send()
            .await?;
        let response = check_status(response, &collection.name, None).await?;
        let tenants: Vec<TenantEntry> = response.json().await?;
        Ok(tenants.into_iter().map(|t| t.name).collect())
    }

    async fn fetch_objects(
        &self,
        scope: QueryScope<'_>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DataObject>> {
        let mut query: Vec<(&str, String)> = vec![
            ("class", scope.collection.name.clone()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(tenant) = scope.tenant {
            query.push(("tenant", tenant.to_string()));
        }

        let response = self
            .client
            .get(self.url("/v1/objects"))
            .query(&query)
            .send()
            .await?;
        let response = check_status(response, &scope.collection.name, scope.tenant).await?;
        let body: ObjectsResponse = response.json().await?;

        Ok(body
            .objects
            .into_iter()
            .map(|o| DataObject {
                id: o.id,
                properties: o.properties,
                score: None,
            })
            .collect())
    }

    async fn near_text(
        &self,
        scope: QueryScope<'_>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<DataObject>> {
        let search = format!("nearText: {{concepts: [{}]}}", quote(query));
        let gql = build_get_query(scope, &search, limit, "id distance certainty");
        let hits = self.graphql_get(scope, &gql).await?;
        hits.into_iter().map(parse_hit).collect()
    }

    async fn bm25(
        &self,
        scope: QueryScope<'_>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<DataObject>> {
        let search = format!("bm25: {{query: {}}}", quote(query));
        let gql = build_get_query(scope, &search, limit, "id score");
        let hits = self.graphql_get(scope, &gql).await?;
        hits.into_iter().map(parse_hit).collect()
    }
}
