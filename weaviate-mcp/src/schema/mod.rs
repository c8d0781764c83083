//! Schema introspection and multi-tenancy queries

use crate::backend::{CollectionSchema, PropertySchema};
use crate::connection::Session;
use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Weaviate class-name grammar
const COLLECTION_NAME_PATTERN: &str = "^[A-Za-z][_0-9A-Za-z]*$";

/// Schema descriptor returned to tool callers
#[derive(Debug, Clone, Serialize)]
pub struct CollectionDescriptor {
    pub collection: String,
    pub properties: Vec<PropertySchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vectorizer: Option<String>,
    pub multi_tenancy_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_tenant_creation: Option<bool>,
}

impl From<CollectionSchema> for CollectionDescriptor {
    fn from(schema: CollectionSchema) -> Self {
        CollectionDescriptor {
            collection: schema.name,
            properties: schema.properties,
            vectorizer: schema.vectorizer,
            multi_tenancy_enabled: schema.multi_tenancy_enabled,
            tenant_count: None,
            auto_tenant_creation: schema.auto_tenant_creation,
        }
    }
}

/// Result of `get_schema`
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SchemaInfo {
    /// One named collection, including its tenant count
    Collection(CollectionDescriptor),
    /// Every collection, keyed by name
    All {
        collections: BTreeMap<String, CollectionDescriptor>,
    },
}

/// Validate a collection name before it reaches the backend
pub fn validate_collection_name(name: &str) -> Result<()> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(COLLECTION_NAME_PATTERN).expect("collection name pattern is valid")
    });
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Invalid collection name '{}': must start with a letter and contain only letters, digits and underscores",
            name
        )))
    }
}

/// Tenant scoping rule shared by retrieval and search: a tenant is required
/// on multi-tenant collections and forbidden elsewhere.
pub fn check_tenant(collection: &CollectionSchema, tenant: Option<&str>) -> Result<()> {
    match (collection.multi_tenancy_enabled, tenant) {
        (true, None) => Err(Error::Validation(format!(
            "Collection {} has multi-tenancy enabled; tenant_id is required",
            collection.name
        ))),
        (true, Some(t)) if t.trim().is_empty() => Err(Error::Validation(
            "tenant_id must not be empty".to_string(),
        )),
        (false, Some(_)) => Err(Error::Validation(format!(
            "Collection {} does not have multi-tenancy enabled; tenant_id is not allowed",
            collection.name
        ))),
        _ => Ok(()),
    }
}

/// Read-only schema service
pub struct SchemaService<'a> {
    session: &'a Session,
}

impl<'a> SchemaService<'a> {
    pub fn new(session: &'a Session) -> Self {
        SchemaService { session }
    }

    /// Validate `name` and resolve it to its schema
    pub async fn resolve(&self, name: &str) -> Result<CollectionSchema> {
        validate_collection_name(name)?;
        self.session
            .backend()
            .get_collection(name)
            .await?
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Collection names in backend order
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.session.backend().list_collections().await?;
        Ok(collections.into_iter().map(|c| c.name).collect())
    }

    /// Schema for one collection, or for all when `name` is `None`
    pub async fn get_schema(&self, name: Option<&str>) -> Result<SchemaInfo> {
        let Some(name) = name else {
            let collections = self
                .session
                .backend()
                .list_collections()
                .await?
                .into_iter()
                .map(|c| (c.name.clone(), CollectionDescriptor::from(c)))
                .collect();
            return Ok(SchemaInfo::All { collections });
        };

        let schema = self.resolve(name).await?;
        let tenant_count = if schema.multi_tenancy_enabled {
            Some(self.session.backend().list_tenants(&schema).await?.len())
        } else {
            None
        };

        let mut descriptor = CollectionDescriptor::from(schema);
        descriptor.tenant_count = tenant_count;
        Ok(SchemaInfo::Collection(descriptor))
    }

    pub async fn is_multi_tenancy_enabled(&self, name: &str) -> Result<bool> {
        Ok(self.resolve(name).await?.multi_tenancy_enabled)
    }

    /// Tenant names sorted ascending; empty for single-tenant collections
    pub async fn get_tenant_list(&self, name: &str) -> Result<Vec<String>> {
        let schema = self.resolve(name).await?;
        if !schema.multi_tenancy_enabled {
            return Ok(Vec::new());
        }
        let mut tenants = self.session.backend().list_tenants(&schema).await?;
        tenants.sort();
        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(multi_tenant: bool) -> CollectionSchema {
        CollectionSchema {
            name: "Articles".to_string(),
            properties: vec![],
            vectorizer: None,
            multi_tenancy_enabled: multi_tenant,
            auto_tenant_creation: None,
        }
    }

    #[test]
    fn test_validate_collection_name() {
        assert!(validate_collection_name("Articles").is_ok());
        assert!(validate_collection_name("my_collection_2").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("2fast").is_err());
        assert!(validate_collection_name("Articles{ Get").is_err());
        assert!(validate_collection_name("../schema").is_err());
    }

    #[test]
    fn test_check_tenant_rules() {
        assert!(check_tenant(&schema(false), None).is_ok());
        assert!(check_tenant(&schema(true), Some("tenantA")).is_ok());
        assert!(matches!(
            check_tenant(&schema(true), None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            check_tenant(&schema(false), Some("tenantA")),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            check_tenant(&schema(true), Some("  ")),
            Err(Error::Validation(_))
        ));
    }
}
