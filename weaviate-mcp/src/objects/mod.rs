//! Paginated object retrieval

use crate::backend::{DataObject, QueryScope};
use crate::connection::Session;
use crate::error::{Error, Result};
use crate::schema::{check_tenant, SchemaService};

/// Default page size for `get_collection_objects`
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Page of objects returned by [`PaginatedFetcher::get_objects`]
#[derive(Debug, Clone, serde::Serialize)]
pub struct ObjectPage {
    pub results: Vec<PageObject>,
    pub total: usize,
    pub collection_name: String,
    pub tenant_id: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Object as presented to tool callers
#[derive(Debug, Clone, serde::Serialize)]
pub struct PageObject {
    pub id: String,
    pub collection: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Offset/limit retrieval from a collection
pub struct PaginatedFetcher<'a> {
    session: &'a Session,
}

impl<'a> PaginatedFetcher<'a> {
    pub fn new(session: &'a Session) -> Self {
        PaginatedFetcher { session }
    }

    /// Fetch one page of objects.
    ///
    /// An offset past the end of the collection yields an empty page.
    pub async fn get_objects(
        &self,
        collection: &str,
        limit: usize,
        offset: usize,
        tenant_id: Option<&str>,
    ) -> Result<ObjectPage> {
        validate_limit(limit, self.session.config().max_limit)?;

        let schema = SchemaService::new(self.session).resolve(collection).await?;
        check_tenant(&schema, tenant_id)?;

        let scope = QueryScope {
            collection: &schema,
            tenant: tenant_id,
        };
        let objects: Vec<DataObject> = self
            .session
            .backend()
            .fetch_objects(scope, limit, offset)
            .await?;

        tracing::debug!(
            "Fetched {} objects from {} (limit {}, offset {})",
            objects.len(),
            collection,
            limit,
            offset
        );

        let results: Vec<PageObject> = objects
            .into_iter()
            .take(limit)
            .map(|o| PageObject {
                id: o.id,
                collection: schema.name.clone(),
                properties: o.properties,
            })
            .collect();

        Ok(ObjectPage {
            total: results.len(),
            results,
            collection_name: schema.name.clone(),
            tenant_id: tenant_id.map(String::from),
            limit,
            offset,
        })
    }
}

/// `limit` must lie in `1..=max_limit`
pub fn validate_limit(limit: usize, max_limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(Error::Validation("limit must be a positive integer".to_string()));
    }
    if limit > max_limit {
        return Err(Error::Validation(format!(
            "limit {} exceeds the maximum of {}",
            limit, max_limit
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(1, 100).is_ok());
        assert!(validate_limit(100, 100).is_ok());
        assert!(matches!(validate_limit(0, 100), Err(Error::Validation(_))));
        assert!(matches!(validate_limit(101, 100), Err(Error::Validation(_))));
    }
}
