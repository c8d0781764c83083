//! # Weaviate MCP
//!
//! A Model Context Protocol server in front of a Weaviate instance.
//!
//! Weaviate MCP provides:
//! - **Schema introspection** of collections, properties and tenants
//! - **Paginated retrieval** of collection objects
//! - **Semantic, keyword and hybrid search**, hybrid results merged with
//!   weighted Reciprocal Rank Fusion
//! - **MCP server** over stdio or streamable HTTP
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use weaviate_mcp::{Config, ConnectionManager, SearchEngine, SearchMode, SearchRequest};
//!
//! let session = ConnectionManager::connect(Config::local("localhost", 8080, 50051)).await?;
//!
//! let response = SearchEngine::new(&session)
//!     .search(SearchRequest {
//!         collection: "Products".to_string(),
//!         query: "red bicycle".to_string(),
//!         mode: SearchMode::Hybrid { alpha: 0.3 },
//!         limit: 5,
//!         tenant_id: None,
//!     })
//!     .await?;
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod mcp;
pub mod objects;
pub mod schema;
pub mod search;

// Re-exports for convenience
pub use backend::{Backend, MemoryBackend, WeaviateBackend};
pub use config::{Config, ConfigBuilder, ConnectionType};
pub use connection::{ConnectionManager, ConnectionStatus, Session};
pub use error::{Error, ErrorKind, Result};
pub use mcp::McpServer;
pub use objects::PaginatedFetcher;
pub use schema::SchemaService;
pub use search::{SearchEngine, SearchMode, SearchRequest, SearchResponse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
