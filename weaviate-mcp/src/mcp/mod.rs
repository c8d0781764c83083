//! MCP (Model Context Protocol) server for Weaviate
//!
//! Exposes the connection, schema, object and search services as MCP tools
//! over stdio or streamable HTTP.
//!
//! ## Tools Exposed
//!
//! - `get_config` - Masked connection configuration
//! - `check_connection` - Backend readiness
//! - `list_collections` / `get_schema` - Schema introspection
//! - `get_collection_objects` - Paginated object retrieval
//! - `search` / `semantic_search` / `keyword_search` / `hybrid_search` - Search,
//!   with hybrid results merged by weighted Reciprocal Rank Fusion
//! - `is_multi_tenancy_enabled` / `get_tenant_list` - Multi-tenancy queries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use weaviate_mcp::{Config, ConnectionManager, McpServer};
//!
//! #[tokio::main]
//! async fn main() -> weaviate_mcp::Result<()> {
//!     let session = ConnectionManager::connect(Config::local("localhost", 8080, 50051)).await?;
//!     McpServer::new(session).run().await
//! }
//! ```

pub mod http;
mod protocol;
mod server;
pub mod tools;

pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolContent, ToolDefinition, ToolResult,
    MCP_PROTOCOL_VERSION,
};
pub use server::McpServer;
pub use tools::{ToolCall, ToolDispatcher};
