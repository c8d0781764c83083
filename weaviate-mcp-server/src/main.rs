//! Weaviate MCP Server
//!
//! A Model Context Protocol (MCP) server that exposes a Weaviate instance's
//! schema, objects and search to AI agents over stdio or streamable HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Local instance over stdio
//! weaviate-mcp --connection-type local --host localhost --port 8080 --grpc-port 50051
//!
//! # Weaviate Cloud over HTTP
//! WEAVIATE_CLUSTER_URL=my-cluster.weaviate.network WEAVIATE_API_KEY=... \
//!     weaviate-mcp --connection-type cloud --transport streamable-http --http-port 8000
//!
//! # Enable verbose logging
//! weaviate-mcp --verbose ...
//! ```
//!
//! ## MCP Configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "weaviate": {
//!       "command": "weaviate-mcp",
//!       "env": {
//!         "WEAVIATE_CONNECTION_TYPE": "local",
//!         "WEAVIATE_HOST": "localhost",
//!         "WEAVIATE_PORT": "8080",
//!         "WEAVIATE_GRPC_PORT": "50051"
//!       }
//!     }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use weaviate_mcp::config::{
    DEFAULT_MAX_LIMIT, DEFAULT_RRF_K, DEFAULT_TIMEOUT_INIT, DEFAULT_TIMEOUT_INSERT,
    DEFAULT_TIMEOUT_QUERY,
};
use weaviate_mcp::mcp::http::serve_http;
use weaviate_mcp::{Config, ConfigBuilder, ConnectionManager, ConnectionType, McpServer};

/// Transport the MCP server listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// JSON-RPC over HTTP POST at /mcp
    StreamableHttp,
}

/// Weaviate MCP Server - Expose Weaviate to AI agents via Model Context Protocol
#[derive(Parser, Debug)]
#[command(name = "weaviate-mcp")]
#[command(
    author,
    version,
    about = "Weaviate MCP Server - Model Context Protocol interface for Weaviate search"
)]
struct Args {
    /// MCP transport
    #[arg(long, value_enum, env = "MCP_TRANSPORT", default_value = "stdio")]
    transport: Transport,

    /// Bind address for the HTTP transport
    #[arg(long, env = "MCP_HTTP_HOST", default_value = "0.0.0.0")]
    http_host: String,

    /// Port for the HTTP transport
    #[arg(long, env = "MCP_HTTP_PORT", default_value_t = 8000)]
    http_port: u16,

    /// Weaviate deployment type (local or cloud)
    #[arg(long, env = "WEAVIATE_CONNECTION_TYPE")]
    connection_type: Option<ConnectionType>,

    /// Host of a local Weaviate instance
    #[arg(long, env = "WEAVIATE_HOST")]
    host: Option<String>,

    /// HTTP port of a local Weaviate instance
    #[arg(long, env = "WEAVIATE_PORT")]
    port: Option<u16>,

    /// gRPC port of a local Weaviate instance
    #[arg(long, env = "WEAVIATE_GRPC_PORT")]
    grpc_port: Option<u16>,

    /// Weaviate Cloud cluster URL
    #[arg(long, env = "WEAVIATE_CLUSTER_URL")]
    cluster_url: Option<String>,

    /// Weaviate Cloud API key
    #[arg(long, env = "WEAVIATE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OpenAI API key forwarded to the vectorizer
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// VoyageAI API key forwarded to the vectorizer
    #[arg(long, env = "VOYAGEAI_API_KEY", hide_env_values = true)]
    voyageai_api_key: Option<String>,

    /// Connection/readiness timeout in seconds
    #[arg(long, env = "WEAVIATE_TIMEOUT_INIT", default_value_t = DEFAULT_TIMEOUT_INIT.as_secs())]
    timeout_init: u64,

    /// Query timeout in seconds
    #[arg(long, env = "WEAVIATE_TIMEOUT_QUERY", default_value_t = DEFAULT_TIMEOUT_QUERY.as_secs())]
    timeout_query: u64,

    /// Insert timeout in seconds
    #[arg(long, env = "WEAVIATE_TIMEOUT_INSERT", default_value_t = DEFAULT_TIMEOUT_INSERT.as_secs())]
    timeout_insert: u64,

    /// Largest accepted `limit` argument
    #[arg(long, env = "WEAVIATE_MAX_LIMIT", default_value_t = DEFAULT_MAX_LIMIT)]
    max_limit: usize,

    /// Reciprocal Rank Fusion damping constant
    #[arg(long, env = "WEAVIATE_RRF_K", default_value_t = DEFAULT_RRF_K)]
    rrf_k: u32,

    /// Enable verbose logging (outputs to stderr)
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Args {
    fn config(&self) -> weaviate_mcp::Result<Config> {
        ConfigBuilder {
            connection_type: self.connection_type,
            host: self.host.clone(),
            port: self.port,
            grpc_port: self.grpc_port,
            cluster_url: self.cluster_url.clone(),
            api_key: self.api_key.clone(),
            openai_api_key: self.openai_api_key.clone(),
            voyageai_api_key: self.voyageai_api_key.clone(),
            timeout_init: Duration::from_secs(self.timeout_init),
            timeout_query: Duration::from_secs(self.timeout_query),
            timeout_insert: Duration::from_secs(self.timeout_insert),
            max_limit: self.max_limit,
            rrf_k: self.rrf_k,
        }
        .build()
    }

    fn http_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .http_host
            .parse()
            .with_context(|| format!("Invalid HTTP bind address: {}", self.http_host))?;
        Ok(SocketAddr::new(ip, self.http_port))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging goes to stderr; stdout carries the stdio protocol
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = args.config()?;
    tracing::debug!("Configuration: {}", config.masked());

    let session = ConnectionManager::connect(config)
        .await
        .context("Failed to connect to Weaviate")?;
    let server = McpServer::new(session);

    match args.transport {
        Transport::Stdio => server.run().await?,
        Transport::StreamableHttp => serve_http(server, args.http_addr()?, shutdown_signal()).await?,
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        return;
    }
    tracing::info!("Ctrl-C received, shutting down");
}
