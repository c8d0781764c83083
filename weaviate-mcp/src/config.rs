//! Server configuration
//!
//! [`ConfigBuilder`] collects raw values (from flags, environment or tests)
//! and [`ConfigBuilder::build`] validates them into an immutable [`Config`].
//! Validation never touches the network.

use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::time::Duration;

/// Replacement shown for every secret in configuration snapshots
pub const REDACTED: &str = "***";

/// Default initialization (readiness probe) timeout
pub const DEFAULT_TIMEOUT_INIT: Duration = Duration::from_secs(30);
/// Default per-query timeout
pub const DEFAULT_TIMEOUT_QUERY: Duration = Duration::from_secs(60);
/// Default insert timeout (reported only, this server never writes)
pub const DEFAULT_TIMEOUT_INSERT: Duration = Duration::from_secs(120);
/// Default upper bound for `limit` arguments
pub const DEFAULT_MAX_LIMIT: usize = 100;
/// Default RRF damping constant
pub const DEFAULT_RRF_K: u32 = 60;

/// Backend deployment topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    /// Self-hosted instance reached by host/port
    Local,
    /// Managed cluster reached by URL and API key
    Cloud,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Local => "local",
            ConnectionType::Cloud => "cloud",
        }
    }
}

impl std::str::FromStr for ConnectionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(ConnectionType::Local),
            "cloud" => Ok(ConnectionType::Cloud),
            _ => Err(Error::Configuration(format!(
                "Unknown connection type: {} (expected 'local' or 'cloud')",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint descriptor for the chosen topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Local {
        host: String,
        port: u16,
        grpc_port: u16,
    },
    Cloud {
        cluster_url: String,
        api_key: String,
    },
}

impl Endpoint {
    pub fn connection_type(&self) -> ConnectionType {
        match self {
            Endpoint::Local { .. } => ConnectionType::Local,
            Endpoint::Cloud { .. } => ConnectionType::Cloud,
        }
    }

    /// Base URL for REST and GraphQL requests
    pub fn base_url(&self) -> String {
        match self {
            Endpoint::Local { host, port, .. } => format!("http://{}:{}", host, port),
            Endpoint::Cloud { cluster_url, .. } => {
                let url = cluster_url.trim_end_matches('/');
                if url.starts_with("http://") || url.starts_with("https://") {
                    url.to_string()
                } else {
                    format!("https://{}", url)
                }
            }
        }
    }
}

/// Raw, unvalidated configuration values
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    pub connection_type: Option<ConnectionType>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub grpc_port: Option<u16>,
    pub cluster_url: Option<String>,
    pub api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub voyageai_api_key: Option<String>,
    pub timeout_init: Duration,
    pub timeout_query: Duration,
    pub timeout_insert: Duration,
    pub max_limit: usize,
    pub rrf_k: u32,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder {
            connection_type: None,
            host: None,
            port: None,
            grpc_port: None,
            cluster_url: None,
            api_key: None,
            openai_api_key: None,
            voyageai_api_key: None,
            timeout_init: DEFAULT_TIMEOUT_INIT,
            timeout_query: DEFAULT_TIMEOUT_QUERY,
            timeout_insert: DEFAULT_TIMEOUT_INSERT,
            max_limit: DEFAULT_MAX_LIMIT,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

impl ConfigBuilder {
    /// Validate the raw values for the selected topology.
    ///
    /// Every missing parameter is reported at once, with the environment
    /// variable that supplies it. Parameters belonging to the other topology
    /// are discarded.
    pub fn build(self) -> Result<Config> {
        let Some(connection_type) = self.connection_type else {
            return Err(missing_params_error(
                "local or cloud",
                &["WEAVIATE_CONNECTION_TYPE: Connection type (local or cloud)"],
            ));
        };

        let endpoint = match connection_type {
            ConnectionType::Local => {
                let host = self.host.filter(|h| !h.trim().is_empty());
                let mut missing = Vec::new();
                if host.is_none() {
                    missing.push("WEAVIATE_HOST: Host for local Weaviate instance");
                }
                if self.port.is_none() {
                    missing.push("WEAVIATE_PORT: HTTP port for local connection");
                }
                if self.grpc_port.is_none() {
                    missing.push("WEAVIATE_GRPC_PORT: gRPC port for local connection");
                }
                match (host, self.port, self.grpc_port) {
                    (Some(host), Some(port), Some(grpc_port)) => Endpoint::Local {
                        host,
                        port,
                        grpc_port,
                    },
                    _ => return Err(missing_params_error("local", &missing)),
                }
            }
            ConnectionType::Cloud => {
                let cluster_url = self.cluster_url.filter(|u| !u.trim().is_empty());
                let api_key = self.api_key.filter(|k| !k.is_empty());
                let mut missing = Vec::new();
                if cluster_url.is_none() {
                    missing.push("WEAVIATE_CLUSTER_URL: Weaviate Cloud Services cluster URL");
                }
                if api_key.is_none() {
                    missing.push("WEAVIATE_API_KEY: API key for authentication");
                }
                match (cluster_url, api_key) {
                    (Some(cluster_url), Some(api_key)) => Endpoint::Cloud {
                        cluster_url,
                        api_key,
                    },
                    _ => return Err(missing_params_error("cloud", &missing)),
                }
            }
        };

        if self.timeout_init.is_zero() || self.timeout_query.is_zero() {
            return Err(Error::Configuration(
                "Timeouts must be greater than zero".to_string(),
            ));
        }
        if self.max_limit == 0 {
            return Err(Error::Configuration(
                "max-limit must be at least 1".to_string(),
            ));
        }
        if self.rrf_k == 0 {
            return Err(Error::Configuration(
                "rrf-k must be a positive integer".to_string(),
            ));
        }

        Ok(Config {
            endpoint,
            openai_api_key: self.openai_api_key.filter(|k| !k.is_empty()),
            voyageai_api_key: self.voyageai_api_key.filter(|k| !k.is_empty()),
            timeout_init: self.timeout_init,
            timeout_query: self.timeout_query,
            timeout_insert: self.timeout_insert,
            max_limit: self.max_limit,
            rrf_k: self.rrf_k,
        })
    }
}

fn missing_params_error(connection_type: &str, missing: &[&str]) -> Error {
    let params_list = missing
        .iter()
        .map(|p| format!("  - {}", p))
        .collect::<Vec<_>>()
        .join("\n");
    Error::Configuration(format!(
        "Missing required parameters for {} connection\n\nRequired parameters not found:\n{}",
        connection_type, params_list
    ))
}

/// Validated, immutable server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Endpoint,
    pub openai_api_key: Option<String>,
    pub voyageai_api_key: Option<String>,
    pub timeout_init: Duration,
    pub timeout_query: Duration,
    pub timeout_insert: Duration,
    pub max_limit: usize,
    pub rrf_k: u32,
}

impl Config {
    /// Local configuration with default timeouts
    pub fn local(host: impl Into<String>, port: u16, grpc_port: u16) -> Self {
        Config::with_endpoint(Endpoint::Local {
            host: host.into(),
            port,
            grpc_port,
        })
    }

    /// Cloud configuration with default timeouts
    pub fn cloud(cluster_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Config::with_endpoint(Endpoint::Cloud {
            cluster_url: cluster_url.into(),
            api_key: api_key.into(),
        })
    }

    fn with_endpoint(endpoint: Endpoint) -> Self {
        Config {
            endpoint,
            openai_api_key: None,
            voyageai_api_key: None,
            timeout_init: DEFAULT_TIMEOUT_INIT,
            timeout_query: DEFAULT_TIMEOUT_QUERY,
            timeout_insert: DEFAULT_TIMEOUT_INSERT,
            max_limit: DEFAULT_MAX_LIMIT,
            rrf_k: DEFAULT_RRF_K,
        }
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.endpoint.connection_type()
    }

    /// Embedding-provider credentials as backend request headers
    pub fn provider_headers(&self) -> Vec<(&'static str, &str)> {
        let mut headers = Vec::new();
        if let Some(key) = &self.voyageai_api_key {
            headers.push(("X-VoyageAI-Api-Key", key.as_str()));
        }
        if let Some(key) = &self.openai_api_key {
            headers.push(("X-OpenAI-Api-Key", key.as_str()));
        }
        headers
    }

    /// Configuration snapshot with every secret replaced by [`REDACTED`]
    pub fn masked(&self) -> Value {
        let (host, port, grpc_port, cluster_url, api_key) = match &self.endpoint {
            Endpoint::Local {
                host,
                port,
                grpc_port,
            } => (Some(host.as_str()), Some(*port), Some(*grpc_port), None, None),
            Endpoint::Cloud { cluster_url, .. } => {
                (None, None, None, Some(cluster_url.as_str()), Some(REDACTED))
            }
        };
        let redact = |key: &Option<String>| key.as_ref().map(|_| REDACTED);
        let headers: serde_json::Map<String, Value> = self
            .provider_headers()
            .into_iter()
            .map(|(name, _)| (name.to_string(), json!(REDACTED)))
            .collect();

        json!({
            "connection_type": self.connection_type().as_str(),
            "host": host,
            "port": port,
            "grpc_port": grpc_port,
            "cluster_url": cluster_url,
            "api_key": api_key,
            "timeout_init": self.timeout_init.as_secs(),
            "timeout_query": self.timeout_query.as_secs(),
            "timeout_insert": self.timeout_insert.as_secs(),
            "max_limit": self.max_limit,
            "rrf_k": self.rrf_k,
            "openai_api_key": redact(&self.openai_api_key),
            "voyageai_api_key": redact(&self.voyageai_api_key),
            "additional_headers": headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_builder() -> ConfigBuilder {
        ConfigBuilder {
            connection_type: Some(ConnectionType::Local),
            host: Some("localhost".to_string()),
            port: Some(8080),
            grpc_port: Some(50051),
            ..Default::default()
        }
    }

    #[test]
    fn test_local_config_valid() {
        let config = local_builder().build().unwrap();
        assert_eq!(config.connection_type(), ConnectionType::Local);
        assert_eq!(config.endpoint.base_url(), "http://localhost:8080");
        assert_eq!(config.timeout_query, Duration::from_secs(60));
    }

    #[test]
    fn test_local_clears_cloud_fields() {
        let mut builder = local_builder();
        builder.cluster_url = Some("https://x.weaviate.network".to_string());
        builder.api_key = Some("secret".to_string());
        let config = builder.build().unwrap();
        assert!(matches!(config.endpoint, Endpoint::Local { .. }));
        assert_eq!(config.masked()["api_key"], Value::Null);
    }

    #[test]
    fn test_missing_connection_type() {
        let err = ConfigBuilder::default().build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("WEAVIATE_CONNECTION_TYPE"));
    }

    #[test]
    fn test_local_missing_all_params_listed() {
        let builder = ConfigBuilder {
            connection_type: Some(ConnectionType::Local),
            ..Default::default()
        };
        let msg = builder.build().unwrap_err().to_string();
        assert!(msg.contains("WEAVIATE_HOST"));
        assert!(msg.contains("WEAVIATE_PORT"));
        assert!(msg.contains("WEAVIATE_GRPC_PORT"));
    }

    #[test]
    fn test_cloud_missing_api_key() {
        let builder = ConfigBuilder {
            connection_type: Some(ConnectionType::Cloud),
            cluster_url: Some("https://test.weaviate.network".to_string()),
            ..Default::default()
        };
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("WEAVIATE_API_KEY"));
        assert!(!err.to_string().contains("WEAVIATE_CLUSTER_URL"));
    }

    #[test]
    fn test_cloud_base_url_gets_scheme() {
        let config = Config::cloud("test.weaviate.network/", "key");
        assert_eq!(config.endpoint.base_url(), "https://test.weaviate.network");

        let config = Config::cloud("http://proxy:9000", "key");
        assert_eq!(config.endpoint.base_url(), "http://proxy:9000");
    }

    #[test]
    fn test_masked_hides_secrets() {
        let mut config = Config::cloud("https://test.weaviate.network", "weaviate-key");
        config.openai_api_key = Some("openai-test-key".to_string());
        config.voyageai_api_key = Some("voyageai-test-key".to_string());

        let masked = config.masked();
        let text = masked.to_string();
        assert!(!text.contains("weaviate-key"));
        assert!(!text.contains("openai-test-key"));
        assert!(!text.contains("voyageai-test-key"));
        assert_eq!(masked["api_key"], REDACTED);
        assert_eq!(masked["openai_api_key"], REDACTED);
        assert_eq!(masked["additional_headers"]["X-OpenAI-Api-Key"], REDACTED);
        assert_eq!(masked["cluster_url"], "https://test.weaviate.network");
    }

    #[test]
    fn test_provider_headers() {
        let mut config = Config::local("localhost", 8080, 50051);
        assert!(config.provider_headers().is_empty());
        config.openai_api_key = Some("sk".to_string());
        assert_eq!(config.provider_headers(), vec![("X-OpenAI-Api-Key", "sk")]);
    }

    #[test]
    fn test_connection_type_from_str() {
        assert_eq!("local".parse::<ConnectionType>().unwrap(), ConnectionType::Local);
        assert_eq!("CLOUD".parse::<ConnectionType>().unwrap(), ConnectionType::Cloud);
        assert!("docker".parse::<ConnectionType>().is_err());
    }

    #[test]
    fn test_zero_rrf_k_rejected() {
        let mut builder = local_builder();
        builder.rrf_k = 0;
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("rrf-k"));

        let mut builder = local_builder();
        builder.rrf_k = 1;
        assert_eq!(builder.build().unwrap().rrf_k, 1);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut builder = local_builder();
        builder.timeout_query = Duration::ZERO;
        assert!(matches!(builder.build(), Err(Error::Configuration(_))));
    }
}
