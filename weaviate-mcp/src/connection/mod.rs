//! Backend session management
//!
//! A [`Session`] is created once at startup by [`ConnectionManager`] and
//! shared by every service. Cloning a session clones the handle, never the
//! underlying connection.

use crate::backend::{Backend, WeaviateBackend};
use crate::config::{Config, Endpoint};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Shared, read-only handle to the backend and the process configuration
#[derive(Clone)]
pub struct Session {
    backend: Arc<dyn Backend>,
    config: Arc<Config>,
}

impl Session {
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection_type", &self.config.connection_type())
            .finish_non_exhaustive()
    }
}

/// Result of a non-fatal readiness check
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub connection_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Creates the process-wide [`Session`] and probes backend readiness
pub struct ConnectionManager;

impl ConnectionManager {
    /// Connect to the Weaviate instance described by `config`.
    ///
    /// Fails with [`Error::Connection`] when the instance is not ready within
    /// `timeout_init`.
    pub async fn connect(config: Config) -> Result<Session> {
        let backend = WeaviateBackend::new(&config)?;
        Self::connect_with(config, Arc::new(backend)).await
    }

    /// Connect through an already-constructed backend
    pub async fn connect_with(config: Config, backend: Arc<dyn Backend>) -> Result<Session> {
        tracing::info!(
            "Connecting to {} Weaviate at {}",
            config.connection_type(),
            config.endpoint.base_url()
        );
        probe(backend.as_ref(), config.timeout_init).await?;
        tracing::info!("Weaviate is ready");

        Ok(Session {
            backend,
            config: Arc::new(config),
        })
    }

    /// Re-run the readiness probe without failing the caller
    pub async fn check(session: &Session) -> ConnectionStatus {
        let config = session.config();
        let error = match probe(session.backend(), config.timeout_init).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("Error checking connection: {}", e);
                Some(e.to_string())
            }
        };

        let (host, cluster_url) = match &config.endpoint {
            Endpoint::Local { host, .. } => (Some(host.clone()), None),
            Endpoint::Cloud { cluster_url, .. } => (None, Some(cluster_url.clone())),
        };

        ConnectionStatus {
            connected: error.is_none(),
            connection_type: config.connection_type().as_str(),
            host,
            cluster_url,
            error,
            checked_at: Utc::now(),
        }
    }
}

/// Readiness probe bounded by `timeout`; every failure is a connection error
async fn probe(backend: &dyn Backend, timeout: Duration) -> Result<()> {
    match tokio::time::timeout(timeout, backend.is_ready()).await {
        Ok(Ok(true)) => Ok(()),
        Ok(Ok(false)) => Err(Error::Connection("Weaviate is not ready".to_string())),
        Ok(Err(e)) => Err(Error::Connection(e.to_string())),
        Err(_) => Err(Error::Connection(format!(
            "Weaviate did not become ready within {:?}",
            timeout
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::ConnectionType;

    #[tokio::test]
    async fn test_connect_ready_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let session = ConnectionManager::connect_with(Config::local("localhost", 8080, 50051), backend)
            .await
            .unwrap();
        assert_eq!(session.config().connection_type(), ConnectionType::Local);
    }

    #[tokio::test]
    async fn test_connect_not_ready_is_connection_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_ready(false);
        let err = ConnectionManager::connect_with(Config::local("localhost", 8080, 50051), backend)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let mut config = Config::local("127.0.0.1", 1, 50051);
        config.timeout_init = Duration::from_secs(5);
        let err = ConnectionManager::connect(config).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_check_reports_instead_of_failing() {
        let backend = Arc::new(MemoryBackend::new());
        let session = ConnectionManager::connect_with(
            Config::cloud("https://test.weaviate.network", "key"),
            backend.clone(),
        )
        .await
        .unwrap();

        let status = ConnectionManager::check(&session).await;
        assert!(status.connected);
        assert_eq!(status.cluster_url.as_deref(), Some("https://test.weaviate.network"));
        assert!(status.host.is_none());

        backend.set_ready(false);
        let status = ConnectionManager::check(&session).await;
        assert!(!status.connected);
        assert!(status.error.is_some());
        assert_eq!(status.connection_type, "cloud");
    }
}
