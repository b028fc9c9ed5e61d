//! Transport connectors
//!
//! The link client talks to any duplex byte stream. A [`Connector`] produces a
//! fresh one per connection attempt, which keeps the supervisor testable with
//! in-memory streams.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};

/// Duplex byte stream the link client can own
pub trait LinkStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> LinkStream for T {}

/// Opens transport connections to the adapter
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new stream, giving up after `timeout`
    async fn connect(&self, timeout: Duration) -> LinkResult<Box<dyn LinkStream>>;

    /// Human-readable endpoint for logs
    fn endpoint(&self) -> String;
}

/// TCP connector for Wi-Fi adapters
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, timeout: Duration) -> LinkResult<Box<dyn LinkStream>> {
        let endpoint = self.endpoint();
        debug!(%endpoint, ?timeout, "Connecting to adapter");

        let stream = tokio::time::timeout(timeout, TcpStream::connect((self.host.as_str(), self.port)))
            .await
            .map_err(|_| LinkError::Connect {
                endpoint: endpoint.clone(),
                reason: format!("timed out after {:?}", timeout),
            })?
            .map_err(|e| LinkError::Connect {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        // commands are a few bytes each; send them immediately
        stream.set_nodelay(true).map_err(|e| LinkError::Connect {
            endpoint,
            reason: e.to_string(),
        })?;

        Ok(Box::new(stream))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let connector = TcpConnector::new("127.0.0.1", port);
        assert_eq!(connector.endpoint(), format!("127.0.0.1:{}", port));

        let accept = tokio::spawn(async move { listener.accept().await.is_ok() });
        assert!(connector.connect(Duration::from_secs(1)).await.is_ok());
        assert!(accept.await.unwrap());
    }

    #[tokio::test]
    async fn test_tcp_connect_refused() {
        // bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let connector = TcpConnector::new("127.0.0.1", port);
        let err = connector.connect(Duration::from_secs(1)).await.err().unwrap();
        assert!(matches!(err, LinkError::Connect { .. }));
    }
}
