// ── Transport seam ──
//
// The client only needs a duplex byte stream. Production dials TCP; tests
// hand out in-memory duplex pipes.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::Error;

/// Any duplex byte stream usable as a manager transport.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens a fresh transport for each connection attempt.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'_, Result<BoxedStream, Error>>;

    /// Human-readable target, used in logs.
    fn describe(&self) -> String;
}

// ── TcpConnector ─────────────────────────────────────────────────────

/// Plain TCP to the manager port (5038 by default).
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(10),
        }
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> BoxFuture<'_, Result<BoxedStream, Error>> {
        Box::pin(async move {
            let addr = self.addr();
            let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| Error::Connect {
                    addr: addr.clone(),
                    reason: format!("timed out after {}s", self.connect_timeout.as_secs()),
                })?
                .map_err(|e| Error::Connect {
                    addr: addr.clone(),
                    reason: e.to_string(),
                })?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }

    fn describe(&self) -> String {
        self.addr()
    }
}
