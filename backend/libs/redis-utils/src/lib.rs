use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionAddr, ConnectionInfo, ErrorKind, IntoConnectionInfo, RedisError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Redis connection pool.
///
/// `ConnectionManager` multiplexes and reconnects on its own; callers clone
/// it out of the mutex for each command.
pub struct RedisPool {
    manager: SharedConnectionManager,
    endpoint: String,
}

impl RedisPool {
    /// Connect, failing if the first connection is not up within `connect_timeout`.
    pub async fn connect(redis_url: &str, connect_timeout: Duration) -> Result<Self> {
        let info: ConnectionInfo = redis_url
            .into_connection_info()
            .context("failed to parse REDIS_URL connection string")?;
        let endpoint = describe_addr(&info.addr);

        let client = Client::open(info).context("failed to construct Redis client")?;
        let connection_manager = timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .with_context(|| format!("timed out connecting to Redis at {endpoint}"))?
            .context("failed to initialize Redis connection manager")?;

        info!(endpoint = %endpoint, "Redis connection manager initialized");

        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
            endpoint,
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }

    /// `host:port` of the connected node, never the credentials.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn describe_addr(addr: &ConnectionAddr) -> String {
    match addr {
        ConnectionAddr::Tcp(host, port) => format!("{host}:{port}"),
        ConnectionAddr::TcpTls { host, port, .. } => format!("{host}:{port} (tls)"),
        ConnectionAddr::Unix(path) => path.display().to_string(),
    }
}

/// Run a Redis command under an explicit deadline.
///
/// Elapsed deadlines surface as an `IoError` so callers handle them like any
/// other connection failure.
pub async fn with_deadline<F, T>(deadline: Duration, future: F) -> Result<T, RedisError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(RedisError::from((
            ErrorKind::IoError,
            "redis command timed out",
            format!("no reply within {deadline:?}"),
        ))),
    }
}
