// Redis connection handle: TLS client, timeouts, retries and liveness probe

use crate::errors::{ConnectionError, StoreError};
use crate::resolver::ConnectionConfig;
use crate::retry::{retry_async, ExponentialBackoff, RetryStrategy};
use crate::telemetry;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo, RedisError, RedisResult};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Transport tuning applied when the client is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub tls: bool,
    /// Socket read/write timeout per command
    pub response_timeout: Duration,
    pub connect_timeout: Duration,
    /// Idle time after which a PING precedes the next command. Zero disables it.
    pub health_check_interval: Duration,
    pub retry_on_timeout: bool,
    pub retry: ExponentialBackoff,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            tls: true,
            response_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(30),
            retry_on_timeout: true,
            retry: ExponentialBackoff::default(),
        }
    }
}

impl ClientOptions {
    /// Plaintext variant for local servers
    pub fn without_tls() -> Self {
        Self {
            tls: false,
            ..Self::default()
        }
    }

    /// Whether an error is transient under these options
    fn is_retryable(&self, err: &RedisError) -> bool {
        if err.is_timeout() {
            return self.retry_on_timeout;
        }
        err.is_connection_dropped() || err.is_connection_refusal()
    }
}

/// Shared handle to a probed Redis connection
///
/// Cloning is cheap: every clone multiplexes over the same connection, which
/// the underlying manager re-establishes when it drops.
#[derive(Clone)]
pub struct RedisHandle {
    manager: ConnectionManager,
    options: Arc<ClientOptions>,
    endpoint: Arc<str>,
    epoch: Instant,
    last_used_ms: Arc<AtomicU64>,
}

impl fmt::Debug for RedisHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisHandle")
            .field("endpoint", &self.endpoint)
            .field("tls", &self.options.tls)
            .finish_non_exhaustive()
    }
}

impl RedisHandle {
    /// Build the client, open the connection and probe it once.
    ///
    /// Nothing is returned unless the probe succeeds.
    #[instrument(skip_all, fields(host = %config.host, port = config.port, tls = options.tls))]
    pub async fn connect(
        config: &ConnectionConfig,
        options: &ClientOptions,
    ) -> Result<Self, ConnectionError> {
        let result = Self::open(config, options).await;
        telemetry::record_connection_attempt(result.is_ok());
        result
    }

    async fn open(
        config: &ConnectionConfig,
        options: &ClientOptions,
    ) -> Result<Self, ConnectionError> {
        info!(source = %config.source, "Connecting to Redis");

        let client = build_client(config, options)?;

        // The manager reconnects with the same backoff shape as command retries:
        // delays of factor * 2^n ms, so factor = base / 2.
        let factor = (options.retry.base().as_millis() as u64 / 2).max(1);
        let manager = ConnectionManager::new_with_backoff_and_timeouts(
            client,
            2,
            factor,
            options.retry.max_retries() as usize,
            options.response_timeout,
            options.connect_timeout,
        )
        .await
        .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;

        let handle = Self {
            manager,
            options: Arc::new(options.clone()),
            endpoint: Arc::from(format!("{}:{}", config.host, config.port)),
            epoch: Instant::now(),
            last_used_ms: Arc::new(AtomicU64::new(0)),
        };

        // Fail fast if credentials, network or TLS are wrong
        handle.ping().await?;

        info!("Connected to Redis");
        Ok(handle)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Liveness probe
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn ping(&self) -> Result<(), ConnectionError> {
        let reply: String = self
            .run("PING", |mut conn| async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await
            .map_err(|e| ConnectionError::ProbeFailed(e.to_string()))?;

        if reply != "PONG" {
            return Err(ConnectionError::UnexpectedProbeResponse(reply));
        }
        Ok(())
    }

    /// Write `value` under `key`
    #[instrument(skip(self, value), fields(endpoint = %self.endpoint))]
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.health_check().await?;
        self.run("SET", |mut conn| async move { conn.set(key, value).await })
            .await
            .map_err(|e| command_error("SET", e))
    }

    /// Read the value under `key`; `None` when the key does not exist
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.health_check().await?;
        self.run("GET", |mut conn| async move { conn.get(key).await })
            .await
            .map_err(|e| command_error("GET", e))
    }

    /// PING first when the connection sat idle past the health-check interval
    async fn health_check(&self) -> Result<(), ConnectionError> {
        let interval = self.options.health_check_interval;
        if interval.is_zero() || self.idle_for() < interval {
            return Ok(());
        }
        debug!(idle_ms = self.idle_for().as_millis() as u64, "Running health check");
        self.ping().await
    }

    fn idle_for(&self) -> Duration {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        let last_ms = self.last_used_ms.load(Ordering::Relaxed);
        Duration::from_millis(now_ms.saturating_sub(last_ms))
    }

    fn touch(&self) {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        self.last_used_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    /// Run one command under the retry policy and record its metrics
    async fn run<T, F, Fut>(&self, command: &'static str, op: F) -> RedisResult<T>
    where
        F: Fn(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let started = Instant::now();
        let options = &self.options;
        let result = retry_async(
            &options.retry,
            || op(self.manager.clone()),
            |e| options.is_retryable(e),
        )
        .await;

        let elapsed = started.elapsed();
        telemetry::record_command(command, result.is_ok(), elapsed.as_secs_f64());
        self.touch();

        if let Err(e) = &result {
            warn!(command, error = %e, elapsed_ms = elapsed.as_millis() as u64, "Redis command failed");
        }
        result
    }
}

/// Translate resolved parameters into a client. No I/O happens here.
fn build_client(config: &ConnectionConfig, options: &ClientOptions) -> Result<Client, ConnectionError> {
    let scheme = if options.tls { "rediss" } else { "redis" };
    let mut info = format!("{}://{}:{}", scheme, config.host, config.port)
        .into_connection_info()
        .map_err(|e| ConnectionError::ClientSetup(e.to_string()))?;

    info.redis.username = config.username.clone();
    info.redis.password = config.password.clone();

    Client::open(info).map_err(|e| ConnectionError::ClientSetup(e.to_string()))
}

fn command_error(command: &'static str, err: RedisError) -> StoreError {
    StoreError::Command {
        command,
        reason: err.to_string(),
    }
}
