// Process-wide, lazily initialized Redis handle

use crate::db::redis::{ClientOptions, RedisHandle};
use crate::errors::StoreError;
use crate::resolver;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OnceCell;
use tracing::{error, info, instrument};

/// A value built at most once; failed builds are not remembered
///
/// Concurrent callers of `get_or_try_init` wait on a single in-flight
/// initialization. When it fails the cell stays empty and the next caller
/// starts over.
#[derive(Debug, Default)]
pub struct Memoized<T> {
    cell: OnceCell<T>,
    attempts: AtomicU64,
}

impl<T> Memoized<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            attempts: AtomicU64::new(0),
        }
    }

    pub async fn get_or_try_init<E, F, Fut>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell
            .get_or_try_init(|| {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                init()
            })
            .await
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Number of initializations started so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// The shared Redis connection
///
/// Every initialization attempt re-reads the secret store and environment,
/// so fixing the configuration takes effect on the next interaction.
#[derive(Debug)]
pub struct SharedRedis {
    handle: Memoized<RedisHandle>,
    secrets_path: PathBuf,
    options: ClientOptions,
}

impl SharedRedis {
    pub fn new(secrets_path: impl Into<PathBuf>, options: ClientOptions) -> Self {
        Self {
            handle: Memoized::new(),
            secrets_path: secrets_path.into(),
            options,
        }
    }

    /// Resolve, connect and probe on first use; reuse afterwards
    #[instrument(skip(self))]
    pub async fn get(&self) -> Result<&RedisHandle, StoreError> {
        self.handle
            .get_or_try_init(|| self.initialize())
            .await
            .inspect_err(|e| error!(error = %e, "Redis initialization failed"))
    }

    pub fn is_ready(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn attempts(&self) -> u64 {
        self.handle.attempts()
    }

    pub fn secrets_path(&self) -> &Path {
        &self.secrets_path
    }

    async fn initialize(&self) -> Result<RedisHandle, StoreError> {
        info!(
            secrets = %self.secrets_path().display(),
            attempt = self.attempts(),
            "Initializing shared Redis connection"
        );
        let config = resolver::resolve_from_path(self.secrets_path())?;
        let handle = RedisHandle::connect(&config, &self.options).await?;
        Ok(handle)
    }
}
