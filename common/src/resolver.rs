// Redis connection parameter resolution
//
// Exactly one source is used: the secret store when it holds REDIS_HOST,
// otherwise the REDIS_* environment variables. Values are never merged.

use crate::errors::ConfigError;
use config::{Config, File, FileFormat, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, instrument};

pub const HOST_KEY: &str = "REDIS_HOST";
pub const PORT_KEY: &str = "REDIS_PORT";
pub const USERNAME_KEY: &str = "REDIS_USERNAME";
pub const PASSWORD_KEY: &str = "REDIS_PASSWORD";

/// Port used when REDIS_PORT is absent or empty
pub const DEFAULT_PORT: u16 = 6379;

/// Where a resolved configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Secrets,
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Secrets => f.write_str("secrets"),
            ConfigSource::Environment => f.write_str("environment"),
        }
    }
}

/// Resolved Redis connection parameters
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub source: ConfigSource,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("source", &self.source)
            .finish()
    }
}

/// Snapshot of the structured secret store
///
/// Keys are stored upper-cased so lookups do not depend on how the file
/// spells them.
#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    values: HashMap<String, String>,
}

impl SecretStore {
    /// Load the secret store from a TOML file.
    ///
    /// Returns `Ok(None)` when the file does not exist (store unavailable).
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("Secret store not present");
            return Ok(None);
        }

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()
            .map_err(|e| ConfigError::SecretStore(e.to_string()))?;

        let table: HashMap<String, Value> = config
            .try_deserialize()
            .map_err(|e| ConfigError::SecretStore(e.to_string()))?;

        let mut values = HashMap::with_capacity(table.len());
        for (key, value) in table {
            // Nested tables are not part of the store's contract
            if let Ok(text) = value.into_string() {
                values.insert(key.to_ascii_uppercase(), text);
            }
        }

        debug!(keys = values.len(), "Secret store loaded");
        Ok(Some(Self { values }))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into().to_ascii_uppercase(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// Resolve connection parameters from an optional secret store and an
/// environment lookup.
///
/// Pure: the caller supplies both sources.
pub fn resolve<F>(secrets: Option<&SecretStore>, env: F) -> Result<ConnectionConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let store = secrets.filter(|s| s.contains(HOST_KEY));
    let source = match store {
        Some(_) => ConfigSource::Secrets,
        None => ConfigSource::Environment,
    };
    let lookup = |key: &str| match store {
        Some(store) => store.get(key).map(str::to_owned),
        None => env(key),
    };

    let host = non_empty(lookup(HOST_KEY)).ok_or(ConfigError::MissingHost)?;
    let port = parse_port(lookup(PORT_KEY))?;
    let username = non_empty(lookup(USERNAME_KEY));
    let password = non_empty(lookup(PASSWORD_KEY));

    Ok(ConnectionConfig {
        host,
        port,
        username,
        password,
        source,
    })
}

/// Resolve from the secret store file at `secrets_path`, falling back to the
/// process environment.
#[instrument(skip_all, fields(path = %secrets_path.display()))]
pub fn resolve_from_path(secrets_path: &Path) -> Result<ConnectionConfig, ConfigError> {
    let store = SecretStore::load(secrets_path)?;
    let config = resolve(store.as_ref(), |key| std::env::var(key).ok())?;
    debug!(
        source = %config.source,
        host = %config.host,
        port = config.port,
        "Redis connection parameters resolved"
    );
    Ok(config)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_port(raw: Option<String>) -> Result<u16, ConfigError> {
    match non_empty(raw) {
        None => Ok(DEFAULT_PORT),
        Some(value) => {
            let parsed = value.trim().parse::<u16>();
            parsed.map_err(|e| ConfigError::InvalidPort {
                reason: e.to_string(),
                value,
            })
        }
    }
}
