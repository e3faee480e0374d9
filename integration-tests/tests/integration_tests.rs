// Integration tests against a live Redis server
//
// Run with: cargo test -p integration-tests -- --ignored
// Connection parameters come from the REDIS_* variables (host defaults to
// localhost). Set REDIS_TLS=1 for a TLS endpoint such as Redis Cloud.

use common::db::{ClientOptions, RedisHandle, SharedRedis};
use common::errors::ConnectionError;
use common::resolver::{self, ConnectionConfig, HOST_KEY};
use std::time::{SystemTime, UNIX_EPOCH};

fn live_config() -> ConnectionConfig {
    resolver::resolve(None, |key| {
        std::env::var(key)
            .ok()
            .or_else(|| (key == HOST_KEY).then(|| "localhost".to_string()))
    })
    .expect("Failed to resolve live Redis config")
}

fn live_options() -> ClientOptions {
    match std::env::var("REDIS_TLS").as_deref() {
        Ok("1") | Ok("true") => ClientOptions::default(),
        _ => ClientOptions::without_tls(),
    }
}

/// Key unique to this run so parallel runs don't collide
fn unique_key(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("itest:{}:{}:{}", prefix, std::process::id(), nanos)
}

async fn connect() -> RedisHandle {
    RedisHandle::connect(&live_config(), &live_options())
        .await
        .expect("Failed to connect to live Redis")
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_set_then_get_round_trip() {
    let handle = connect().await;
    let key = unique_key("roundtrip");

    handle.set(&key, "hello redis cloud").await.unwrap();
    let value = handle.get(&key).await.unwrap();

    assert_eq!(value.as_deref(), Some("hello redis cloud"));
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_set_overwrites_and_keeps_unicode() {
    let handle = connect().await;
    let key = unique_key("overwrite");

    handle.set(&key, "first").await.unwrap();
    handle.set(&key, "xin chào ✅").await.unwrap();

    assert_eq!(handle.get(&key).await.unwrap().as_deref(), Some("xin chào ✅"));
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_get_missing_key_is_absent_not_error() {
    let handle = connect().await;
    let key = unique_key("never-written");

    let value = handle.get(&key).await.unwrap();
    assert_eq!(value, None);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_wrong_password_fails_probe() {
    let mut config = live_config();
    config.password = Some("definitely-not-the-password".to_string());
    config.username = Some("no-such-user".to_string());

    let result = RedisHandle::connect(&config, &live_options()).await;
    assert!(matches!(
        result,
        Err(ConnectionError::ConnectFailed(_)) | Err(ConnectionError::ProbeFailed(_))
    ));
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_shared_handle_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("redis.toml");
    let config = live_config();

    let mut secrets = format!("REDIS_HOST = \"{}\"\nREDIS_PORT = {}\n", config.host, config.port);
    if let Some(username) = &config.username {
        secrets.push_str(&format!("REDIS_USERNAME = \"{}\"\n", username));
    }
    if let Some(password) = &config.password {
        secrets.push_str(&format!("REDIS_PASSWORD = \"{}\"\n", password));
    }
    std::fs::write(&path, secrets).unwrap();

    let shared = SharedRedis::new(&path, live_options());
    let first = shared.get().await.map(|h| h.endpoint().to_string());
    let second = shared.get().await.map(|h| h.endpoint().to_string());

    assert!(first.is_ok(), "{:?}", first);
    assert_eq!(first, second);
    assert_eq!(shared.attempts(), 1);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_clones_share_one_connection() -> anyhow::Result<()> {
    let handle = connect().await;
    let clone = handle.clone();
    let key = unique_key("clone");

    clone.set(&key, "written through the clone").await?;
    let value = handle.get(&key).await?;

    assert_eq!(value.as_deref(), Some("written through the clone"));
    Ok(())
}
