//! Integration tests for the record stores
//!
//! The file store is exercised against a temporary directory; the Redis
//! store needs a live server and is ignored by default.

use std::sync::Arc;
use std::time::Duration;

use common::{
    FileStore, MemoryStore, RecordStore, RedisStore,
    cache::RedisConfig,
};

async fn exercise(store: Arc<dyn RecordStore>) -> Result<(), Box<dyn std::error::Error>> {
    let key = "13800138000";

    assert_eq!(store.read(key).await?, None, "store should start empty");

    store
        .write(key, r#"{"account_id":"13800138000"}"#, Some(Duration::from_secs(60)))
        .await?;
    assert_eq!(
        store.read(key).await?,
        Some(r#"{"account_id":"13800138000"}"#.to_string()),
        "write/read round trip failed"
    );

    store.write(key, "{}", None).await?;
    assert_eq!(store.read(key).await?, Some("{}".to_string()), "overwrite failed");

    store.delete(key).await?;
    assert_eq!(store.read(key).await?, None, "delete failed");

    Ok(())
}

#[tokio::test]
async fn test_file_store_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    exercise(Arc::new(FileStore::new(dir.path()))).await
}

#[tokio::test]
async fn test_memory_store_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    exercise(Arc::new(MemoryStore::new())).await
}

#[tokio::test]
#[ignore = "requires a running Redis on localhost:6379"]
async fn test_redis_store_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let store = RedisStore::new(&RedisConfig::default())?;
    assert!(store.health_check().await?, "Redis health check failed");
    exercise(Arc::new(store)).await
}
