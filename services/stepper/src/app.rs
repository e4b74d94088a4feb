//! Wiring of the configured collaborators

use std::sync::Arc;

use anyhow::{Context, Result};
use common::{FileStore, RecordStore, RedisStore, cache::RedisConfig};
use tracing::{info, warn};

use crate::cache::SessionCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheBackend, CacheConfig, StepperConfig};
use crate::notify;
use crate::runner::BatchRunner;
use crate::session::SessionManager;
use crate::zepp::{ZeppApi, ZeppClient, ZeppEndpoints};

/// Open the record store selected by `config`
///
/// An unreachable Redis is only reported: record reads then fail and every
/// account falls back to a full login.
pub async fn build_store(config: &CacheConfig) -> Result<Arc<dyn RecordStore>> {
    match config.backend {
        CacheBackend::File => {
            let store = FileStore::new(config.dir.clone());
            info!("Caching sessions under {}", store.dir().display());
            Ok(Arc::new(store))
        }
        CacheBackend::Redis => {
            let store = RedisStore::new(&RedisConfig::new(config.redis_url.clone()))
                .context("failed to open Redis session store")?;
            match store.health_check().await {
                Ok(true) => info!("Caching sessions in Redis"),
                Ok(false) => warn!("Redis answered PING unexpectedly"),
                Err(e) => warn!("Redis is not reachable: {}", e),
            }
            Ok(Arc::new(store))
        }
    }
}

/// Build the batch runner described by `config`
pub async fn build_runner(config: &StepperConfig) -> Result<BatchRunner> {
    let store = build_store(&config.cache).await?;
    let api: Arc<dyn ZeppApi> = Arc::new(
        ZeppClient::new(config.http.timeout(), ZeppEndpoints::default())
            .context("failed to build HTTP client")?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier = notify::from_config(&config.notify, config.http.timeout())?;

    let sessions = SessionManager::new(api.clone(), SessionCache::new(store), clock.clone());
    Ok(BatchRunner::new(
        sessions,
        api,
        notifier,
        clock,
        config.delay.clone(),
    ))
}
