//! Session record cache
//!
//! Wraps a [`RecordStore`] with the record lifecycle: expired or unreadable
//! records are deleted on load, writes replace the whole record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{RecordStore, StoreError, StoreResult};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::mask::mask_account;
use crate::models::SessionRecord;

#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn RecordStore>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Load the usable record of `account_id`
    ///
    /// Absent, unreadable, mismatched and expired records all come back as
    /// `None`; the last three are deleted first.
    pub async fn load(&self, account_id: &str, now: DateTime<Utc>) -> Option<SessionRecord> {
        let masked = mask_account(account_id);

        let raw = match self.store.read(account_id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(account = %masked, "No cached session");
                return None;
            }
            Err(e @ StoreError::Corrupted(_)) => {
                warn!(account = %masked, "Cached session is unreadable, discarding: {}", e);
                self.discard(account_id).await;
                return None;
            }
            Err(e) => {
                warn!(account = %masked, "Failed to read cached session: {}", e);
                return None;
            }
        };

        let record = match serde_json::from_str::<SessionRecord>(&raw) {
            Ok(record) if record.account_id == account_id => record,
            Ok(_) => {
                warn!(account = %masked, "Cached session belongs to another account, discarding");
                self.discard(account_id).await;
                return None;
            }
            Err(e) => {
                warn!(account = %masked, "Cached session is corrupted, discarding: {}", e);
                self.discard(account_id).await;
                return None;
            }
        };

        if record.is_expired(now) {
            debug!(account = %masked, "Cached session expired at {}", record.expires_at);
            self.discard(account_id).await;
            return None;
        }

        Some(record)
    }

    /// Replace the stored record of `record.account_id`
    pub async fn save(&self, record: &SessionRecord, now: DateTime<Utc>) -> Result<(), CacheError> {
        let payload = serde_json::to_string_pretty(record)?;
        self.store
            .write(&record.account_id, &payload, record.remaining_ttl(now))
            .await?;
        debug!(account = %mask_account(&record.account_id), "Cached session saved");
        Ok(())
    }

    /// Delete the stored record of `account_id`
    pub async fn clear(&self, account_id: &str) -> StoreResult<()> {
        self.store.delete(account_id).await
    }

    async fn discard(&self, account_id: &str) {
        if let Err(e) = self.clear(account_id).await {
            warn!(account = %mask_account(account_id), "Failed to delete cached session: {}", e);
        }
    }
}
