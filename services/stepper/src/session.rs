//! Session acquisition for one account
//!
//! Sessions are acquired through three tiers, first success wins:
//!
//! 1. a cached app token younger than 12 hours that a live probe accepts;
//! 2. while the cached login token is younger than 15 days, a fresh sign-in
//!    whose result replaces the cached tokens (same device id);
//! 3. an unconditional fresh sign-in. When this one fails too, the cached
//!    record is deleted so the next run does not start from it again.
//!
//! The tier chain is the only retry mechanism; no tier retries on its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cache::SessionCache;
use crate::clock::Clock;
use crate::error::SessionError;
use crate::models::{AccountConfig, SessionRecord};
use crate::runlog::RunLog;
use crate::zepp::ZeppApi;

/// Tier that produced a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    CachedAppToken,
    LoginTokenRefresh,
    FullLogin,
}

/// Credentials needed to submit data for an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub app_token: String,
    pub user_id: String,
    pub device_id: String,
    pub source: SessionSource,
}

/// Generate a synthetic device identifier for an account without one
pub fn new_device_id() -> String {
    format!("hm-rs-{}", Uuid::new_v4())
}

#[derive(Clone)]
pub struct SessionManager {
    api: Arc<dyn ZeppApi>,
    cache: SessionCache,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn ZeppApi>, cache: SessionCache, clock: Arc<dyn Clock>) -> Self {
        Self { api, cache, clock }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Produce a valid app token and user id for `account`
    pub async fn acquire_session(
        &self,
        account: &AccountConfig,
        log: &mut RunLog,
    ) -> Result<Session, SessionError> {
        if !account.has_credentials() {
            return Err(SessionError::MissingCredentials);
        }

        let tag = account.masked();
        let now = self.clock.now();
        let cached = self.cache.load(&account.account_id, now).await;

        if let Some(record) = &cached {
            if let Some(session) = self.reuse_app_token(record, now, &tag, log).await {
                return Ok(session);
            }
        }

        let device_id = cached
            .as_ref()
            .map(|record| record.device_id.clone())
            .unwrap_or_else(new_device_id);

        if cached
            .as_ref()
            .is_some_and(|record| record.usable_login_token(now).is_some())
        {
            log.info(Some(&tag), "Refreshing session with the cached login token");
            match self
                .sign_in(account, &device_id, SessionSource::LoginTokenRefresh, log)
                .await
            {
                Ok(session) => {
                    log.success(Some(&tag), "Session refreshed");
                    return Ok(session);
                }
                Err(e) => {
                    log.error(
                        Some(&tag),
                        format!("Session refresh failed: {e}, falling back to a full login"),
                    );
                }
            }
        }

        log.info(Some(&tag), "Performing a full login");
        match self
            .sign_in(account, &device_id, SessionSource::FullLogin, log)
            .await
        {
            Ok(session) => {
                log.success(Some(&tag), "Full login succeeded");
                Ok(session)
            }
            Err(e) => {
                log.error(Some(&tag), format!("Full login failed: {e}"));
                if let Err(clear_err) = self.cache.clear(&account.account_id).await {
                    log.warn(
                        Some(&tag),
                        format!("Failed to delete cached session: {clear_err}"),
                    );
                }
                Err(e)
            }
        }
    }

    async fn reuse_app_token(
        &self,
        record: &SessionRecord,
        now: DateTime<Utc>,
        tag: &str,
        log: &mut RunLog,
    ) -> Option<Session> {
        let app_token = record.fresh_app_token(now)?;

        log.info(Some(tag), "Checking the cached app token");
        match self.api.probe_app_token(app_token).await {
            Ok(true) => {}
            Ok(false) => {
                log.warn(Some(tag), "Cached app token is no longer valid");
                return None;
            }
            Err(e) => {
                log.warn(Some(tag), format!("Cached app token check failed: {e}"));
                return None;
            }
        }

        let Some(user_id) = record.user_id.clone() else {
            log.warn(Some(tag), "Cached session has no user id");
            return None;
        };

        log.success(Some(tag), "Cached app token is valid");
        Some(Session {
            app_token: app_token.to_string(),
            user_id,
            device_id: record.device_id.clone(),
            source: SessionSource::CachedAppToken,
        })
    }

    /// Run the two-step sign-in and persist the resulting record
    async fn sign_in(
        &self,
        account: &AccountConfig,
        device_id: &str,
        source: SessionSource,
        log: &mut RunLog,
    ) -> Result<Session, SessionError> {
        let access_code = self.api.fetch_access_code(account).await?;
        let grant = self
            .api
            .grant_tokens(account, &access_code, device_id)
            .await?;

        let now = self.clock.now();
        let record = SessionRecord::from_grant(&account.account_id, device_id, &grant, now);
        if let Err(e) = self.cache.save(&record, now).await {
            log.error(
                Some(&account.masked()),
                format!("Failed to cache session: {e}"),
            );
        }

        Ok(Session {
            app_token: grant.app_token,
            user_id: grant.user_id,
            device_id: device_id.to_string(),
            source,
        })
    }
}
