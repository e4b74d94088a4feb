//! Persisted per-account session record

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::zepp::TokenGrant;

/// Lifetime of a whole record, independent of the tokens inside it
pub const RECORD_TTL_DAYS: i64 = 30;
/// App tokens older than this are not even probed
pub const APP_TOKEN_MAX_AGE_HOURS: i64 = 12;
/// Login tokens older than this no longer justify a refresh attempt
pub const LOGIN_TOKEN_MAX_AGE_DAYS: i64 = 15;

/// Cached session of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub account_id: String,
    pub app_token: Option<String>,
    pub login_token: Option<String>,
    pub user_id: Option<String>,
    pub device_id: String,
    pub app_token_issued_at: Option<DateTime<Utc>>,
    pub login_token_issued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Record for a freshly granted token pair, both tokens issued at `now`
    pub fn from_grant(
        account_id: &str,
        device_id: &str,
        grant: &TokenGrant,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: account_id.to_string(),
            app_token: Some(grant.app_token.clone()),
            login_token: Some(grant.login_token.clone()),
            user_id: Some(grant.user_id.clone()),
            device_id: device_id.to_string(),
            app_token_issued_at: Some(now),
            login_token_issued_at: Some(now),
            created_at: now,
            expires_at: now + TimeDelta::days(RECORD_TTL_DAYS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// App token young enough to be worth probing
    pub fn fresh_app_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let issued_at = self.app_token_issued_at?;
        let token = self.app_token.as_deref()?;
        (now - issued_at <= TimeDelta::hours(APP_TOKEN_MAX_AGE_HOURS)).then_some(token)
    }

    /// Login token still inside its refresh window
    pub fn usable_login_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let issued_at = self.login_token_issued_at?;
        let token = self.login_token.as_deref()?;
        (now - issued_at <= TimeDelta::days(LOGIN_TOKEN_MAX_AGE_DAYS)).then_some(token)
    }

    /// Time left before the record expires, `None` once it has
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.expires_at - now).to_std().ok()
    }
}
