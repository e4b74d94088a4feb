//! Zepp (formerly Huami) vendor API
//!
//! Signing in is a two-step flow: the identity endpoint trades the account
//! and password for a single-use access code, which the account endpoint
//! then trades for a login token, an app token and the vendor user id.

pub mod client;
pub mod crypto;
pub mod payload;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::AccountConfig;

pub use client::{ZeppClient, ZeppEndpoints};

/// Tokens returned by a successful grant
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub login_token: String,
    pub app_token: String,
    pub user_id: String,
}

/// Calls made against the vendor on behalf of one account
#[async_trait]
pub trait ZeppApi: Send + Sync {
    /// Trade the account credentials for a single-use access code
    async fn fetch_access_code(&self, account: &AccountConfig) -> Result<String, ApiError>;

    /// Trade an access code for login and app tokens bound to `device_id`
    async fn grant_tokens(
        &self,
        account: &AccountConfig,
        access_code: &str,
        device_id: &str,
    ) -> Result<TokenGrant, ApiError>;

    /// Ask a read-only endpoint whether `app_token` is still accepted
    async fn probe_app_token(&self, app_token: &str) -> Result<bool, ApiError>;

    /// Upload the day record for `date` with `steps` as its total
    async fn submit_steps(
        &self,
        app_token: &str,
        user_id: &str,
        steps: u32,
        date: NaiveDate,
    ) -> Result<(), ApiError>;
}
