//! Per-account configuration

use std::fmt;

use crate::mask::mask_account;
use crate::steps::StepRange;

const PHONE_PREFIX: &str = "+86";

/// Immutable configuration of one account
#[derive(Clone, PartialEq, Eq)]
pub struct AccountConfig {
    /// Phone number or email used to sign in, also the cache key
    pub account_id: String,
    pub password: String,
    pub steps: StepRange,
}

impl AccountConfig {
    pub fn new(account_id: impl Into<String>, password: impl Into<String>, steps: StepRange) -> Self {
        Self {
            account_id: account_id.into().trim().to_string(),
            password: password.into().trim().to_string(),
            steps,
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.account_id.is_empty() && !self.password.is_empty()
    }

    pub fn is_email(&self) -> bool {
        self.account_id.contains('@')
    }

    /// Name submitted to the identity endpoint; phone numbers carry the country prefix
    pub fn login_name(&self) -> String {
        if self.is_email() || self.account_id.starts_with(PHONE_PREFIX) {
            self.account_id.clone()
        } else {
            format!("{PHONE_PREFIX}{}", self.account_id)
        }
    }

    /// Account identifier safe for logs
    pub fn masked(&self) -> String {
        mask_account(&self.account_id)
    }
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("account_id", &self.masked())
            .field("password", &"<redacted>")
            .field("steps", &self.steps)
            .finish()
    }
}
