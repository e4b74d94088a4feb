//! Step runner configuration
//!
//! Settings come from an optional TOML file overlaid with `STEPPER__*`
//! environment variables (`STEPPER__CACHE__DIR`, `STEPPER__DELAY__MIN_MS`,
//! ...). Accounts are a structured list:
//!
//! ```toml
//! [[accounts]]
//! account_id = "13800138000"
//! password = "secret"
//! steps = "15000-20000"
//! ```
//!
//! When the list is empty, the delimited variables understood by earlier
//! deployments are decoded into the same list:
//! - `XIAOMI_ACCOUNTS`: `account&password&steps#account&password&steps`
//! - `XIAOMI_USERS`, `XIAOMI_PASSWORDS`, `XIAOMI_STEPS`: `#`-separated columns

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::mask::mask_account;
use crate::models::AccountConfig;
use crate::steps::{DEFAULT_STEP_RANGE, StepSetting};

pub const DEFAULT_SCHEDULE: &str = "0 0 9,15 * * *";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("no accounts configured")]
    NoAccounts,
}

/// One account as written in configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccountEntry {
    pub account_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub steps: Option<StepSetting>,
}

impl AccountEntry {
    /// Resolve the entry, replacing an unreadable step range with the default
    pub fn to_account(&self) -> AccountConfig {
        let steps = match &self.steps {
            None => DEFAULT_STEP_RANGE,
            Some(setting) => setting.to_range().unwrap_or_else(|e| {
                warn!(
                    account = %mask_account(&self.account_id),
                    "Invalid step range ({}), using {}", e, DEFAULT_STEP_RANGE
                );
                DEFAULT_STEP_RANGE
            }),
        };
        AccountConfig::new(self.account_id.as_str(), self.password.as_str(), steps)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    File,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Directory of the file backend
    pub dir: PathBuf,
    pub redis_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File,
            dir: PathBuf::from("cache"),
            redis_url: "redis://localhost:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Pause between two accounts of a batch
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            min_ms: 3000,
            max_ms: 8000,
        }
    }
}

impl DelayConfig {
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    /// Draw a delay uniformly from `[min_ms, max_ms)`
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..self.max_ms))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    pub accounts: Vec<AccountEntry>,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub delay: DelayConfig,
    pub notify: NotifyConfig,
    /// Six-field cron expression used by `schedule`
    pub schedule: String,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            delay: DelayConfig::default(),
            notify: NotifyConfig::default(),
            schedule: DEFAULT_SCHEDULE.to_string(),
        }
    }
}

impl StepperConfig {
    /// Load `path` (when it exists) and the `STEPPER__*` environment
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("STEPPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Accounts to process, falling back to the delimited variables
    pub fn resolve_accounts(&self) -> Result<Vec<AccountConfig>, SettingsError> {
        let entries = if self.accounts.is_empty() {
            accounts_from_legacy_env()
        } else {
            self.accounts.clone()
        };

        if entries.is_empty() {
            return Err(SettingsError::NoAccounts);
        }
        Ok(entries.iter().map(AccountEntry::to_account).collect())
    }
}

fn step_setting(raw: Option<&str>) -> Option<StepSetting> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| StepSetting::Text(s.to_string()))
}

/// Decode `account&password&steps#...`; entries without a password field are skipped
pub fn parse_account_list(raw: &str) -> Vec<AccountEntry> {
    raw.split('#')
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.trim().split('&').collect();
            if parts.len() < 2 {
                return None;
            }
            Some(AccountEntry {
                account_id: parts[0].trim().to_string(),
                password: parts[1].trim().to_string(),
                steps: step_setting(parts.get(2).copied()),
            })
        })
        .collect()
}

/// Decode the column form; rows missing an account or password are skipped
pub fn parse_account_columns(users: &str, passwords: &str, steps: &str) -> Vec<AccountEntry> {
    let passwords: Vec<&str> = passwords.split('#').collect();
    let steps: Vec<&str> = steps.split('#').collect();

    users
        .split('#')
        .enumerate()
        .filter_map(|(i, user)| {
            let user = user.trim();
            let password = passwords.get(i).map(|p| p.trim()).unwrap_or_default();
            if user.is_empty() || password.is_empty() {
                return None;
            }
            Some(AccountEntry {
                account_id: user.to_string(),
                password: password.to_string(),
                steps: step_setting(steps.get(i).copied()),
            })
        })
        .collect()
}

/// Read accounts from `XIAOMI_ACCOUNTS`, or else from the `XIAOMI_USERS` columns
pub fn accounts_from_legacy_env() -> Vec<AccountEntry> {
    if let Ok(list) = env::var("XIAOMI_ACCOUNTS") {
        if !list.trim().is_empty() {
            return parse_account_list(&list);
        }
    }

    match env::var("XIAOMI_USERS") {
        Ok(users) if !users.trim().is_empty() => parse_account_columns(
            &users,
            &env::var("XIAOMI_PASSWORDS").unwrap_or_default(),
            &env::var("XIAOMI_STEPS").unwrap_or_default(),
        ),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StepRange;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serial_test::serial;
    use std::io::Write;

    const LEGACY_VARS: [&str; 4] = [
        "XIAOMI_ACCOUNTS",
        "XIAOMI_USERS",
        "XIAOMI_PASSWORDS",
        "XIAOMI_STEPS",
    ];

    fn clear_legacy_env() {
        unsafe {
            for var in LEGACY_VARS {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_parse_account_list() {
        let entries =
            parse_account_list("13800138000&123456&15000-20000#user@example.com&654321&18000#bad");
        assert_eq!(entries.len(), 2);

        let first = entries[0].to_account();
        assert_eq!(first.account_id, "13800138000");
        assert_eq!(first.password, "123456");
        assert_eq!(first.steps, StepRange::new(15000, 20000).unwrap());

        let second = entries[1].to_account();
        assert_eq!(second.account_id, "user@example.com");
        assert_eq!(second.steps, StepRange::new(16000, 20000).unwrap());
    }

    #[test]
    fn test_parse_account_list_defaults_steps() {
        let entries = parse_account_list("13800138000&123456#13900139000&pw&nonsense");
        assert_eq!(entries[0].to_account().steps, DEFAULT_STEP_RANGE);
        assert_eq!(entries[1].to_account().steps, DEFAULT_STEP_RANGE);
    }

    #[test]
    fn test_parse_account_columns() {
        let entries = parse_account_columns(
            "13800138000#user@example.com#13900139000",
            "123456#654321",
            "18000",
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].steps, Some(StepSetting::Text("18000".into())));
        assert_eq!(entries[1].steps, None);
        assert_eq!(entries[1].password, "654321");
    }

    #[test]
    fn test_delay_pick() {
        let mut rng = StdRng::seed_from_u64(1);
        let delay = DelayConfig::default();
        for _ in 0..100 {
            let picked = delay.pick(&mut rng);
            assert!(picked >= Duration::from_millis(3000) && picked < Duration::from_millis(8000));
        }
        assert_eq!(DelayConfig::none().pick(&mut rng), Duration::ZERO);
    }

    #[test]
    #[serial]
    fn test_load_defaults_without_file() {
        let config = StepperConfig::load(Path::new("does-not-exist.toml")).unwrap();
        assert!(config.accounts.is_empty());
        assert_eq!(config.cache.backend, CacheBackend::File);
        assert_eq!(config.cache.dir, PathBuf::from("cache"));
        assert_eq!(config.http.timeout(), Duration::from_secs(10));
        assert_eq!(config.schedule, DEFAULT_SCHEDULE);
    }

    #[test]
    #[serial]
    fn test_load_from_file_and_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
schedule = "0 30 8 * * *"

[cache]
backend = "redis"

[[accounts]]
account_id = "13800138000"
password = "secret"
steps = "15000-20000"

[[accounts]]
account_id = "user@example.com"
password = "hunter2"
steps = 18000
"#
        )
        .unwrap();

        unsafe {
            env::set_var("STEPPER__DELAY__MIN_MS", "0");
        }
        let config = StepperConfig::load(file.path()).unwrap();
        unsafe {
            env::remove_var("STEPPER__DELAY__MIN_MS");
        }

        assert_eq!(config.schedule, "0 30 8 * * *");
        assert_eq!(config.cache.backend, CacheBackend::Redis);
        assert_eq!(config.delay.min_ms, 0);
        assert_eq!(config.delay.max_ms, 8000);

        let accounts = config.resolve_accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].steps, StepRange::new(15000, 20000).unwrap());
        assert_eq!(accounts[1].steps, StepRange::new(16000, 20000).unwrap());
    }

    #[test]
    #[serial]
    fn test_resolve_accounts_from_legacy_env() {
        clear_legacy_env();
        unsafe {
            env::set_var("XIAOMI_ACCOUNTS", "13800138000&123456&15000-20000");
        }

        let accounts = StepperConfig::default().resolve_accounts().unwrap();
        clear_legacy_env();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_id, "13800138000");
    }

    #[test]
    #[serial]
    fn test_resolve_accounts_from_columns() {
        clear_legacy_env();
        unsafe {
            env::set_var("XIAOMI_USERS", "13800138000#user@example.com");
            env::set_var("XIAOMI_PASSWORDS", "123456#654321");
        }

        let accounts = StepperConfig::default().resolve_accounts().unwrap();
        clear_legacy_env();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].steps, DEFAULT_STEP_RANGE);
    }

    #[test]
    #[serial]
    fn test_no_accounts_is_an_error() {
        clear_legacy_env();
        assert!(matches!(
            StepperConfig::default().resolve_accounts(),
            Err(SettingsError::NoAccounts)
        ));
    }
}
