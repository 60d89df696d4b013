use crate::error::{KvLockError, Result};
use crate::locking::{LockTimeoutValue, PollingBackoff};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "kvlock.toml";
pub const CONFIG_PATH_ENV: &str = "KVLOCK_CONFIG";
pub const ENV_PREFIX: &str = "KVLOCK";

const DEFAULT_TTL: Duration = Duration::from_secs(5);
const DEFAULT_LOCK_TIMEOUT: LockTimeoutValue = LockTimeoutValue::from_secs(30);
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    /// Namespace joined to every key as `prefix:key`; empty keeps keys bare.
    pub key_prefix: String,

    /// Lifetime of a lock record. Must exceed the longest expected hold time.
    #[serde(with = "duration_format")]
    pub ttl: Duration,

    /// Wait budget used by `lock` when no explicit timeout is given.
    pub default_timeout: LockTimeoutValue,

    pub retry: RetryConfig,

    pub redis: RedisConfig,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            ttl: DEFAULT_TTL,
            default_timeout: DEFAULT_LOCK_TIMEOUT,
            retry: RetryConfig::default(),
            redis: RedisConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(with = "duration_format")]
    pub initial: Duration,

    #[serde(with = "duration_format")]
    pub max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial: PollingBackoff::DEFAULT_INITIAL,
            max: PollingBackoff::DEFAULT_CAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,

    /// Read/write timeout for store commands; `0` disables it.
    #[serde(with = "duration_format")]
    pub io_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

impl LockerConfig {
    /// Loads built-in defaults, then the TOML file, then `KVLOCK_*` variables.
    ///
    /// The file is `explicit` when given, else the path in `KVLOCK_CONFIG`,
    /// else `./kvlock.toml` if present. Nested keys use `__` in variable
    /// names, e.g. `KVLOCK_REDIS__URL`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let defaults = toml::to_string(&Self::default()).map_err(|e| {
            KvLockError::ConfigError(format!("Failed to serialize default config: {e}"))
        })?;

        let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));

        if let Some((path, required)) = resolve_config_path(explicit) {
            log::debug!("Reading config from {path:?}");
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: LockerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(KvLockError::InvalidConfig(
                "ttl must be greater than zero".to_string(),
            ));
        }
        if self.retry.initial.is_zero() {
            return Err(KvLockError::InvalidConfig(
                "retry.initial must be greater than zero".to_string(),
            ));
        }
        if self.retry.max < self.retry.initial {
            return Err(KvLockError::InvalidConfig(format!(
                "retry.max ({}) must not be shorter than retry.initial ({})",
                crate::locking::format_duration(self.retry.max),
                crate::locking::format_duration(self.retry.initial)
            )));
        }
        if self.redis.url.trim().is_empty() {
            return Err(KvLockError::InvalidConfig(
                "redis.url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_default_timeout(mut self, timeout: impl Into<LockTimeoutValue>) -> Self {
        self.default_timeout = timeout.into();
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis.url = url.into();
        self
    }

    pub fn retry_backoff(&self) -> PollingBackoff {
        PollingBackoff::new(self.retry.initial, 2, self.retry.max)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| KvLockError::ConfigError(format!("Failed to serialize config: {e}")))
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), true));
    }
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|value| !value.is_empty()) {
        return Some((PathBuf::from(path), true));
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some((local, false));
    }
    log::debug!("No {CONFIG_FILE_NAME} found, using defaults and environment");
    None
}

/// Durations written as `"250ms"`, `"5s"` or bare integer seconds.
mod duration_format {
    use crate::locking::{format_duration, parse_duration};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Duration, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration such as \"250ms\", \"5s\" or integer seconds")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Duration, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Duration, E> {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom(format!("duration must not be negative: {value}")))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Duration, E> {
            parse_duration(value).map_err(E::custom)
        }
    }
}
