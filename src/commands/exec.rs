// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::commands::progress::SpinnerStatusSink;
use crate::config::LockerConfig;
use crate::error::{KvLockError, Result};
use crate::locking::{
    LockContext, LockController, LockHandle, LockTimeoutResolution, LockTimeoutResolver, Locker,
    StatusReporterObserver, global_token, parse_duration,
};
use crate::store::RedisStore;
use log::{debug, warn};
use std::env;
use std::process::{Command, ExitStatus};
use std::sync::Arc;

pub const LOCK_TIMEOUT_ENV: &str = "KVLOCK_LOCK_TIMEOUT";

/// Arguments of `kvlock exec`.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub key: String,
    pub timeout: Option<String>,
    pub no_wait: bool,
    pub ttl: Option<String>,
    pub prefix: Option<String>,
    pub redis_url: Option<String>,
    pub command: Vec<String>,
}

pub struct ExecCommand<'a> {
    config: &'a LockerConfig,
}

impl<'a> ExecCommand<'a> {
    pub fn new(config: &'a LockerConfig) -> Result<Self> {
        Ok(Self { config })
    }

    /// Runs the command under the lock and returns the command's exit code.
    pub fn execute(&self, options: ExecOptions) -> Result<i32> {
        let config = effective_config(self.config, &options)?;
        let resolution = resolve_timeout(&config, options.timeout.as_deref())?;
        debug!(
            "Lock timeout for '{}' resolved to {} from {}",
            options.key, resolution.value, resolution.source
        );

        let (program, args) = options
            .command
            .split_first()
            .ok_or_else(|| KvLockError::InvalidConfig("No command given to run".to_string()))?;

        let store = RedisStore::open(&config.redis.url)?.with_io_timeout(Some(config.redis.io_timeout));
        let observer = Arc::new(StatusReporterObserver::new(
            SpinnerStatusSink::for_stderr(),
            resolution.source,
        ));
        let locker = LockController::new(Arc::new(store), &config).with_observer(observer);

        let ctx = LockContext::background().with_cancellation(global_token());
        let handle = if options.no_wait {
            locker
                .try_lock(&ctx, &options.key)?
                .ok_or_else(|| KvLockError::LockBusy {
                    key: namespaced(&config, &options.key),
                })?
        } else {
            locker.lock_with_timeout_value(&ctx, &options.key, resolution.value)?
        };

        debug!("Running {program:?} under lock {}", handle.key());
        let status = Command::new(program).args(args).status();
        let released = release(&handle);

        let code = exit_code(status?);
        match released {
            Ok(()) => Ok(code),
            Err(err) if code == 0 => Err(err),
            Err(err) => {
                warn!("Failed to release lock {}: {err}", handle.key());
                Ok(code)
            }
        }
    }
}

fn effective_config(base: &LockerConfig, options: &ExecOptions) -> Result<LockerConfig> {
    let mut config = base.clone();
    if let Some(prefix) = &options.prefix {
        config.key_prefix = prefix.clone();
    }
    if let Some(ttl) = &options.ttl {
        config.ttl = parse_duration(ttl)
            .map_err(|e| KvLockError::InvalidConfig(format!("--ttl: {e}")))?;
    }
    if let Some(url) = &options.redis_url {
        config.redis.url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn resolve_timeout(config: &LockerConfig, cli: Option<&str>) -> Result<LockTimeoutResolution> {
    let env_value = env::var(LOCK_TIMEOUT_ENV).ok();
    LockTimeoutResolver::new(
        cli,
        env_value.as_deref(),
        config.default_timeout,
        LockerConfig::default().default_timeout,
    )
    .resolve()
    .map_err(|e| KvLockError::InvalidConfig(e.to_string()))
}

fn namespaced(config: &LockerConfig, key: &str) -> String {
    crate::locking::KeyNamespace::new(config.key_prefix.clone())
        .qualify(key)
        .into_string()
}

// Released with a fresh context: a signal that stopped the child must not
// prevent the release.
fn release(handle: &LockHandle) -> Result<()> {
    handle.unlock(&LockContext::background())
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
