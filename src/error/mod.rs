mod context;
mod exit_codes;
mod format;
#[cfg(test)]
mod tests;

pub use context::ErrorContext;
pub use exit_codes::get_exit_code;
pub use format::{format_error_chain, format_error_with_color};

use crate::locking::{CancelCause, LockTimeoutValue};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvLockError {
    #[error("Timed out acquiring lock '{key}' after {waited_secs:.3}s")]
    LockTimeout {
        key: String,
        waited_secs: f64,
        timeout: LockTimeoutValue,
        attempts: usize,
    },

    #[error("Lock acquisition for '{key}' stopped after {waited_secs:.3}s: {cause}")]
    LockCancelled {
        key: String,
        cause: CancelCause,
        waited_secs: f64,
    },

    #[error("Not the owner of lock '{key}'")]
    NotLockOwner { key: String },

    #[error("Lock '{key}' is held by another owner")]
    LockBusy { key: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KvLockError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, KvLockError::LockTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, KvLockError::LockCancelled { .. })
    }

    pub fn is_not_owner(&self) -> bool {
        matches!(self, KvLockError::NotLockOwner { .. })
    }

    pub fn is_store(&self) -> bool {
        matches!(self, KvLockError::Store(_))
    }

    /// Cancellation cause, when the error is a cancellation.
    pub fn cancel_cause(&self) -> Option<CancelCause> {
        match self {
            KvLockError::LockCancelled { cause, .. } => Some(*cause),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for KvLockError {
    fn from(err: config::ConfigError) -> Self {
        KvLockError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KvLockError>;
