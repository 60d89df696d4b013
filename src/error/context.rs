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

use crate::error::KvLockError;
use crate::locking::CancelCause;
use crate::store::StoreError;
use std::error::Error as _;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a KvLockError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a KvLockError) -> Self {
        let (suggestion, details) = match error {
            KvLockError::LockTimeout {
                timeout, attempts, ..
            } => {
                let suggestion = Some(
                    "Another owner still holds the lock. Retry later, raise the wait budget with \
                     --timeout or KVLOCK_LOCK_TIMEOUT, or use 'infinite' to wait until it is \
                     released."
                        .to_string(),
                );
                let details = Some(format!(
                    "Wait budget: {timeout}; acquisition attempts: {attempts}."
                ));
                (suggestion, details)
            }
            KvLockError::LockCancelled { cause, .. } => {
                let suggestion = match cause {
                    CancelCause::DeadlineExceeded => Some(
                        "The caller's deadline passed before the lock became free; extend the \
                         deadline or shorten the work performed before locking."
                            .to_string(),
                    ),
                    CancelCause::Signal | CancelCause::Cancelled => None,
                };
                (suggestion, Some(format!("Cause: {cause}.")))
            }
            KvLockError::NotLockOwner { key } => {
                let suggestion = Some(
                    "The lock record expired or was released before this release call. Choose a \
                     TTL longer than the longest expected hold time (ttl / KVLOCK_TTL)."
                        .to_string(),
                );
                let details = Some(format!(
                    "The record for '{key}' no longer holds this handle's token; work done under \
                     the lock may have overlapped with another owner."
                ));
                (suggestion, details)
            }
            KvLockError::LockBusy { key } => {
                let suggestion = Some(
                    "Run without --no-wait to wait for the current owner to release the lock."
                        .to_string(),
                );
                (suggestion, Some(format!("Key: {key}")))
            }
            KvLockError::Store(store_error) => store_context(store_error),
            KvLockError::ConfigError(msg) | KvLockError::InvalidConfig(msg) => {
                let suggestion = Some(
                    "Check kvlock.toml (or the file named by KVLOCK_CONFIG) and KVLOCK_* \
                     environment variables."
                        .to_string(),
                );
                (suggestion, Some(msg.clone()))
            }
            KvLockError::Io(_) => (None, None),
        };

        ErrorContext {
            error,
            suggestion,
            details,
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

fn store_context(error: &StoreError) -> (Option<String>, Option<String>) {
    let details = error.source().map(|source| source.to_string());
    let suggestion = match error {
        StoreError::Connection { .. } => Some(
            "Verify that the store is reachable and that redis.url (KVLOCK_REDIS__URL) is \
             correct."
                .to_string(),
        ),
        StoreError::Command { .. } => Some(
            "The store rejected or dropped the command. Check server logs and, if the store is \
             slow, raise redis.io_timeout."
                .to_string(),
        ),
        StoreError::UnexpectedReply { .. } => Some(
            "The store answered in an unexpected format; confirm it is a Redis-compatible \
             server with Lua scripting enabled."
                .to_string(),
        ),
        StoreError::Backend { .. } => None,
    };
    (suggestion, details)
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
