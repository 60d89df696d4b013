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

//! Mutual exclusion between processes that share a key-value store.
//!
//! A lock is a store record created with "set if absent" and an expiry. The
//! record's value is a random token, and release deletes the record only
//! while it still holds that token.
//!
//! ```no_run
//! use kvlock::config::LockerConfig;
//! use kvlock::locking::{LockContext, LockController, Locker};
//! use kvlock::store::InMemoryStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> kvlock::error::Result<()> {
//! let config = LockerConfig::default().with_key_prefix("jobs");
//! let locker = LockController::new(Arc::new(InMemoryStore::new()), &config);
//! let ctx = LockContext::background();
//!
//! let handle = locker.lock_with_timeout(&ctx, "nightly-report", Duration::from_secs(2))?;
//! // ... exclusive work ...
//! handle.unlock(&ctx)?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod locking;
pub mod logging;
pub mod store;

pub use config::LockerConfig;
pub use error::{KvLockError, Result};
pub use locking::{LockContext, LockController, LockHandle, Locker};
