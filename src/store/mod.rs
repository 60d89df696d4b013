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

//! Backing stores for lock records.
//!
//! A store only needs two primitives, and both must be atomic on the store
//! side: create a record when the key is absent (with an expiry set in the
//! same step), and delete a record only when its value still matches the
//! token that created it. Anything that cannot offer the second primitive as
//! a single step must not implement [`LockStore`].

mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use error::StoreError;
pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::{RedisStore, UNLOCK_SCRIPT};

use std::time::Duration;

/// Atomic primitives required from a shared key-value store.
pub trait LockStore: Send + Sync {
    /// Sets `key` to `value` with the given expiry, only if `key` is absent.
    ///
    /// Returns `Ok(true)` when the record was created and `Ok(false)` when
    /// another record already occupies the key.
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Deletes `key` only if its current value equals `expected`.
    ///
    /// Returns `Ok(false)` when the key is missing, expired, or holds a
    /// different value.
    fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Short backend label used in diagnostics.
    fn backend(&self) -> &'static str {
        "custom"
    }
}
