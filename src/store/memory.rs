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

use super::{LockStore, StoreError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const BACKEND: &str = "in-memory";

#[derive(Debug)]
struct Record {
    value: String,
    expires_at: Instant,
}

impl Record {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local store keeping lock records in a `HashMap` with expiry.
///
/// Both primitives run under one mutex, which makes them atomic with respect
/// to each other. Expired records are dropped lazily when touched or by
/// [`InMemoryStore::purge_expired`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, Record>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let records = self.records()?;
        Ok(records
            .get(key)
            .filter(|record| !record.is_expired(now))
            .map(|record| record.value.clone()))
    }

    pub fn contains_key(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Number of unexpired records.
    pub fn len(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let records = self.records()?;
        Ok(records
            .values()
            .filter(|record| !record.is_expired(now))
            .count())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Drops every expired record and returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut records = self.records()?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(before - records.len())
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<String, Record>>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Backend {
            backend: BACKEND,
            details: "record map poisoned".to_string(),
        })
    }
}

impl LockStore for InMemoryStore {
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut records = self.records()?;

        if let Some(existing) = records.get(key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }

        let expires_at = now.checked_add(ttl).unwrap_or_else(far_future);
        records.insert(
            key.to_string(),
            Record {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut records = self.records()?;

        match records.get(key) {
            Some(record) if record.is_expired(now) => {
                records.remove(key);
                Ok(false)
            }
            Some(record) if record.value == expected => {
                records.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

// Roughly thirty years out; only reached with `Duration::MAX`-like TTLs.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(60 * 60 * 24 * 365 * 30)
}
