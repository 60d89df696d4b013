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

use crate::error::{KvLockError, Result};
use crate::locking::context::LockContext;
use crate::locking::key::LockKey;
use crate::locking::token::LockToken;
use crate::store::LockStore;
use log::debug;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Lifecycle of a [`LockHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Held,
    Released,
}

/// Capability returned by a successful acquisition, used to release the lock.
///
/// The handle is bound to the namespaced key and the token written when the
/// record was created. Dropping a handle does not release the lock; the
/// record then lives until its TTL expires.
pub struct LockHandle {
    key: LockKey,
    token: LockToken,
    store: Arc<dyn LockStore>,
    ttl: Duration,
    acquired_at: Instant,
    released: AtomicBool,
}

impl LockHandle {
    pub(crate) fn new(
        key: LockKey,
        token: LockToken,
        store: Arc<dyn LockStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            key,
            token,
            store,
            ttl,
            acquired_at: Instant::now(),
            released: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    pub fn state(&self) -> HandleState {
        if self.released.load(Ordering::SeqCst) {
            HandleState::Released
        } else {
            HandleState::Held
        }
    }

    /// Releases the lock by deleting its record only if it still holds this
    /// handle's token.
    ///
    /// Returns [`KvLockError::NotLockOwner`] when the record expired, was
    /// already released, or now belongs to someone else. Any call after the
    /// first one reports `NotLockOwner` without contacting the store. A done
    /// context returns [`KvLockError::LockCancelled`] and leaves the handle
    /// held so release can be retried.
    pub fn unlock(&self, ctx: &LockContext) -> Result<()> {
        if let Err(cause) = ctx.check() {
            return Err(KvLockError::LockCancelled {
                key: self.key.to_string(),
                cause,
                waited_secs: 0.0,
            });
        }

        if self.released.swap(true, Ordering::SeqCst) {
            debug!("Lock {} already released by this handle", self.key);
            return Err(self.not_owner());
        }

        let deleted = self
            .store
            .compare_and_delete(self.key.as_str(), self.token.as_str())?;
        if !deleted {
            debug!(
                "Lock {} no longer held by this handle after {:.3}s (ttl {:.3}s)",
                self.key,
                self.held_for().as_secs_f64(),
                self.ttl.as_secs_f64()
            );
            return Err(self.not_owner());
        }

        debug!(
            "Released lock {} after {:.3}s",
            self.key,
            self.held_for().as_secs_f64()
        );
        Ok(())
    }

    fn not_owner(&self) -> KvLockError {
        KvLockError::NotLockOwner {
            key: self.key.to_string(),
        }
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.key)
            .field("token", &self.token)
            .field("backend", &self.store.backend())
            .field("ttl", &self.ttl)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if !self.released.load(Ordering::SeqCst) {
            debug!(
                "Lock handle for {} dropped while held; record expires within {:.3}s",
                self.key,
                self.ttl.saturating_sub(self.held_for()).as_secs_f64()
            );
        }
    }
}
