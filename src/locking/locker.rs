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

use crate::error::Result;
use crate::locking::context::LockContext;
use crate::locking::handle::LockHandle;
use std::time::Duration;

/// Mutual exclusion keyed by an arbitrary string, shared by every process
/// that talks to the same store.
pub trait Locker: Send + Sync {
    /// Blocks until the lock is acquired, the default wait budget runs out,
    /// or the context ends.
    fn lock(&self, ctx: &LockContext, key: &str) -> Result<LockHandle>;

    /// Makes exactly one attempt. `Ok(None)` means another owner holds the key.
    fn try_lock(&self, ctx: &LockContext, key: &str) -> Result<Option<LockHandle>>;

    /// Like [`Locker::lock`] with an explicit wait budget.
    fn lock_with_timeout(
        &self,
        ctx: &LockContext,
        key: &str,
        timeout: Duration,
    ) -> Result<LockHandle>;
}
