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

//! Per-call cancellation scope passed to every locking operation.

use crate::locking::cancellation::{CancelCause, CancellationToken};
use std::thread;
use std::time::{Duration, Instant};

/// Cancellation token plus optional deadline bounding one caller's work.
///
/// Contexts are cheap to clone and independent per caller; the locker never
/// shares them between operations.
#[derive(Debug, Clone, Default)]
pub struct LockContext {
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl LockContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Sets a deadline, keeping the earlier one if a deadline already exists.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn cause(&self) -> Option<CancelCause> {
        if let Some(cause) = self.cancellation.as_ref().and_then(|token| token.cause()) {
            return Some(cause);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelCause::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    pub fn check(&self) -> Result<(), CancelCause> {
        match self.cause() {
            Some(cause) => Err(cause),
            None => Ok(()),
        }
    }

    /// Sleeps for `duration`, returning early if the context ends meanwhile.
    pub fn wait(&self, duration: Duration) -> Result<(), CancelCause> {
        self.check()?;

        let (sleep_for, reaches_deadline) = match self.remaining() {
            Some(remaining) if remaining <= duration => (remaining, true),
            _ => (duration, false),
        };

        let cancelled = match &self.cancellation {
            Some(token) => token.wait_timeout(sleep_for),
            None => {
                thread::sleep(sleep_for);
                false
            }
        };

        if cancelled {
            return Err(self.cause().unwrap_or(CancelCause::Cancelled));
        }
        if reaches_deadline {
            return Err(CancelCause::DeadlineExceeded);
        }
        Ok(())
    }
}
