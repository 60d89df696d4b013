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

use log::warn;
use signal_hook::SigId;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

#[cfg(windows)]
use signal_hook::consts::signal::SIGBREAK;

/// Signal handlers cannot notify a condition variable, so waits on a
/// signal-backed token re-check the flag at this interval.
const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Why a context stopped before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// `CancellationToken::cancel` was called.
    Cancelled,
    /// The context deadline passed.
    DeadlineExceeded,
    /// The process received SIGINT/SIGTERM.
    Signal,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CancelCause::Cancelled => "context cancelled",
            CancelCause::DeadlineExceeded => "context deadline exceeded",
            CancelCause::Signal => "interrupted by signal",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
struct TokenState {
    flag: Arc<AtomicBool>,
    explicit: Mutex<bool>,
    wake: Condvar,
    signal_backed: bool,
}

/// Token used to observe cancellation requested by the caller or by signals.
///
/// Clones share state: cancelling any clone cancels all of them.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::with_flag(Arc::new(AtomicBool::new(false)), false)
    }

    fn with_flag(flag: Arc<AtomicBool>, signal_backed: bool) -> Self {
        Self {
            state: Arc::new(TokenState {
                flag,
                explicit: Mutex::new(false),
                wake: Condvar::new(),
                signal_backed,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.flag.load(Ordering::SeqCst)
    }

    /// Returns why the token was cancelled, if it was.
    pub fn cause(&self) -> Option<CancelCause> {
        if !self.is_cancelled() {
            return None;
        }
        let explicit = *self
            .state
            .explicit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if explicit {
            Some(CancelCause::Cancelled)
        } else {
            Some(CancelCause::Signal)
        }
    }

    /// Marks the token as cancelled and wakes every waiter.
    pub fn cancel(&self) {
        let mut explicit = self
            .state
            .explicit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.is_cancelled() {
            *explicit = true;
        }
        self.state.flag.store(true, Ordering::SeqCst);
        self.state.wake.notify_all();
    }

    /// Blocks for up to `timeout`, returning early with `true` once cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let started = Instant::now();
        let mut guard = self
            .state
            .explicit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            if self.is_cancelled() {
                return true;
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return false;
            }

            let mut slice = timeout - elapsed;
            if self.state.signal_backed {
                slice = slice.min(SIGNAL_POLL_INTERVAL);
            }
            guard = self
                .state
                .wake
                .wait_timeout(guard, slice)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct CancellationRegistry {
    token: CancellationToken,
    _handles: Vec<SigId>,
}

impl CancellationRegistry {
    fn new() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();

        for signal in registered_signals() {
            match flag::register(*signal, flag.clone()) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!("Failed to register cancellation handler for signal {signal}: {err}")
                }
            }
        }

        Self {
            token: CancellationToken::with_flag(flag, true),
            _handles: handles,
        }
    }
}

fn registered_signals() -> &'static [i32] {
    #[cfg(windows)]
    {
        static SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGBREAK];
        &SIGNALS
    }

    #[cfg(not(windows))]
    {
        static SIGNALS: [i32; 2] = [SIGINT, SIGTERM];
        &SIGNALS
    }
}

static GLOBAL_REGISTRY: OnceLock<CancellationRegistry> = OnceLock::new();

/// Returns a cancellation token backed by global signal handlers.
pub fn global_token() -> CancellationToken {
    GLOBAL_REGISTRY
        .get_or_init(CancellationRegistry::new)
        .token
        .clone()
}
