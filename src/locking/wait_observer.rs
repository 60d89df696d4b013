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

//! Observer interfaces for lock wait instrumentation.
//!
//! Lock wait observers decouple the `LockController` from user-facing feedback
//! so callers can surface contention information without duplicating polling
//! logic.

use crate::locking::key::LockKey;
use crate::locking::timeout::{LockTimeoutSource, LockTimeoutValue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Observer hooks for lock wait events.
pub trait LockWaitObserver: Send + Sync {
    fn on_wait_start(&self, _key: &LockKey, _timeout: LockTimeoutValue) {}

    fn on_retry(
        &self,
        _key: &LockKey,
        _attempt: usize,
        _elapsed: Duration,
        _remaining: Option<Duration>,
    ) {
    }

    fn on_acquired(&self, _key: &LockKey, _waited: Duration) {}

    fn on_timeout(&self, _key: &LockKey, _waited: Duration) {}

    fn on_cancelled(&self, _key: &LockKey, _waited: Duration) {}
}

/// Observer implementation that performs no work.
#[derive(Debug, Default)]
pub struct NoopLockWaitObserver;

impl LockWaitObserver for NoopLockWaitObserver {}

/// Sink used by [`StatusReporterObserver`] to surface wait-state progress.
pub trait LockStatusSink: Send + Sync {
    fn step(&self, message: &str);
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Turns lock wait events into throttled human-readable status lines.
pub struct StatusReporterObserver<S> {
    sink: S,
    source: LockTimeoutSource,
    notified_contention: AtomicBool,
    waited: AtomicBool,
}

impl<S: LockStatusSink> StatusReporterObserver<S> {
    pub fn new(sink: S, source: LockTimeoutSource) -> Self {
        Self {
            sink,
            source,
            notified_contention: AtomicBool::new(false),
            waited: AtomicBool::new(false),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: LockStatusSink> LockWaitObserver for StatusReporterObserver<S> {
    fn on_wait_start(&self, key: &LockKey, timeout: LockTimeoutValue) {
        self.waited.store(true, Ordering::Relaxed);
        self.sink.step(&format!(
            "Waiting for lock '{key}' (timeout {timeout}, source {}) - Ctrl-C to cancel",
            self.source
        ));
    }

    fn on_retry(
        &self,
        key: &LockKey,
        attempt: usize,
        elapsed: Duration,
        remaining: Option<Duration>,
    ) {
        if !self.notified_contention.swap(true, Ordering::Relaxed) {
            let waited = format_duration(elapsed);
            let remaining_text = remaining
                .map(format_duration)
                .map(|value| format!(" (~{value} remaining)"))
                .unwrap_or_default();
            self.sink.step(&format!(
                "Lock '{key}' is held by another owner, waited {waited}{remaining_text}"
            ));
        } else if attempt % 50 == 0 {
            let waited = format_duration(elapsed);
            self.sink.step(&format!(
                "Still waiting for lock '{key}' after {waited} (attempt {attempt})"
            ));
        }
    }

    fn on_acquired(&self, key: &LockKey, waited: Duration) {
        // Uncontended acquisitions stay quiet.
        if !self.waited.load(Ordering::Relaxed) {
            return;
        }
        let waited_label = format_duration(waited);
        self.sink
            .success(&format!("Acquired lock '{key}' after {waited_label}"));
    }

    fn on_timeout(&self, key: &LockKey, waited: Duration) {
        let waited_label = format_duration(waited);
        self.sink.error(&format!(
            "Timed out waiting for lock '{key}' after {waited_label}"
        ));
    }

    fn on_cancelled(&self, key: &LockKey, waited: Duration) {
        let waited_label = format_duration(waited);
        self.sink.error(&format!(
            "Cancelled while waiting for lock '{key}' after {waited_label}"
        ));
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.1}s", duration.as_secs_f32())
    } else {
        format!("{:.0}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::key::KeyNamespace;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn messages(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl LockStatusSink for RecordingSink {
        fn step(&self, message: &str) {
            self.events.lock().unwrap().push(format!("step:{message}"));
        }

        fn success(&self, message: &str) {
            self.events.lock().unwrap().push(format!("ok:{message}"));
        }

        fn error(&self, message: &str) {
            self.events.lock().unwrap().push(format!("err:{message}"));
        }
    }

    fn key() -> LockKey {
        KeyNamespace::new("jobs").qualify("nightly")
    }

    #[test]
    fn reporter_observer_describes_wait() {
        let observer =
            StatusReporterObserver::new(RecordingSink::default(), LockTimeoutSource::Cli);
        let key = key();

        observer.on_wait_start(&key, LockTimeoutValue::from_secs(30));
        observer.on_retry(
            &key,
            1,
            Duration::from_millis(120),
            Some(Duration::from_secs(10)),
        );
        observer.on_retry(&key, 2, Duration::from_millis(240), None);
        observer.on_acquired(&key, Duration::from_millis(250));

        let output = observer.sink().messages();
        assert_eq!(output.len(), 3);
        assert!(output[0].contains("Waiting for lock 'jobs:nightly' (timeout 30s, source CLI flag)"));
        assert!(output[1].contains("held by another owner, waited 120ms (~10.0s remaining)"));
        assert!(output[2].starts_with("ok:Acquired lock 'jobs:nightly' after 250ms"));
    }

    #[test]
    fn uncontended_acquire_is_silent() {
        let observer =
            StatusReporterObserver::new(RecordingSink::default(), LockTimeoutSource::Default);
        observer.on_acquired(&key(), Duration::from_millis(1));
        assert!(observer.sink().messages().is_empty());
    }

    #[test]
    fn failures_are_reported_as_errors() {
        let observer =
            StatusReporterObserver::new(RecordingSink::default(), LockTimeoutSource::Config);
        observer.on_timeout(&key(), Duration::from_secs(2));
        observer.on_cancelled(&key(), Duration::from_millis(40));

        let output = observer.sink().messages();
        assert_eq!(
            output,
            [
                "err:Timed out waiting for lock 'jobs:nightly' after 2.0s",
                "err:Cancelled while waiting for lock 'jobs:nightly' after 40ms",
            ]
        );
    }
}
