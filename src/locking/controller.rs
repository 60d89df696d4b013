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

use crate::config::LockerConfig;
use crate::error::{KvLockError, Result};
use crate::locking::acquisition::{LockAcquisitionRequest, PollingBackoff};
use crate::locking::cancellation::CancelCause;
use crate::locking::context::LockContext;
use crate::locking::handle::LockHandle;
use crate::locking::key::{KeyNamespace, LockKey};
use crate::locking::locker::Locker;
use crate::locking::timeout::LockTimeoutValue;
use crate::locking::token::LockToken;
use crate::locking::wait_observer::LockWaitObserver;
use crate::store::LockStore;
use log::{debug, trace};
use std::sync::Arc;
use std::time::Duration;

/// Store-backed [`Locker`].
///
/// Holds only immutable settings and shared references, so one controller
/// can serve any number of threads through `&self` or an `Arc`.
pub struct LockController {
    store: Arc<dyn LockStore>,
    namespace: KeyNamespace,
    ttl: Duration,
    default_timeout: LockTimeoutValue,
    backoff: PollingBackoff,
    observer: Option<Arc<dyn LockWaitObserver>>,
}

impl LockController {
    pub fn new(store: Arc<dyn LockStore>, config: &LockerConfig) -> Self {
        Self {
            store,
            namespace: KeyNamespace::new(config.key_prefix.clone()),
            ttl: config.ttl,
            default_timeout: config.default_timeout,
            backoff: config.retry_backoff(),
            observer: None,
        }
    }

    pub fn with_defaults(store: Arc<dyn LockStore>) -> Self {
        Self::new(store, &LockerConfig::default())
    }

    pub fn with_observer(mut self, observer: Arc<dyn LockWaitObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn key_prefix(&self) -> &str {
        self.namespace.prefix()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn default_timeout(&self) -> LockTimeoutValue {
        self.default_timeout
    }

    pub fn store(&self) -> &Arc<dyn LockStore> {
        &self.store
    }

    /// Blocking acquisition with a budget that may be infinite.
    pub fn lock_with_timeout_value(
        &self,
        ctx: &LockContext,
        key: &str,
        timeout: LockTimeoutValue,
    ) -> Result<LockHandle> {
        let request = LockAcquisitionRequest::new(self.namespace.qualify(key), timeout)
            .with_backoff(self.backoff.clone())
            .with_observer(self.observer.as_deref());
        self.acquire(ctx, request)
    }

    fn acquire(
        &self,
        ctx: &LockContext,
        mut request: LockAcquisitionRequest<'_>,
    ) -> Result<LockHandle> {
        let key = request.key().clone();

        loop {
            // An ended context wins over an exhausted budget.
            if let Err(cause) = ctx.check() {
                return Err(cancelled(&request, cause));
            }

            if request.budget().is_expired() {
                request.notify_timeout();
                debug!(
                    "Gave up on lock {key} after {:.3}s and {} attempt(s)",
                    request.elapsed().as_secs_f64(),
                    request.attempts()
                );
                return Err(KvLockError::LockTimeout {
                    key: key.into_string(),
                    waited_secs: request.elapsed().as_secs_f64(),
                    timeout: request.timeout_value(),
                    attempts: request.attempts(),
                });
            }

            request.record_attempt();
            if let Some(handle) = self.attempt_once(&key)? {
                request.notify_acquired();
                debug!(
                    "Acquired lock {key} on attempt {} after {:.3}s",
                    request.attempts(),
                    request.elapsed().as_secs_f64()
                );
                return Ok(handle);
            }

            request.record_wait_start();
            request.record_retry();
            let Some(delay) = request.next_sleep_interval() else {
                continue;
            };
            trace!("Lock {key} busy; sleeping {delay:?} before retrying");
            if let Err(cause) = ctx.wait(delay) {
                return Err(cancelled(&request, cause));
            }
        }
    }

    /// One `set_if_absent` call with a fresh token. `None` means the key is held.
    fn attempt_once(&self, key: &LockKey) -> Result<Option<LockHandle>> {
        let token = LockToken::generate();
        let created = self
            .store
            .set_if_absent(key.as_str(), token.as_str(), self.ttl)?;
        if !created {
            return Ok(None);
        }
        Ok(Some(LockHandle::new(
            key.clone(),
            token,
            Arc::clone(&self.store),
            self.ttl,
        )))
    }
}

fn cancelled(request: &LockAcquisitionRequest<'_>, cause: CancelCause) -> KvLockError {
    request.notify_cancelled();
    debug!(
        "Stopped waiting for lock {} after {:.3}s: {cause}",
        request.key(),
        request.elapsed().as_secs_f64()
    );
    KvLockError::LockCancelled {
        key: request.key().to_string(),
        cause,
        waited_secs: request.elapsed().as_secs_f64(),
    }
}

impl Locker for LockController {
    fn lock(&self, ctx: &LockContext, key: &str) -> Result<LockHandle> {
        self.lock_with_timeout_value(ctx, key, self.default_timeout)
    }

    fn try_lock(&self, ctx: &LockContext, key: &str) -> Result<Option<LockHandle>> {
        let key = self.namespace.qualify(key);
        if let Err(cause) = ctx.check() {
            debug!("Skipped lock attempt on {key}: {cause}");
            return Err(KvLockError::LockCancelled {
                key: key.into_string(),
                cause,
                waited_secs: 0.0,
            });
        }

        let handle = self.attempt_once(&key)?;
        match &handle {
            Some(_) => debug!("Acquired lock {key} without waiting"),
            None => trace!("Lock {key} is held elsewhere"),
        }
        Ok(handle)
    }

    fn lock_with_timeout(
        &self,
        ctx: &LockContext,
        key: &str,
        timeout: Duration,
    ) -> Result<LockHandle> {
        self.lock_with_timeout_value(ctx, key, LockTimeoutValue::Finite(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locking::CancellationToken;
    use crate::store::{InMemoryStore, StoreError};
    use mockall::mock;
    use std::io;
    use std::thread;
    use std::time::Instant;

    mock! {
        Store {}

        impl LockStore for Store {
            fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> std::result::Result<bool, StoreError>;
            fn compare_and_delete(&self, key: &str, expected: &str) -> std::result::Result<bool, StoreError>;
        }
    }

    fn refused() -> StoreError {
        StoreError::connection(
            "mock",
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        )
    }

    fn memory_controller(config: &LockerConfig) -> (Arc<InMemoryStore>, LockController) {
        let store = Arc::new(InMemoryStore::new());
        let controller = LockController::new(store.clone(), config);
        (store, controller)
    }

    #[test]
    fn try_lock_returns_none_when_contended() {
        let (_, controller) = memory_controller(&LockerConfig::default());
        let ctx = LockContext::background();

        let held = controller.try_lock(&ctx, "jobs").unwrap().unwrap();
        assert!(controller.try_lock(&ctx, "jobs").unwrap().is_none());

        held.unlock(&ctx).unwrap();
        assert!(controller.try_lock(&ctx, "jobs").unwrap().is_some());
    }

    #[test]
    fn prefix_is_applied_to_acquire_and_release() {
        let config = LockerConfig::default().with_key_prefix("billing");
        let (store, controller) = memory_controller(&config);
        let ctx = LockContext::background();

        let handle = controller.lock(&ctx, "invoice-42").unwrap();
        assert_eq!(handle.key().as_str(), "billing:invoice-42");
        assert_eq!(
            store.get("billing:invoice-42").unwrap().as_deref(),
            Some(handle.token().as_str())
        );
        assert!(!store.contains_key("invoice-42").unwrap());

        handle.unlock(&ctx).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn tokens_are_fresh_per_acquisition() {
        let (_, controller) = memory_controller(&LockerConfig::default());
        let ctx = LockContext::background();

        let first = controller.try_lock(&ctx, "k").unwrap().unwrap();
        let first_token = first.token().clone();
        first.unlock(&ctx).unwrap();
        let second = controller.try_lock(&ctx, "k").unwrap().unwrap();
        assert_ne!(first_token, *second.token());
    }

    #[test]
    fn zero_timeout_reports_timeout_without_attempt() {
        let mut store = MockStore::new();
        store.expect_set_if_absent().never();
        let controller = LockController::with_defaults(Arc::new(store));

        let err = controller
            .lock_with_timeout(&LockContext::background(), "k", Duration::ZERO)
            .unwrap_err();
        match err {
            KvLockError::LockTimeout { attempts, .. } => assert_eq!(attempts, 0),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blocking_lock_times_out_when_held() {
        let (_, controller) = memory_controller(&LockerConfig::default());
        let ctx = LockContext::background();
        let _held = controller.lock(&ctx, "k").unwrap();

        let started = Instant::now();
        let err = controller
            .lock_with_timeout(&ctx, "k", Duration::from_millis(120))
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_timeout(), "{err:?}");
        assert!(elapsed >= Duration::from_millis(120));
        assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");
        match err {
            KvLockError::LockTimeout { attempts, .. } => assert!(attempts > 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blocking_lock_succeeds_once_holder_releases() {
        let store = Arc::new(InMemoryStore::new());
        let controller = Arc::new(LockController::with_defaults(store));
        let ctx = LockContext::background();
        let held = controller.lock(&ctx, "k").unwrap();

        let waiter = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                controller
                    .lock_with_timeout(&LockContext::background(), "k", Duration::from_secs(5))
                    .map(|handle| handle.unlock(&LockContext::background()))
            })
        };

        thread::sleep(Duration::from_millis(60));
        held.unlock(&ctx).unwrap();
        waiter.join().unwrap().unwrap().unwrap();
    }

    #[test]
    fn set_failure_propagates_without_retry() {
        let mut store = MockStore::new();
        store
            .expect_set_if_absent()
            .times(1)
            .returning(|_, _, _| Err(refused()));
        let controller = LockController::with_defaults(Arc::new(store));

        let err = controller
            .lock_with_timeout(&LockContext::background(), "k", Duration::from_secs(5))
            .unwrap_err();
        assert!(err.is_store(), "{err:?}");
    }

    #[test]
    fn try_lock_surfaces_store_failure() {
        let mut store = MockStore::new();
        store
            .expect_set_if_absent()
            .times(1)
            .returning(|_, _, _| Err(refused()));
        let controller = LockController::with_defaults(Arc::new(store));

        let err = controller
            .try_lock(&LockContext::background(), "k")
            .unwrap_err();
        assert!(matches!(err, KvLockError::Store(StoreError::Connection { .. })));
    }

    #[test]
    fn store_failure_after_contention_stops_the_loop() {
        let mut store = MockStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_set_if_absent()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(false));
        store
            .expect_set_if_absent()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(refused()));
        let controller = LockController::with_defaults(Arc::new(store));

        let err = controller
            .lock_with_timeout(&LockContext::background(), "k", Duration::from_secs(5))
            .unwrap_err();
        assert!(err.is_store());
    }

    #[test]
    fn release_failure_marks_handle_released() {
        let mut store = MockStore::new();
        store
            .expect_set_if_absent()
            .returning(|_, _, _| Ok(true));
        store
            .expect_compare_and_delete()
            .times(1)
            .returning(|_, _| Err(refused()));
        let controller = LockController::with_defaults(Arc::new(store));
        let ctx = LockContext::background();

        let handle = controller.try_lock(&ctx, "k").unwrap().unwrap();
        assert!(handle.unlock(&ctx).unwrap_err().is_store());
        // Second call must not reach the store.
        assert!(handle.unlock(&ctx).unwrap_err().is_not_owner());
    }

    #[test]
    fn cancelled_context_skips_the_store() {
        let mut store = MockStore::new();
        store.expect_set_if_absent().never();
        let controller = LockController::with_defaults(Arc::new(store));
        let token = CancellationToken::new();
        token.cancel();
        let ctx = LockContext::background().with_cancellation(token);

        let err = controller.try_lock(&ctx, "k").unwrap_err();
        assert_eq!(err.cancel_cause(), Some(CancelCause::Cancelled));
        let err = controller.lock(&ctx, "k").unwrap_err();
        assert_eq!(err.cancel_cause(), Some(CancelCause::Cancelled));
    }

    #[test]
    fn cancel_during_wait_returns_promptly() {
        let (_, controller) = memory_controller(&LockerConfig::default());
        let _held = controller.lock(&LockContext::background(), "k").unwrap();

        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(80));
                token.cancel();
            })
        };

        let started = Instant::now();
        let err = controller
            .lock_with_timeout(
                &LockContext::background().with_cancellation(token),
                "k",
                Duration::from_secs(10),
            )
            .unwrap_err();
        canceller.join().unwrap();

        assert_eq!(err.cancel_cause(), Some(CancelCause::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn cancellation_during_last_attempt_is_not_reported_as_timeout() {
        let token = CancellationToken::new();
        let mut store = MockStore::new();
        {
            let token = token.clone();
            store
                .expect_set_if_absent()
                .times(1)
                .returning(move |_, _, _| {
                    token.cancel();
                    thread::sleep(Duration::from_millis(80));
                    Ok(false)
                });
        }
        let controller = LockController::with_defaults(Arc::new(store));
        let ctx = LockContext::background().with_cancellation(token);

        let err = controller
            .lock_with_timeout(&ctx, "k", Duration::from_millis(50))
            .unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(err.cancel_cause(), Some(CancelCause::Cancelled));
    }

    #[test]
    fn context_deadline_reports_deadline_exceeded() {
        let (_, controller) = memory_controller(&LockerConfig::default());
        let _held = controller.lock(&LockContext::background(), "k").unwrap();

        let ctx = LockContext::background().with_timeout(Duration::from_millis(60));
        let err = controller
            .lock_with_timeout(&ctx, "k", Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(err.cancel_cause(), Some(CancelCause::DeadlineExceeded));
    }

    #[test]
    fn configuration_is_exposed() {
        let config = LockerConfig::default()
            .with_key_prefix("svc")
            .with_ttl(Duration::from_secs(9))
            .with_default_timeout(LockTimeoutValue::Infinite);
        let (_, controller) = memory_controller(&config);

        assert_eq!(controller.key_prefix(), "svc");
        assert_eq!(controller.ttl(), Duration::from_secs(9));
        assert!(controller.default_timeout().is_infinite());
        assert_eq!(controller.store().backend(), "in-memory");
    }
}
