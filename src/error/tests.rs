use crate::error::format::format_error_with_color;
use crate::error::*;
use crate::locking::{CancelCause, LockTimeoutValue};
use crate::store::StoreError;
use std::io;

fn timeout_error() -> KvLockError {
    KvLockError::LockTimeout {
        key: "jobs:nightly".to_string(),
        waited_secs: 0.2,
        timeout: LockTimeoutValue::from_millis(200),
        attempts: 6,
    }
}

#[test]
fn test_error_context_timeout() {
    let error = timeout_error();
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("--timeout"));
    let details = context.details.unwrap();
    assert!(details.contains("200ms"));
    assert!(details.contains("attempts: 6"));
}

#[test]
fn test_error_context_deadline_cancellation() {
    let error = KvLockError::LockCancelled {
        key: "k".to_string(),
        cause: CancelCause::DeadlineExceeded,
        waited_secs: 1.0,
    };
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("deadline"));
    assert_eq!(
        context.details.as_deref(),
        Some("Cause: context deadline exceeded.")
    );
}

#[test]
fn test_error_context_signal_cancellation_has_no_suggestion() {
    let error = KvLockError::LockCancelled {
        key: "k".to_string(),
        cause: CancelCause::Signal,
        waited_secs: 1.0,
    };
    let context = ErrorContext::new(&error);
    assert!(context.suggestion.is_none());
}

#[test]
fn test_error_context_not_owner_mentions_ttl() {
    let error = KvLockError::NotLockOwner {
        key: "billing:invoice-42".to_string(),
    };
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("TTL"));
    assert!(context.details.unwrap().contains("billing:invoice-42"));
}

#[test]
fn test_error_context_store_connection() {
    let error = KvLockError::Store(StoreError::connection(
        "redis",
        io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
    ));
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("KVLOCK_REDIS__URL"));
    assert_eq!(context.details.as_deref(), Some("connection refused"));
}

#[test]
fn test_store_error_is_transparent() {
    let store_error = StoreError::Backend {
        backend: "in-memory",
        details: "record map poisoned".to_string(),
    };
    let expected = store_error.to_string();
    let error = KvLockError::from(store_error);
    assert_eq!(error.to_string(), expected);
    assert!(error.is_store());
}

#[test]
fn test_error_predicates_are_disjoint() {
    let timeout = timeout_error();
    assert!(timeout.is_timeout());
    assert!(!timeout.is_cancelled());
    assert!(!timeout.is_not_owner());
    assert!(!timeout.is_store());
    assert_eq!(timeout.cancel_cause(), None);

    let cancelled = KvLockError::LockCancelled {
        key: "k".to_string(),
        cause: CancelCause::Cancelled,
        waited_secs: 0.0,
    };
    assert!(cancelled.is_cancelled());
    assert_eq!(cancelled.cancel_cause(), Some(CancelCause::Cancelled));
}

#[test]
fn test_exit_codes() {
    assert_eq!(get_exit_code(&timeout_error()), 3);
    assert_eq!(
        get_exit_code(&KvLockError::LockBusy {
            key: "k".to_string()
        }),
        4
    );
    assert_eq!(
        get_exit_code(&KvLockError::NotLockOwner {
            key: "k".to_string()
        }),
        5
    );
    assert_eq!(
        get_exit_code(&KvLockError::InvalidConfig("ttl".to_string())),
        2
    );
    assert_eq!(
        get_exit_code(&KvLockError::LockCancelled {
            key: "k".to_string(),
            cause: CancelCause::Signal,
            waited_secs: 0.0,
        }),
        130
    );
    assert_eq!(
        get_exit_code(&KvLockError::Io(io::Error::other("boom"))),
        1
    );
}

#[test]
fn test_format_error_chain() {
    let formatted = format_error_chain(&timeout_error());
    assert!(formatted.starts_with("Error: Timed out acquiring lock 'jobs:nightly' after 0.200s"));
    assert!(formatted.contains("\n\nDetails: "));
    assert!(formatted.contains("\n\nSuggestion: "));
}

#[test]
fn test_format_error_without_color() {
    let formatted = format_error_with_color(&timeout_error(), false);
    assert!(formatted.starts_with("Error: Timed out acquiring lock"));
    assert!(formatted.contains("Suggestions:\n• Another owner still holds the lock."));
    assert!(!formatted.contains("\x1b["));
}
