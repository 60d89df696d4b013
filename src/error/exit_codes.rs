use crate::error::KvLockError;

pub fn get_exit_code(error: &KvLockError) -> i32 {
    match error {
        KvLockError::ConfigError(_) | KvLockError::InvalidConfig(_) => 2,

        KvLockError::LockTimeout { .. } => 3,

        KvLockError::LockBusy { .. } => 4,

        KvLockError::NotLockOwner { .. } => 5,

        KvLockError::Store(_) => 20,

        KvLockError::LockCancelled { .. } => 130, // Conventional exit code for SIGINT

        KvLockError::Io(_) => 1,
    }
}
