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

//! Redis-backed lock store.
//!
//! Acquisition uses `SET key token NX PX ttl`, which creates the record and
//! its expiry in one command. Release runs [`UNLOCK_SCRIPT`] on the server,
//! so the ownership check and the delete cannot interleave with another
//! client's commands.

use super::{LockStore, StoreError};
use log::{debug, trace};
use redis::{Client, Connection, ConnectionLike, RedisError, Script, Value};
use std::sync::Mutex;
use std::time::Duration;

const BACKEND: &str = "redis";
const MAX_IDLE_CONNECTIONS: usize = 8;

/// Lua script deleting `KEYS[1]` only while it still holds `ARGV[1]`.
pub const UNLOCK_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end"#;

/// Lock store talking to a single Redis instance.
pub struct RedisStore {
    client: Client,
    io_timeout: Option<Duration>,
    unlock_script: Script,
    idle: Mutex<Vec<Connection>>,
}

impl RedisStore {
    /// Creates a store for a connection URL such as `redis://127.0.0.1:6379/0`.
    ///
    /// No connection is opened until the first command.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|err| StoreError::connection(BACKEND, err))?;
        Ok(Self {
            client,
            io_timeout: None,
            unlock_script: Script::new(UNLOCK_SCRIPT),
            idle: Mutex::new(Vec::new()),
        })
    }

    /// Applies a connect/read/write timeout to every connection.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout.filter(|value| !value.is_zero());
        self
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    fn checkout(&self) -> Result<Connection, StoreError> {
        if let Ok(mut idle) = self.idle.lock() {
            if let Some(connection) = idle.pop() {
                return Ok(connection);
            }
        }

        trace!("Opening new redis connection");
        let connection = match self.io_timeout {
            Some(timeout) => {
                let connection = self
                    .client
                    .get_connection_with_timeout(timeout)
                    .map_err(|err| StoreError::connection(BACKEND, err))?;
                connection
                    .set_read_timeout(Some(timeout))
                    .map_err(|err| StoreError::connection(BACKEND, err))?;
                connection
                    .set_write_timeout(Some(timeout))
                    .map_err(|err| StoreError::connection(BACKEND, err))?;
                connection
            }
            None => self
                .client
                .get_connection()
                .map_err(|err| StoreError::connection(BACKEND, err))?,
        };
        Ok(connection)
    }

    fn checkin(&self, connection: Connection) {
        if !connection.is_open() {
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < MAX_IDLE_CONNECTIONS {
                idle.push(connection);
            }
        }
    }

    /// Runs `op` on a pooled connection, discarding the connection on error.
    fn with_connection<T>(
        &self,
        command: &'static str,
        op: impl FnOnce(&mut Connection) -> Result<T, RedisError>,
    ) -> Result<T, StoreError> {
        let mut connection = self.checkout()?;
        match op(&mut connection) {
            Ok(value) => {
                self.checkin(connection);
                Ok(value)
            }
            Err(err) => {
                debug!("Dropping redis connection after failed {command}: {err}");
                Err(StoreError::command(BACKEND, command, err))
            }
        }
    }
}

impl LockStore for RedisStore {
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let ttl_ms = ttl_millis(ttl);
        let reply: Value = self.with_connection("SET", |connection| {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query(connection)
        })?;
        parse_set_reply(reply)
    }

    fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let reply: Value = self.with_connection("EVALSHA", |connection| {
            self.unlock_script.key(key).arg(expected).invoke(connection)
        })?;
        parse_unlock_reply(reply)
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn parse_set_reply(reply: Value) -> Result<bool, StoreError> {
    match reply {
        Value::Okay => Ok(true),
        Value::SimpleString(ref status) if status == "OK" => Ok(true),
        Value::Nil => Ok(false),
        other => Err(StoreError::UnexpectedReply {
            backend: BACKEND,
            command: "SET",
            reply: format!("{other:?}"),
        }),
    }
}

fn parse_unlock_reply(reply: Value) -> Result<bool, StoreError> {
    match reply {
        Value::Int(1) => Ok(true),
        Value::Int(0) => Ok(false),
        other => Err(StoreError::UnexpectedReply {
            backend: BACKEND,
            command: "EVALSHA",
            reply: format!("{other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_rounded_up_to_one_millisecond() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(300)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(5)), 5_000);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn set_reply_parsing() {
        assert!(parse_set_reply(Value::Okay).unwrap());
        assert!(parse_set_reply(Value::SimpleString("OK".to_string())).unwrap());
        assert!(!parse_set_reply(Value::Nil).unwrap());
        assert!(matches!(
            parse_set_reply(Value::Int(3)),
            Err(StoreError::UnexpectedReply { command: "SET", .. })
        ));
    }

    #[test]
    fn unlock_reply_parsing() {
        assert!(parse_unlock_reply(Value::Int(1)).unwrap());
        assert!(!parse_unlock_reply(Value::Int(0)).unwrap());
        assert!(parse_unlock_reply(Value::Nil).is_err());
    }

    #[test]
    fn unlock_script_checks_owner_before_delete() {
        let get = UNLOCK_SCRIPT.find(r#"redis.call("get""#).unwrap();
        let del = UNLOCK_SCRIPT.find(r#"redis.call("del""#).unwrap();
        assert!(get < del);
        assert!(UNLOCK_SCRIPT.contains("ARGV[1]"));
    }

    #[test]
    fn open_rejects_malformed_url() {
        let err = RedisStore::open("not a url").err().unwrap();
        assert!(matches!(err, StoreError::Connection { .. }));
    }

    #[test]
    fn zero_io_timeout_means_none() {
        let store = RedisStore::open("redis://127.0.0.1:6379")
            .unwrap()
            .with_io_timeout(Some(Duration::ZERO));
        assert_eq!(store.io_timeout(), None);
    }
}
