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

use std::fmt;

/// Separator placed between the namespace prefix and the caller's key.
pub const KEY_SEPARATOR: &str = ":";

/// Fully qualified key of a lock record in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey(String);

impl LockKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Prefix that keeps independent lock domains apart inside one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Builds the store key for `key`: `prefix:key`, or `key` when unprefixed.
    pub fn qualify(&self, key: &str) -> LockKey {
        if self.prefix.is_empty() {
            return LockKey(key.to_string());
        }
        LockKey(format!("{}{KEY_SEPARATOR}{key}", self.prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prefix_keeps_key_bare() {
        let namespace = KeyNamespace::default();
        assert_eq!(namespace.qualify("orders").as_str(), "orders");
    }

    #[test]
    fn prefix_is_joined_with_colon() {
        let namespace = KeyNamespace::new("billing");
        assert_eq!(namespace.qualify("invoice-42").as_str(), "billing:invoice-42");
    }

    #[test]
    fn qualify_is_deterministic() {
        let namespace = KeyNamespace::new("svc");
        assert_eq!(namespace.qualify("a:b"), namespace.qualify("a:b"));
        assert_eq!(namespace.qualify("a:b").to_string(), "svc:a:b");
    }
}
