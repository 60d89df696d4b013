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

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a [`LockStore`](super::LockStore) implementation.
///
/// These are communication or backend faults. Contention and ownership
/// mismatches are regular `false` results, never a `StoreError`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to connect to {backend} store: {source}")]
    Connection {
        backend: &'static str,
        #[source]
        source: BoxedSource,
    },

    #[error("{backend} store command '{command}' failed: {source}")]
    Command {
        backend: &'static str,
        command: &'static str,
        #[source]
        source: BoxedSource,
    },

    #[error("{backend} store returned an unexpected reply to '{command}': {reply}")]
    UnexpectedReply {
        backend: &'static str,
        command: &'static str,
        reply: String,
    },

    #[error("{backend} store error: {details}")]
    Backend {
        backend: &'static str,
        details: String,
    },
}

impl StoreError {
    pub fn connection<E>(backend: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            backend,
            source: Box::new(source),
        }
    }

    pub fn command<E>(backend: &'static str, command: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Command {
            backend,
            command,
            source: Box::new(source),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            StoreError::Connection { backend, .. }
            | StoreError::Command { backend, .. }
            | StoreError::UnexpectedReply { backend, .. }
            | StoreError::Backend { backend, .. } => backend,
        }
    }
}
