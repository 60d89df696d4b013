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

pub mod acquisition;
pub mod cancellation;
pub mod context;
pub mod controller;
pub mod handle;
pub mod key;
pub mod locker;
pub mod timeout;
pub mod token;
pub mod wait_observer;

pub use acquisition::{LockAcquisitionRequest, LockTimeoutBudget, PollingBackoff};
pub use cancellation::{CancelCause, CancellationToken, global_token};
pub use context::LockContext;
pub use controller::LockController;
pub use handle::{HandleState, LockHandle};
pub use key::{KEY_SEPARATOR, KeyNamespace, LockKey};
pub use locker::Locker;
pub use timeout::{
    LockTimeoutParseError, LockTimeoutResolution, LockTimeoutResolver, LockTimeoutSource,
    LockTimeoutValue, format_duration, parse_duration, parse_timeout_override,
};
pub use token::LockToken;
pub use wait_observer::{
    LockStatusSink, LockWaitObserver, NoopLockWaitObserver, StatusReporterObserver,
};
