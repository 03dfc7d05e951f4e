// Copyright 2025 Lablup Inc. and Jeongkyu Shin
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

//! Result types for parallel execution operations.
//!
//! A result code is either the remote process exit status or one of the
//! reserved local codes below. A remote command that itself exits with a
//! reserved value is indistinguishable from the local failure.

use thiserror::Error;

/// Could not connect, negotiate or authenticate
pub const CONNECT_FAILURE: i32 = 254;

/// File transfer protocol error
pub const TRANSFER_FAILURE: i32 = 253;

/// Any other local failure (timeouts, panics, unclassified errors)
pub const UNKNOWN_FAILURE: i32 = 255;

/// Outcome for one host; produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub hostname: String,
    pub status_code: i32,
}

impl ExecutionResult {
    pub fn new(hostname: impl Into<String>, status_code: i32) -> Self {
        Self {
            hostname: hostname.into(),
            status_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }
}

/// Run-level failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// The operator interrupted the run; collected results were discarded
    #[error("Operation interrupted")]
    OperationInterrupted,

    /// The local destination for a gather is unusable
    #[error("destination '{path}' is not a directory")]
    InvalidDestination { path: String },
}
