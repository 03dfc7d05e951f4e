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

//! Parallel execution framework for remote operations.

mod line_buffer;
mod parallel;
mod result_types;
mod summary;
mod task;

pub mod output_sync;
pub mod transport;

// Re-export public types
pub use line_buffer::LineBuffer;
pub use output_sync::{ConsoleSink, MemorySink, OutputSink, OutputStream};
pub use parallel::{ExecutorConfig, ParallelExecutor};
pub use result_types::{
    ExecutionResult, ExecutorError, CONNECT_FAILURE, TRANSFER_FAILURE, UNKNOWN_FAILURE,
};
pub use summary::ResultSummary;
pub use task::{ExecutionTask, Operation, SessionState, DEFAULT_TRANSFER_TIMEOUT};
pub use transport::{CommandOutput, RemoteSession, Transport, TransportError};
