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

//! Core parallel executor implementation.

use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::output_sync::OutputSink;
use super::result_types::{ExecutionResult, ExecutorError, UNKNOWN_FAILURE};
use super::task::{ExecutionTask, Operation};
use super::transport::Transport;
use crate::config::DEFAULT_PARALLEL;
use crate::ssh::SessionConfig;

/// Immutable engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of hosts worked on at once
    pub parallel: usize,
    /// Limit for a whole remote command; `None` is unlimited
    pub command_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_PARALLEL,
            command_timeout: None,
        }
    }
}

/// Runs one operation against a set of hosts.
///
/// Every host yields exactly one [`ExecutionResult`]; per-host failures never
/// escape a task. The only run-level failure is an operator interrupt.
pub struct ParallelExecutor {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn OutputSink>,
    config: ExecutorConfig,
    cancel: CancellationToken,
}

impl ParallelExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn OutputSink>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            transport,
            sink,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `token` for operator interrupts.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run on one host at a time in hostlist order, announcing each host.
    pub async fn run_sequential(
        &self,
        sessions: Vec<SessionConfig>,
        operation: Operation,
    ) -> Result<Vec<ExecutionResult>, ExecutorError> {
        let operation = Arc::new(operation);
        let total = sessions.len();
        let mut results = Vec::with_capacity(total);

        for (index, session) in sessions.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ExecutorError::OperationInterrupted);
            }
            self.sink
                .progress(&format!("{} [{}/{}]", session.hostname, index + 1, total));

            let task = ExecutionTask::new(session, Arc::clone(&operation));
            let result = task
                .run(
                    Arc::clone(&self.transport),
                    Arc::clone(&self.sink),
                    self.config.command_timeout,
                )
                .await;
            results.push(result);
        }

        if self.cancel.is_cancelled() {
            return Err(ExecutorError::OperationInterrupted);
        }
        Ok(results)
    }

    /// Run on all hosts with at most `parallel` in flight.
    ///
    /// Results come back in the order of `sessions`.
    pub async fn run_parallel(
        &self,
        sessions: Vec<SessionConfig>,
        operation: Operation,
    ) -> Result<Vec<ExecutionResult>, ExecutorError> {
        if sessions.is_empty() {
            return Ok(Vec::new());
        }

        let operation = Arc::new(operation);
        let limit = self.config.parallel.max(1).min(sessions.len());
        let semaphore = Arc::new(Semaphore::new(limit));
        tracing::debug!("Running on {} hosts, {} at a time", sessions.len(), limit);

        let hostnames: Vec<String> = sessions.iter().map(|s| s.hostname.clone()).collect();

        let tasks: Vec<_> = sessions
            .into_iter()
            .map(|session| {
                let task = ExecutionTask::new(session, Arc::clone(&operation));
                let transport = Arc::clone(&self.transport);
                let sink = Arc::clone(&self.sink);
                let semaphore = Arc::clone(&semaphore);
                let cancel = self.cancel.clone();
                let command_timeout = self.config.command_timeout;

                tokio::spawn(async move {
                    // Hosts that have not started when the run is interrupted
                    // are abandoned; started ones run to completion.
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return None,
                        permit = semaphore.acquire_owned() => permit.ok()?,
                    };
                    Some(task.run(transport, sink, command_timeout).await)
                })
            })
            .collect();

        let joined = join_all(tasks).await;

        if self.cancel.is_cancelled() {
            return Err(ExecutorError::OperationInterrupted);
        }

        let results = joined
            .into_iter()
            .zip(hostnames)
            .map(|(outcome, hostname)| match outcome {
                Ok(Some(result)) => result,
                Ok(None) => ExecutionResult::new(hostname, UNKNOWN_FAILURE),
                Err(e) => {
                    tracing::error!("Task for {} failed: {}", hostname, e);
                    ExecutionResult::new(hostname, UNKNOWN_FAILURE)
                }
            })
            .collect();

        Ok(results)
    }

    /// Copy `sources` to `destination` on every host.
    pub async fn distribute(
        &self,
        sessions: Vec<SessionConfig>,
        sources: Vec<std::path::PathBuf>,
        destination: String,
    ) -> Result<Vec<ExecutionResult>, ExecutorError> {
        self.run_parallel(
            sessions,
            Operation::Put {
                sources,
                destination,
            },
        )
        .await
    }

    /// Fetch `source` from every host into `destination_dir`.
    ///
    /// The directory is created when missing and must be a directory.
    pub async fn gather(
        &self,
        sessions: Vec<SessionConfig>,
        source: String,
        destination_dir: &Path,
    ) -> Result<Vec<ExecutionResult>, ExecutorError> {
        prepare_destination(destination_dir).await?;
        self.run_parallel(
            sessions,
            Operation::Get {
                source,
                destination_dir: destination_dir.to_path_buf(),
            },
        )
        .await
    }
}

async fn prepare_destination(dir: &Path) -> Result<(), ExecutorError> {
    let invalid = || ExecutorError::InvalidDestination {
        path: dir.display().to_string(),
    };

    if !dir.exists() {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            tracing::error!("Failed to create {}: {}", dir.display(), e);
            invalid()
        })?;
    }
    if !dir.is_dir() {
        return Err(invalid());
    }
    Ok(())
}
