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

//! Per-host task: one session, one operation, one result.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::line_buffer::LineBuffer;
use super::output_sync::{OutputSink, OutputStream};
use super::result_types::ExecutionResult;
use super::transport::{CommandOutput, RemoteSession, Transport, TransportError};
use crate::ssh::SessionConfig;

/// Capacity of the per-host output channel
const OUTPUT_CHANNEL_SIZE: usize = 1000;

/// Upper bound for one host's transfer when no command timeout is set
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// What to do on every host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Run a remote command
    Exec { command: String },
    /// Copy local files or directories to a remote path
    Put {
        sources: Vec<PathBuf>,
        destination: String,
    },
    /// Copy a remote file or directory into a local directory as
    /// `<basename>_<hostname>`
    Get {
        source: String,
        destination_dir: PathBuf,
    },
}

impl Operation {
    pub fn is_transfer(&self) -> bool {
        !matches!(self, Operation::Exec { .. })
    }

    /// Local path a gathered artifact from `hostname` is stored at
    pub fn gather_target(source: &str, destination_dir: &Path, hostname: &str) -> PathBuf {
        let trimmed = source.trim_end_matches('/');
        let basename = Path::new(trimmed)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        destination_dir.join(format!("{basename}_{hostname}"))
    }
}

/// Lifecycle of one host's session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Connecting,
    Connected,
    ConnectFailed,
    Running,
    Streaming,
    Completed,
    Terminal,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Pending => "PENDING",
            SessionState::Connecting => "CONNECTING",
            SessionState::Connected => "CONNECTED",
            SessionState::ConnectFailed => "CONNECT_FAILED",
            SessionState::Running => "RUNNING",
            SessionState::Streaming => "STREAMING",
            SessionState::Completed => "COMPLETED",
            SessionState::Terminal => "TERMINAL",
        };
        f.write_str(name)
    }
}

struct StateTracker<'a> {
    hostname: &'a str,
    state: SessionState,
}

impl<'a> StateTracker<'a> {
    fn new(hostname: &'a str) -> Self {
        Self {
            hostname,
            state: SessionState::Pending,
        }
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!("[{}] {} -> {}", self.hostname, self.state, next);
        self.state = next;
    }
}

/// Everything one host needs; created fresh per invocation
#[derive(Debug, Clone)]
pub struct ExecutionTask {
    pub session: SessionConfig,
    pub operation: Arc<Operation>,
}

impl ExecutionTask {
    pub fn new(session: SessionConfig, operation: Arc<Operation>) -> Self {
        Self { session, operation }
    }

    /// Run to completion, converting every failure into a result code.
    pub async fn run(
        self,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn OutputSink>,
        command_timeout: Option<Duration>,
    ) -> ExecutionResult {
        let hostname = self.session.hostname.clone();
        let mut state = StateTracker::new(&hostname);

        state.advance(SessionState::Connecting);
        let connect_timeout = self.session.connect_timeout;
        let connected = match tokio::time::timeout(connect_timeout, transport.connect(&self.session))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Connect(format!(
                "connection timed out after {}s",
                connect_timeout.as_secs()
            ))),
        };

        let mut session = match connected {
            Ok(session) => session,
            Err(e) => {
                state.advance(SessionState::ConnectFailed);
                return fail(&hostname, &*sink, &mut state, e);
            }
        };

        state.advance(SessionState::Connected);
        state.advance(SessionState::Running);

        let outcome = match &*self.operation {
            Operation::Exec { command } => {
                let run = execute_streaming(
                    &mut *session,
                    &hostname,
                    command,
                    &*sink,
                    &mut state,
                );
                match command_timeout {
                    Some(limit) => with_timeout(limit, run).await,
                    None => run.await,
                }
            }
            Operation::Put {
                sources,
                destination,
            } => {
                let limit = command_timeout.unwrap_or(DEFAULT_TRANSFER_TIMEOUT);
                with_timeout(limit, put_all(&mut *session, sources, destination)).await
            }
            Operation::Get {
                source,
                destination_dir,
            } => {
                let target = Operation::gather_target(source, destination_dir, &hostname);
                let limit = command_timeout.unwrap_or(DEFAULT_TRANSFER_TIMEOUT);
                with_timeout(limit, async { session.get(source, &target).await.map(|()| 0) })
                    .await
            }
        };

        session.close().await;

        match outcome {
            Ok(code) => {
                state.advance(SessionState::Completed);
                if self.operation.is_transfer() {
                    sink.host_line(&hostname, OutputStream::Stdout, "done");
                }
                state.advance(SessionState::Terminal);
                ExecutionResult::new(hostname.clone(), code)
            }
            Err(e) => fail(&hostname, &*sink, &mut state, e),
        }
    }
}

fn fail(
    hostname: &str,
    sink: &dyn OutputSink,
    state: &mut StateTracker<'_>,
    error: TransportError,
) -> ExecutionResult {
    let code = error.status_code();
    tracing::error!("[{}] failed with {}: {}", hostname, code, error);
    sink.host_line(hostname, OutputStream::Stderr, &error.to_string());
    state.advance(SessionState::Terminal);
    ExecutionResult::new(hostname, code)
}

async fn with_timeout<F>(limit: Duration, operation: F) -> Result<i32, TransportError>
where
    F: std::future::Future<Output = Result<i32, TransportError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

async fn put_all(
    session: &mut dyn RemoteSession,
    sources: &[PathBuf],
    destination: &str,
) -> Result<i32, TransportError> {
    for source in sources {
        session.put(source, destination).await?;
    }
    Ok(0)
}

/// Run a command while turning its output into prefixed lines.
async fn execute_streaming(
    session: &mut dyn RemoteSession,
    hostname: &str,
    command: &str,
    sink: &dyn OutputSink,
    state: &mut StateTracker<'_>,
) -> Result<i32, TransportError> {
    let (tx, mut rx) = mpsc::channel(OUTPUT_CHANNEL_SIZE);
    let mut stdout = LineBuffer::new();
    let mut stderr = LineBuffer::new();

    let exec = session.exec(command, tx);
    tokio::pin!(exec);

    let mut exit_status = None;
    let mut streaming = false;

    // Until exec returns and the channel is drained
    loop {
        tokio::select! {
            result = &mut exec, if exit_status.is_none() => {
                exit_status = Some(result);
            }
            chunk = rx.recv() => match chunk {
                Some(output) => {
                    if !streaming {
                        state.advance(SessionState::Streaming);
                        streaming = true;
                    }
                    let (buffer, stream, data) = match output {
                        CommandOutput::StdOut(data) => (&mut stdout, OutputStream::Stdout, data),
                        CommandOutput::StdErr(data) => (&mut stderr, OutputStream::Stderr, data),
                    };
                    for line in buffer.push(&data) {
                        sink.host_line(hostname, stream, &line);
                    }
                }
                None => break,
            },
        }
    }

    if let Some(line) = stdout.finish() {
        sink.host_line(hostname, OutputStream::Stdout, &line);
    }
    if let Some(line) = stderr.finish() {
        sink.host_line(hostname, OutputStream::Stderr, &line);
    }

    match exit_status {
        Some(result) => result.map(|status| status as i32),
        None => exec.await.map(|status| status as i32),
    }
}
