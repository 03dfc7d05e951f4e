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

//! Remote transport seam used by the executor.
//!
//! The executor only needs to open a session per host, run a command with
//! streamed output, and copy files in either direction. The SSH
//! implementation lives in [`crate::ssh::SshTransport`]; tests plug in
//! scripted transports.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

use super::result_types::{CONNECT_FAILURE, TRANSFER_FAILURE, UNKNOWN_FAILURE};
use crate::ssh::SessionConfig;

/// A chunk of remote output, tagged with its stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    StdOut(Vec<u8>),
    StdErr(Vec<u8>),
}

/// Per-host failure; every variant maps to a result code
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, TCP, handshake, host key or authentication failure
    #[error("{0}")]
    Connect(String),

    /// The file transfer protocol reported an error
    #[error("{0}")]
    Transfer(String),

    /// Local OS error (permissions, disk, missing file)
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Result code recorded for a host that failed with this error.
    ///
    /// Local OS errors use their errno when it does not collide with the
    /// reserved codes.
    pub fn status_code(&self) -> i32 {
        match self {
            TransportError::Connect(_) => CONNECT_FAILURE,
            TransportError::Transfer(_) => TRANSFER_FAILURE,
            TransportError::Io(err) => match err.raw_os_error() {
                Some(errno) if (1..TRANSFER_FAILURE).contains(&errno) => errno,
                _ => UNKNOWN_FAILURE,
            },
            TransportError::Timeout(_) | TransportError::Other(_) => UNKNOWN_FAILURE,
        }
    }
}

/// Opens sessions to remote hosts
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        config: &SessionConfig,
    ) -> Result<Box<dyn RemoteSession>, TransportError>;
}

/// One authenticated connection to one host
#[async_trait]
pub trait RemoteSession: Send {
    /// Run `command`, forwarding output chunks as they arrive.
    ///
    /// Returns the remote exit status once the command has exited and its
    /// output has been drained.
    async fn exec(
        &mut self,
        command: &str,
        output: Sender<CommandOutput>,
    ) -> Result<u32, TransportError>;

    /// Copy a local file or directory to `remote`.
    ///
    /// When `remote` is an existing directory the source keeps its name
    /// inside it.
    async fn put(&mut self, local: &Path, remote: &str) -> Result<(), TransportError>;

    /// Copy a remote file or directory to exactly `local`
    async fn get(&mut self, remote: &str, local: &Path) -> Result<(), TransportError>;

    async fn close(&mut self);
}
