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

use std::io;
use thiserror::Error;

/// Errors raised by the SSH client
#[derive(Debug, Error)]
pub enum Error {
    #[error("Address could not be resolved: {0}")]
    AddressInvalid(io::Error),

    #[error("Host key verification failed")]
    ServerCheckFailed,

    #[error("Host key for {0} has changed (known_hosts line {1})")]
    ServerKeyChanged(String, usize),

    #[error("Failed to load private key: {0}")]
    KeyInvalid(russh::keys::Error),

    #[error("Public key authentication failed")]
    KeyAuthFailed,

    #[error("Failed to connect to SSH agent")]
    AgentConnectionFailed,

    #[error("SSH agent has no identities")]
    AgentNoIdentities,

    #[error("SSH agent authentication failed")]
    AgentAuthenticationFailed,

    #[error("No authentication method available")]
    NoAuthMethod,

    #[error("Remote command did not report an exit status")]
    CommandDidntExit,

    #[error("SSH error: {0}")]
    SshError(#[from] russh::Error),

    #[error("SFTP error: {0}")]
    SftpError(#[from] russh_sftp::client::error::Error),

    #[error(transparent)]
    IoError(#[from] io::Error),
}

