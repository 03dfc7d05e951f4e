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

//! [`Transport`] implementation over SSH and SFTP.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

use super::known_hosts::get_check_method;
use super::session_config::SessionConfig;
use super::tokio_client::{default_auth_methods, Client, Config, Error};
use crate::executor::{CommandOutput, RemoteSession, Transport, TransportError};

/// Opens real SSH sessions
#[derive(Debug, Default, Clone)]
pub struct SshTransport;

impl SshTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn connect(
        &self,
        config: &SessionConfig,
    ) -> Result<Box<dyn RemoteSession>, TransportError> {
        tracing::debug!("Connecting to {} as {}", config.hostname, config);

        let auth = default_auth_methods(config.identity_file.as_deref());
        let server_check = get_check_method(config.strict_host_key_checking);
        let client = Client::connect_with_config(
            &config.address,
            config.port_or_default(),
            &config.username,
            &auth,
            server_check,
            Config::default(),
        )
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Box::new(SshSession {
            client,
            drain_timeout: config.connect_timeout,
        }))
    }
}

struct SshSession {
    client: Client,
    drain_timeout: Duration,
}

fn transfer_error(error: Error) -> TransportError {
    match error {
        Error::IoError(e) => TransportError::Io(e),
        other => TransportError::Transfer(other.to_string()),
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(
        &mut self,
        command: &str,
        output: Sender<CommandOutput>,
    ) -> Result<u32, TransportError> {
        self.client
            .execute_streaming(command, output, self.drain_timeout)
            .await
            .map_err(|e| match e {
                Error::IoError(e) => TransportError::Io(e),
                other => TransportError::Other(other.to_string()),
            })
    }

    async fn put(&mut self, local: &Path, remote: &str) -> Result<(), TransportError> {
        self.client.upload(local, remote).await.map_err(transfer_error)
    }

    async fn get(&mut self, remote: &str, local: &Path) -> Result<(), TransportError> {
        self.client
            .download(remote, local)
            .await
            .map_err(transfer_error)
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(
                "Disconnect from {} failed: {}",
                self.client.get_connection_address(),
                e
            );
        }
    }
}
