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

//! SSH channel operations: opening channels and executing commands.

use russh::client::Msg;
use russh::Channel;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

use super::connection::Client;
use crate::executor::CommandOutput;

impl Client {
    /// Get a new SSH channel for communication.
    pub async fn get_channel(&self) -> Result<Channel<Msg>, super::Error> {
        self.connection_handle
            .channel_open_session()
            .await
            .map_err(super::Error::SshError)
    }

    /// Execute a remote command, forwarding output chunks to `sender` as
    /// they arrive.
    ///
    /// The exit status may arrive before the last data message, so reading
    /// continues until the channel closes. Once the status is known each
    /// further read is bounded by `drain_timeout`.
    pub async fn execute_streaming(
        &self,
        command: &str,
        sender: Sender<CommandOutput>,
        drain_timeout: Duration,
    ) -> Result<u32, super::Error> {
        let mut channel = self.connection_handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut result: Option<u32> = None;

        loop {
            let msg = match result {
                None => channel.wait().await,
                Some(_) => match tokio::time::timeout(drain_timeout, channel.wait()).await {
                    Ok(msg) => msg,
                    Err(_) => {
                        tracing::debug!("Channel did not close after exit status, stop draining");
                        break;
                    }
                },
            };
            let Some(msg) = msg else {
                break;
            };

            match msg {
                russh::ChannelMsg::Data { ref data } => {
                    // Receiver gone means nobody is listening any more
                    if sender.send(CommandOutput::StdOut(data.to_vec())).await.is_err() {
                        tracing::debug!("Output receiver dropped");
                    }
                }
                russh::ChannelMsg::ExtendedData { ref data, ext } => {
                    if ext == 1
                        && sender
                            .send(CommandOutput::StdErr(data.to_vec()))
                            .await
                            .is_err()
                    {
                        tracing::debug!("Output receiver dropped");
                    }
                }

                // Don't assume this message means end of communications,
                // the data might not be finished yet.
                russh::ChannelMsg::ExitStatus { exit_status } => result = Some(exit_status),

                // Terminated by a signal; report it like a shell would
                russh::ChannelMsg::ExitSignal { signal_name, .. } => {
                    tracing::debug!("Remote command killed by signal {:?}", signal_name);
                    result.get_or_insert(255);
                }

                _ => {}
            }
        }

        result.ok_or(super::Error::CommandDidntExit)
    }
}
