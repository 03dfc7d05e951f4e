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

//! SSH authentication methods and server verification.
//!
//! Sessions are non-interactive, so only key based methods exist:
//! - Private key file
//! - SSH agent
//!
//! Methods are tried in order until one succeeds.

use russh::client::{Handle, Handler};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::expand_tilde;

/// Keys tried when neither an identity file nor an agent is available
const DEFAULT_KEY_FILES: [&str; 3] = ["~/.ssh/id_ed25519", "~/.ssh/id_ecdsa", "~/.ssh/id_rsa"];

/// An authentification token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    PrivateKeyFile { key_file_path: PathBuf },
    #[cfg(not(target_os = "windows"))]
    Agent,
}

impl AuthMethod {
    pub fn with_key_file<T: AsRef<Path>>(key_file_path: T) -> Self {
        Self::PrivateKeyFile {
            key_file_path: key_file_path.as_ref().to_path_buf(),
        }
    }

    /// Creates a new SSH agent authentication method.
    ///
    /// The SSH agent must be running and the SSH_AUTH_SOCK environment
    /// variable must be set.
    #[cfg(not(target_os = "windows"))]
    pub fn with_agent() -> Self {
        Self::Agent
    }
}

/// Ordered methods for a session: the identity file when one is configured,
/// then the agent when `SSH_AUTH_SOCK` is set, then the default key files
/// that exist.
pub fn default_auth_methods(identity_file: Option<&Path>) -> Vec<AuthMethod> {
    let mut methods = Vec::new();

    if let Some(path) = identity_file {
        methods.push(AuthMethod::with_key_file(expand_tilde(path)));
    }

    #[cfg(not(target_os = "windows"))]
    if std::env::var_os("SSH_AUTH_SOCK").is_some() {
        methods.push(AuthMethod::with_agent());
    }

    for key in DEFAULT_KEY_FILES {
        let path = expand_tilde(Path::new(key));
        if path.exists() && identity_file.map(expand_tilde).as_deref() != Some(path.as_path()) {
            methods.push(AuthMethod::with_key_file(path));
        }
    }

    methods
}

/// Server host key verification methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerCheckMethod {
    /// No verification - accept any host key
    NoCheck,
    /// Use default known_hosts file (~/.ssh/known_hosts); unknown keys fail
    DefaultKnownHostsFile,
    /// Like `DefaultKnownHostsFile`, but unknown keys are learned
    AcceptNew,
}

/// Try `methods` in order until one authenticates.
pub(super) async fn authenticate<H: Handler>(
    handle: &mut Handle<H>,
    username: &str,
    methods: &[AuthMethod],
) -> Result<(), super::Error> {
    let mut last_error = super::Error::NoAuthMethod;

    for method in methods {
        match authenticate_with(handle, username, method).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::debug!("Authentication with {:?} failed: {}", method, e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}

async fn authenticate_with<H: Handler>(
    handle: &mut Handle<H>,
    username: &str,
    method: &AuthMethod,
) -> Result<(), super::Error> {
    match method {
        AuthMethod::PrivateKeyFile { key_file_path } => {
            let cprivk = russh::keys::load_secret_key(key_file_path, None)
                .map_err(super::Error::KeyInvalid)?;
            let is_authentificated = handle
                .authenticate_publickey(
                    username,
                    russh::keys::PrivateKeyWithHashAlg::new(
                        Arc::new(cprivk),
                        handle.best_supported_rsa_hash().await?.flatten(),
                    ),
                )
                .await?;
            if !is_authentificated.success() {
                return Err(super::Error::KeyAuthFailed);
            }
        }
        #[cfg(not(target_os = "windows"))]
        AuthMethod::Agent => {
            let mut agent = russh::keys::agent::client::AgentClient::connect_env()
                .await
                .map_err(|_| super::Error::AgentConnectionFailed)?;

            let identities = agent
                .request_identities()
                .await
                .map_err(|_| super::Error::AgentConnectionFailed)?;

            if identities.is_empty() {
                return Err(super::Error::AgentNoIdentities);
            }

            let mut auth_success = false;
            for identity in identities {
                let result = handle
                    .authenticate_publickey_with(
                        username,
                        identity.clone(),
                        handle.best_supported_rsa_hash().await?.flatten(),
                        &mut agent,
                    )
                    .await;

                if let Ok(auth_result) = result {
                    if auth_result.success() {
                        auth_success = true;
                        break;
                    }
                }
            }

            if !auth_success {
                return Err(super::Error::AgentAuthenticationFailed);
            }
        }
    };
    Ok(())
}
