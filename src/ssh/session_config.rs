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

//! Per-host session settings
//!
//! Three layers are merged, lowest precedence first:
//!
//! 1. Built-in and configuration-file defaults
//! 2. The operator's SSH client configuration for that host
//! 3. Explicit overrides from the command line
//!
//! Nothing here can fail: a missing value simply falls through to the
//! layer below.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::known_hosts::StrictHostKeyChecking;
use super::ssh_config::SshConfig;
use crate::config::{expand_tilde, get_current_username, DEFAULT_CONNECT_TIMEOUT};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Lowest-precedence layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDefaults {
    pub username: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub strict_host_key_checking: StrictHostKeyChecking,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            username: None,
            identity_file: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            strict_host_key_checking: StrictHostKeyChecking::default(),
        }
    }
}

/// Highest-precedence layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOverrides {
    pub username: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub strict_host_key_checking: Option<StrictHostKeyChecking>,
}

/// Everything needed to open one host's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Name from the hostlist; used for output prefixes and results
    pub hostname: String,
    /// Connect target (`HostName` from the SSH config, else `hostname`)
    pub address: String,
    pub port: Option<u16>,
    pub username: String,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub strict_host_key_checking: StrictHostKeyChecking,
}

impl SessionConfig {
    /// Merge the three layers for `hostname`
    pub fn resolve(
        hostname: &str,
        defaults: &SessionDefaults,
        ssh_config: &SshConfig,
        overrides: &SessionOverrides,
    ) -> Self {
        let host = ssh_config.find_host_config(hostname);

        let username = overrides
            .username
            .clone()
            .or(host.user)
            .or_else(|| defaults.username.clone())
            .unwrap_or_else(get_current_username);

        let identity_file = overrides
            .identity_file
            .clone()
            .or_else(|| host.identity_files.into_iter().next())
            .or_else(|| defaults.identity_file.clone())
            .map(|path| expand_tilde(&path));

        let connect_timeout = host
            .connect_timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        let strict_host_key_checking = overrides
            .strict_host_key_checking
            .or_else(|| {
                host.strict_host_key_checking
                    .as_deref()
                    .and_then(|value| value.parse().ok())
            })
            .unwrap_or(defaults.strict_host_key_checking);

        Self {
            hostname: hostname.to_string(),
            address: host.hostname.unwrap_or_else(|| hostname.to_string()),
            port: host.port,
            username,
            identity_file,
            connect_timeout,
            strict_host_key_checking,
        }
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }
}

impl fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}",
            self.username,
            self.address,
            self.port_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_config() -> SshConfig {
        SshConfig::parse(
            r#"
Host db*
    HostName %h.internal
    User dbadmin
    Port 2222
    IdentityFile /keys/db
    IdentityFile /keys/other
    ConnectTimeout 9
    StrictHostKeyChecking no
"#,
        )
    }

    #[test]
    fn test_defaults_only() {
        let defaults = SessionDefaults {
            username: Some("ops".to_string()),
            identity_file: Some(PathBuf::from("/keys/default")),
            connect_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let session = SessionConfig::resolve(
            "web1",
            &defaults,
            &ssh_config(),
            &SessionOverrides::default(),
        );
        assert_eq!(session.hostname, "web1");
        assert_eq!(session.address, "web1");
        assert_eq!(session.username, "ops");
        assert_eq!(session.port, None);
        assert_eq!(session.port_or_default(), 22);
        assert_eq!(session.identity_file, Some(PathBuf::from("/keys/default")));
        assert_eq!(session.connect_timeout, Duration::from_secs(5));
        assert_eq!(
            session.strict_host_key_checking,
            StrictHostKeyChecking::AcceptNew
        );
    }

    #[test]
    fn test_ssh_config_overrides_defaults() {
        let defaults = SessionDefaults {
            username: Some("ops".to_string()),
            ..Default::default()
        };
        let session = SessionConfig::resolve(
            "db1",
            &defaults,
            &ssh_config(),
            &SessionOverrides::default(),
        );
        assert_eq!(session.hostname, "db1");
        assert_eq!(session.address, "db1.internal");
        assert_eq!(session.username, "dbadmin");
        assert_eq!(session.port, Some(2222));
        assert_eq!(session.identity_file, Some(PathBuf::from("/keys/db")));
        assert_eq!(session.connect_timeout, Duration::from_secs(9));
        assert_eq!(session.strict_host_key_checking, StrictHostKeyChecking::No);
        assert_eq!(session.to_string(), "dbadmin@db1.internal:2222");
    }

    #[test]
    fn test_explicit_overrides_win() {
        let overrides = SessionOverrides {
            username: Some("root".to_string()),
            identity_file: Some(PathBuf::from("/keys/cli")),
            ..Default::default()
        };
        let session = SessionConfig::resolve(
            "db1",
            &SessionDefaults::default(),
            &ssh_config(),
            &overrides,
        );
        assert_eq!(session.username, "root");
        assert_eq!(session.identity_file, Some(PathBuf::from("/keys/cli")));
        assert_eq!(session.port, Some(2222));
    }
}
