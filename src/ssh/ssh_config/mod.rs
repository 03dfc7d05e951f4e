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

//! SSH client configuration parsing and lookup
//!
//! Reads the operator's OpenSSH client configuration (`~/.ssh/config` by
//! default) and answers per-host queries for `HostName`, `User`, `Port`,
//! `IdentityFile`, `StrictHostKeyChecking` and `ConnectTimeout`. The file is
//! only ever read.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

mod parser;
mod pattern;
mod resolver;
mod types;

// Re-export public types
pub use types::SshHostConfig;

/// SSH configuration parser and resolver
#[derive(Debug, Clone, Default)]
pub struct SshConfig {
    pub hosts: Vec<SshHostConfig>,
}

impl SshConfig {
    /// Create a new empty SSH configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Default user configuration path (`~/.ssh/config`)
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh").join("config"))
    }

    /// Load SSH configuration from a file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read SSH config file: {}", path.display()))?;

        Ok(Self::parse(&content))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file yields an empty configuration.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::new());
        };
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!("SSH config not found at {:?}", path);
            return Ok(Self::new());
        }
        Self::load_from_file(&path).await
    }

    /// Parse SSH configuration from a string.
    ///
    /// Lines that cannot be understood are logged and skipped.
    pub fn parse(content: &str) -> Self {
        Self {
            hosts: parser::parse(content),
        }
    }

    /// Find configuration for a specific hostname
    pub fn find_host_config(&self, hostname: &str) -> SshHostConfig {
        resolver::find_host_config(&self.hosts, hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_basic_host_config() {
        let config_content = r#"
Host example.com
    User testuser
    Port 2222
    IdentityFile ~/.ssh/test_key
"#;

        let config = SshConfig::parse(config_content);
        let host = config.find_host_config("example.com");
        assert_eq!(host.user, Some("testuser".to_string()));
        assert_eq!(host.port, Some(2222));
        assert_eq!(host.identity_files.len(), 1);
    }

    #[test]
    fn test_first_obtained_value_wins() {
        let config_content = r#"
Host web1.example.com
    Port 9090

Host web*.example.com
    User webuser
    Port 8080

Host *.example.com
    User defaultuser
    Port 22
"#;

        let config = SshConfig::parse(config_content);

        let host_config = config.find_host_config("web1.example.com");
        assert_eq!(host_config.user, Some("webuser".to_string()));
        assert_eq!(host_config.port, Some(9090));

        let host_config = config.find_host_config("web2.example.com");
        assert_eq!(host_config.user, Some("webuser".to_string()));
        assert_eq!(host_config.port, Some(8080));

        let host_config = config.find_host_config("db1.example.com");
        assert_eq!(host_config.user, Some("defaultuser".to_string()));
        assert_eq!(host_config.port, Some(22));

        let host_config = config.find_host_config("other.org");
        assert_eq!(host_config, SshHostConfig::default());
    }

    #[test]
    fn test_hostname_token_substitution() {
        let config = SshConfig::parse("Host *\n  HostName %h.internal\n");
        assert_eq!(
            config.find_host_config("db1").hostname.as_deref(),
            Some("db1.internal")
        );
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("ssh_config");

        let config_content = r#"
Host test.example.com
    User testuser
    Port 2222
"#;

        std::fs::write(&config_file, config_content).unwrap();

        let config = tokio_test::block_on(SshConfig::load_from_file(&config_file)).unwrap();
        let host = config.find_host_config("test.example.com");
        assert_eq!(host.user, Some("testuser".to_string()));
        assert_eq!(host.port, Some(2222));
    }

    #[tokio::test]
    async fn test_load_tolerates_bad_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("ssh_config");
        std::fs::write(
            &config_file,
            "Host *\n  ConnectTimeout 5s\n  Port none\n  User ops\n",
        )
        .unwrap();

        let config = SshConfig::load_or_default(Some(&config_file)).await.unwrap();
        let host = config.find_host_config("web1");
        assert_eq!(host.user.as_deref(), Some("ops"));
        assert_eq!(host.connect_timeout, None);
        assert_eq!(host.port, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        // A directory exists but cannot be read as a file
        assert!(SshConfig::load_or_default(Some(temp_dir.path()))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let config = SshConfig::load_or_default(Some(&temp_dir.path().join("nope")))
            .await
            .unwrap();
        assert_eq!(config.find_host_config("any"), SshHostConfig::default());
    }
}
