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

//! Configuration tests.

use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::types::Config;
use super::utils::{expand_tilde, get_current_username};
use crate::hostlist::{HostlistError, HostlistExpander, Separator};

#[test]
#[serial]
fn test_expand_tilde() {
    // Save original HOME value
    let original_home = std::env::var("HOME").ok();

    // Set test HOME value
    std::env::set_var("HOME", "/home/user");

    let expanded = expand_tilde(Path::new("~/.ssh/config"));
    let bare = expand_tilde(Path::new("~"));
    let untouched = expand_tilde(Path::new("/etc/~x"));

    // Restore original HOME value
    if let Some(home) = original_home {
        std::env::set_var("HOME", home);
    } else {
        std::env::remove_var("HOME");
    }

    assert_eq!(expanded, PathBuf::from("/home/user/.ssh/config"));
    assert_eq!(bare, PathBuf::from("/home/user"));
    assert_eq!(untouched, PathBuf::from("/etc/~x"));
}

#[test]
#[serial]
fn test_current_username_fallback() {
    let original_user = std::env::var("USER").ok();
    let original_username = std::env::var("USERNAME").ok();

    std::env::set_var("USER", "alice");
    assert_eq!(get_current_username(), "alice");

    std::env::remove_var("USER");
    std::env::remove_var("USERNAME");
    assert_eq!(get_current_username(), "root");

    if let Some(user) = original_user {
        std::env::set_var("USER", user);
    }
    if let Some(username) = original_username {
        std::env::set_var("USERNAME", username);
    }
}

#[test]
fn test_config_parsing() {
    let yaml = r#"
defaults:
  user: admin
  identity_file: ~/.ssh/id_ed25519
  connect_timeout: 3
  parallel: 32

hostlist:
  separator: comma
  pattern_limit: 50

groups:
  web:
    - web[1-3]
  db:
    - db1
    - db2

resolvers:
  - modifier: "@"
    command: "echo {group}"
"#;

    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.defaults.user.as_deref(), Some("admin"));
    assert_eq!(config.defaults.connect_timeout, Some(3));
    assert_eq!(config.defaults.parallel, Some(32));
    assert_eq!(config.hostlist.separator, Separator::Comma);
    assert_eq!(config.groups["db"], vec!["db1", "db2"]);
    assert_eq!(config.resolvers[0].modifier, '@');

    let expander_config = config.expander_config();
    assert_eq!(expander_config.pattern_limit, 50);
    assert_eq!(expander_config.separator, Separator::Comma);
}

#[test]
fn test_empty_config_defaults() {
    let config = Config::parse("{}").unwrap();
    assert!(config.groups.is_empty());
    assert_eq!(config.hostlist.separator, Separator::Whitespace);
    assert_eq!(config.expander_config().pattern_limit, 1000);
}

#[tokio::test]
async fn test_registry_from_config() {
    let yaml = r#"
groups:
  web: ["web[1-2]"]
resolvers:
  - modifier: "@"
    command: "echo {group}-x"
"#;
    let config = Config::parse(yaml).unwrap();
    let registry = config.build_registry().unwrap();
    assert_eq!(registry.modifiers(), vec!['%', '@', '^']);

    let expander = HostlistExpander::new(config.expander_config(), registry);
    let hosts = expander.expand("%web @db").await.unwrap();
    assert_eq!(hosts, vec!["db-x", "web1", "web2"]);
}

#[test]
fn test_registry_rejects_clashing_modifier() {
    let yaml = r#"
resolvers:
  - modifier: "%"
    command: "echo {group}"
"#;
    let config = Config::parse(yaml).unwrap();
    assert!(matches!(
        config.build_registry(),
        Err(HostlistError::DuplicateModifier { modifier: '%' })
    ));
}

#[tokio::test]
async fn test_load_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::load(&temp_dir.path().join("absent.yaml"))
        .await
        .unwrap();
    assert!(config.defaults.user.is_none());
}

#[tokio::test]
async fn test_load_invalid_yaml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(&path, "defaults: [unclosed").unwrap();

    let err = Config::load(&path).await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse YAML"));
}
