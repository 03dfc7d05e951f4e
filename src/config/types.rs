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

//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::hostlist::Separator;

/// Connect/read timeout in seconds when nothing else is configured
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 5;

/// Worker pool size when nothing else is configured
pub const DEFAULT_PARALLEL: usize = 10;

pub const DEFAULT_GROUP_MODIFIER: char = '%';
pub const DEFAULT_FILE_MODIFIER: char = '^';

/// Main configuration structure.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub hostlist: HostlistSettings,

    /// Static groups: name -> member hostnames or patterns
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,

    /// External-command group resolvers
    #[serde(default)]
    pub resolvers: Vec<ResolverConfig>,
}

/// Global default settings.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Defaults {
    pub user: Option<String>,
    pub identity_file: Option<String>,
    /// Seconds
    pub connect_timeout: Option<u64>,
    /// Seconds, 0 for unlimited
    pub command_timeout: Option<u64>,
    pub parallel: Option<usize>,
    /// Path to the OpenSSH client configuration file
    pub ssh_config: Option<String>,
    /// `yes`, `no` or `accept-new`
    pub strict_host_key_checking: Option<String>,
}

/// Host expression settings.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct HostlistSettings {
    #[serde(default)]
    pub separator: Separator,
    pub pattern_limit: Option<usize>,
    pub group_modifier: Option<char>,
    pub file_modifier: Option<char>,
}

/// A group resolver backed by a local command.
///
/// ```yaml
/// resolvers:
///   - modifier: "@"
///     command: "inventory-cli list --group {group}"
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub modifier: char,
    pub command: String,
}
