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

//! Configuration loading and derived component settings.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use super::types::{Config, DEFAULT_FILE_MODIFIER, DEFAULT_GROUP_MODIFIER};
use super::utils::expand_tilde;
use crate::hostlist::{
    CommandResolver, ExpanderConfig, HostfileResolver, HostlistError, ResolverRegistry,
    StaticGroupResolver, DEFAULT_PATTERN_LIMIT,
};

impl Config {
    /// Default configuration file location (`~/.config/swk/config.yaml` on Linux).
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "swk")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
            .unwrap_or_else(|| expand_tilde(Path::new("~/.config/swk/config.yaml")))
    }

    /// Load configuration from a file.
    ///
    /// A missing file yields the default configuration.
    pub async fn load(path: &Path) -> Result<Self> {
        // Expand tilde in path
        let expanded_path = expand_tilde(path);

        if !expanded_path.exists() {
            tracing::debug!(
                "Config file not found at {:?}, using defaults",
                expanded_path
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&expanded_path)
            .await
            .with_context(|| format!("Failed to read configuration file at {}. Please check file permissions and ensure the file is accessible.", expanded_path.display()))?;

        Self::parse(&content).with_context(|| {
            format!(
                "Failed to parse YAML configuration file at {}. Please check the YAML syntax is valid.",
                expanded_path.display()
            )
        })
    }

    /// Parse configuration from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Settings for the hostlist expansion engine.
    pub fn expander_config(&self) -> ExpanderConfig {
        ExpanderConfig {
            separator: self.hostlist.separator,
            pattern_limit: self.hostlist.pattern_limit.unwrap_or(DEFAULT_PATTERN_LIMIT),
        }
    }

    /// Build the resolver registry: static groups, host files, and any
    /// configured command resolvers.
    pub fn build_registry(&self) -> Result<ResolverRegistry, HostlistError> {
        let expander = self.expander_config();
        let mut registry = ResolverRegistry::new();

        registry.register(Arc::new(StaticGroupResolver::new(
            self.hostlist.group_modifier.unwrap_or(DEFAULT_GROUP_MODIFIER),
            self.groups.clone(),
            expander.pattern_limit,
        )))?;
        registry.register(Arc::new(HostfileResolver::new(
            self.hostlist.file_modifier.unwrap_or(DEFAULT_FILE_MODIFIER),
        )))?;

        for resolver in &self.resolvers {
            registry.register(Arc::new(CommandResolver::new(
                resolver.modifier,
                resolver.command.clone(),
            )))?;
        }

        Ok(registry)
    }
}
