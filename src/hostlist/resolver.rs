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

//! Group resolvers and the modifier registry
//!
//! A group resolver maps a group name to its member hostnames. Resolvers are
//! registered under a single modifier character and looked up by key when
//! a token such as `%web` is expanded.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;

use super::error::HostlistError;
use super::pattern::{expand_pattern, is_pattern_start};
use crate::config::expand_tilde;

/// Maximum hostfile size accepted by [`HostfileResolver`]
const MAX_HOSTFILE_SIZE: u64 = 1024 * 1024;

/// Capability consumed by the expansion engine
#[async_trait]
pub trait GroupResolver: Send + Sync {
    /// Modifier character this resolver is registered under
    fn modifier(&self) -> char;

    /// Resolve a group name into member hostnames.
    ///
    /// An unknown group is reported as an empty list; the engine decides
    /// whether that is an error.
    async fn resolve(&self, group: &str) -> Result<Vec<String>, HostlistError>;
}

/// Registry mapping modifier characters to resolvers
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<char, Arc<dyn GroupResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver under its modifier.
    ///
    /// Fails if the modifier is already taken or could be confused with a
    /// hostname, a pattern or the negation prefix.
    pub fn register(&mut self, resolver: Arc<dyn GroupResolver>) -> Result<(), HostlistError> {
        let modifier = resolver.modifier();
        let reserved = matches!(modifier, '-' | ',') || modifier.is_whitespace();
        if reserved || is_pattern_start(modifier) {
            return Err(HostlistError::InvalidModifier { modifier });
        }
        if self.resolvers.contains_key(&modifier) {
            return Err(HostlistError::DuplicateModifier { modifier });
        }
        tracing::debug!("Registered group resolver for modifier '{}'", modifier);
        self.resolvers.insert(modifier, resolver);
        Ok(())
    }

    pub fn get(&self, modifier: char) -> Option<&Arc<dyn GroupResolver>> {
        self.resolvers.get(&modifier)
    }

    /// Registered modifiers, sorted
    pub fn modifiers(&self) -> Vec<char> {
        let mut modifiers: Vec<char> = self.resolvers.keys().copied().collect();
        modifiers.sort_unstable();
        modifiers
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("modifiers", &self.modifiers())
            .finish()
    }
}

/// Groups declared in the configuration file
///
/// Members may themselves be patterns (`web[1-4]`).
#[derive(Debug, Clone)]
pub struct StaticGroupResolver {
    modifier: char,
    groups: HashMap<String, Vec<String>>,
    pattern_limit: usize,
}

impl StaticGroupResolver {
    pub fn new(modifier: char, groups: HashMap<String, Vec<String>>, pattern_limit: usize) -> Self {
        Self {
            modifier,
            groups,
            pattern_limit,
        }
    }
}

#[async_trait]
impl GroupResolver for StaticGroupResolver {
    fn modifier(&self) -> char {
        self.modifier
    }

    async fn resolve(&self, group: &str) -> Result<Vec<String>, HostlistError> {
        let Some(members) = self.groups.get(group) else {
            tracing::debug!("Group '{}' is not defined", group);
            return Ok(Vec::new());
        };

        let mut hosts = Vec::new();
        for member in members {
            for host in expand_pattern(member.trim(), self.pattern_limit)? {
                if !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
        }
        Ok(hosts)
    }
}

/// Reads hostnames from a file, one per line (`^/path/to/hosts`)
///
/// Blank lines and `#` comments are skipped.
#[derive(Debug, Clone)]
pub struct HostfileResolver {
    modifier: char,
}

impl HostfileResolver {
    pub fn new(modifier: char) -> Self {
        Self { modifier }
    }

    fn read_error(&self, group: &str, reason: impl ToString) -> HostlistError {
        HostlistError::Resolver {
            modifier: self.modifier,
            group: group.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl GroupResolver for HostfileResolver {
    fn modifier(&self) -> char {
        self.modifier
    }

    async fn resolve(&self, group: &str) -> Result<Vec<String>, HostlistError> {
        let path = expand_tilde(Path::new(group));

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| self.read_error(group, e))?;
        if metadata.len() > MAX_HOSTFILE_SIZE {
            return Err(self.read_error(
                group,
                format!(
                    "file size {} bytes exceeds maximum allowed size of {MAX_HOSTFILE_SIZE} bytes",
                    metadata.len()
                ),
            ));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| self.read_error(group, e))?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect())
    }
}

/// Runs a local command to list a group's members
///
/// `{group}` in the command template is replaced with the group name and
/// the result is run through `sh -c`. Each non-empty stdout line is a host.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    modifier: char,
    command: String,
}

impl CommandResolver {
    pub fn new(modifier: char, command: impl Into<String>) -> Self {
        Self {
            modifier,
            command: command.into(),
        }
    }

    fn failure(&self, group: &str, reason: impl ToString) -> HostlistError {
        HostlistError::Resolver {
            modifier: self.modifier,
            group: group.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl GroupResolver for CommandResolver {
    fn modifier(&self) -> char {
        self.modifier
    }

    async fn resolve(&self, group: &str) -> Result<Vec<String>, HostlistError> {
        // group names reach a shell
        if !group
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/' | '@'))
        {
            return Err(self.failure(group, "group name contains shell metacharacters"));
        }

        let command = self.command.replace("{group}", group);
        tracing::debug!("Resolving group '{}' with: {}", group, command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.failure(group, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(
                group,
                format!("command exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct FixedResolver(char);

    #[async_trait]
    impl GroupResolver for FixedResolver {
        fn modifier(&self) -> char {
            self.0
        }

        async fn resolve(&self, _group: &str) -> Result<Vec<String>, HostlistError> {
            Ok(vec!["h1".to_string()])
        }
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = ResolverRegistry::new();
        registry.register(Arc::new(FixedResolver('%'))).unwrap();
        assert_eq!(
            registry.register(Arc::new(FixedResolver('%'))),
            Err(HostlistError::DuplicateModifier { modifier: '%' })
        );
    }

    #[test]
    fn test_registry_rejects_ambiguous_modifiers() {
        let mut registry = ResolverRegistry::new();
        for modifier in ['a', '7', '-', '(', '['] {
            assert_eq!(
                registry.register(Arc::new(FixedResolver(modifier))),
                Err(HostlistError::InvalidModifier { modifier })
            );
        }
        assert!(registry.modifiers().is_empty());
    }

    #[tokio::test]
    async fn test_static_groups_expand_patterns() {
        let mut groups = HashMap::new();
        groups.insert(
            "web".to_string(),
            vec!["web[1-2]".to_string(), "web1".to_string()],
        );
        let resolver = StaticGroupResolver::new('%', groups, 1000);

        assert_eq!(resolver.resolve("web").await.unwrap(), vec!["web1", "web2"]);
        assert!(resolver.resolve("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hostfile_resolver() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# rack 1").unwrap();
        writeln!(file, "node1").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  node2  ").unwrap();

        let resolver = HostfileResolver::new('^');
        let hosts = resolver
            .resolve(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(hosts, vec!["node1", "node2"]);
    }

    #[tokio::test]
    async fn test_hostfile_missing() {
        let resolver = HostfileResolver::new('^');
        let err = resolver.resolve("/nonexistent/swk/hosts").await.unwrap_err();
        assert!(matches!(err, HostlistError::Resolver { modifier: '^', .. }));
    }

    #[tokio::test]
    async fn test_command_resolver() {
        let resolver = CommandResolver::new('@', "printf '%s-a\\n%s-b\\n' {group} {group}");
        let hosts = resolver.resolve("db").await.unwrap();
        assert_eq!(hosts, vec!["db-a", "db-b"]);
    }

    #[tokio::test]
    async fn test_command_resolver_failure() {
        let resolver = CommandResolver::new('@', "exit 3");
        assert!(matches!(
            resolver.resolve("db").await,
            Err(HostlistError::Resolver { .. })
        ));

        let resolver = CommandResolver::new('@', "echo {group}");
        assert!(resolver.resolve("db; rm -rf /").await.is_err());
    }
}
