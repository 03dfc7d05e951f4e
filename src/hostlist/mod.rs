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

//! Host expression expansion
//!
//! A host expression is a list of tokens separated by whitespace or commas
//! (fixed per deployment). Each token is one of:
//!
//! - A pattern: `web01`, `web[1-4].example.com`, `(web|db)0[1-3]`
//! - A group reference: a registered modifier followed by a group name,
//!   e.g. `%web` (static groups), `^/path/to/hosts` (host file)
//! - Either of the above prefixed with `-` to remove hosts
//!
//! Tokens apply left to right. Positive tokens add hosts not seen yet;
//! negative tokens remove hosts already collected. A negation only affects
//! hosts added by earlier tokens, so `-a a` yields `a` while `a -a` yields
//! nothing. The final list is sorted.
//!
//! # Examples
//!
//! ```rust
//! use swk::hostlist::{ExpanderConfig, HostlistExpander, ResolverRegistry};
//!
//! # tokio_test::block_on(async {
//! let expander = HostlistExpander::new(ExpanderConfig::default(), ResolverRegistry::new());
//!
//! let hosts = expander.expand("web[1-3] -web2").await.unwrap();
//! assert_eq!(hosts, vec!["web1", "web3"]);
//! # });
//! ```

mod error;
pub mod pattern;
pub mod resolver;
mod token;

use std::collections::HashSet;

pub use error::HostlistError;
pub use pattern::{expand_pattern, DEFAULT_PATTERN_LIMIT};
pub use resolver::{
    CommandResolver, GroupResolver, HostfileResolver, ResolverRegistry, StaticGroupResolver,
};
pub use token::{split_tokens, strip_quotes, HostToken, Separator};

/// Immutable settings for the expansion engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpanderConfig {
    pub separator: Separator,
    pub pattern_limit: usize,
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            separator: Separator::Whitespace,
            pattern_limit: DEFAULT_PATTERN_LIMIT,
        }
    }
}

/// Turns host expressions into sorted, deduplicated hostlists
#[derive(Debug, Clone)]
pub struct HostlistExpander {
    config: ExpanderConfig,
    registry: ResolverRegistry,
}

impl HostlistExpander {
    pub fn new(config: ExpanderConfig, registry: ResolverRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &ExpanderConfig {
        &self.config
    }

    /// Parse an expression into tokens without resolving them
    pub fn tokenize(&self, expression: &str) -> Result<Vec<HostToken>, HostlistError> {
        split_tokens(strip_quotes(expression), self.config.separator)
            .iter()
            .map(|raw| HostToken::parse(raw))
            .collect()
    }

    /// Expand an expression into a sorted hostlist.
    ///
    /// Any error aborts the whole expansion; hosts gathered from earlier
    /// tokens are discarded.
    pub async fn expand(&self, expression: &str) -> Result<Vec<String>, HostlistError> {
        let tokens = self.tokenize(expression)?;

        let mut hosts: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for token in &tokens {
            let members = self.expand_token(token).await?;

            if token.negated {
                let removed: HashSet<&String> = members.iter().collect();
                hosts.retain(|host| !removed.contains(host));
                seen.retain(|host| !removed.contains(host));
                tracing::trace!("'{}' removed up to {} hosts", token, members.len());
            } else {
                if members.is_empty() {
                    return Err(HostlistError::EmptyGroup {
                        token: token.to_string(),
                    });
                }
                for host in members {
                    if seen.insert(host.clone()) {
                        hosts.push(host);
                    }
                }
            }
        }

        hosts.sort();
        tracing::debug!("Expanded '{}' into {} hosts", expression, hosts.len());
        Ok(hosts)
    }

    async fn expand_token(&self, token: &HostToken) -> Result<Vec<String>, HostlistError> {
        match token.modifier {
            None => expand_pattern(&token.remainder, self.config.pattern_limit),
            Some(modifier) => {
                let resolver =
                    self.registry
                        .get(modifier)
                        .ok_or_else(|| HostlistError::UnknownModifier {
                            modifier,
                            token: token.to_string(),
                        })?;
                resolver.resolve(&token.remainder).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapResolver {
        modifier: char,
        groups: HashMap<&'static str, Vec<&'static str>>,
    }

    #[async_trait]
    impl GroupResolver for MapResolver {
        fn modifier(&self) -> char {
            self.modifier
        }

        async fn resolve(&self, group: &str) -> Result<Vec<String>, HostlistError> {
            Ok(self
                .groups
                .get(group)
                .map(|hosts| hosts.iter().map(|h| h.to_string()).collect())
                .unwrap_or_default())
        }
    }

    fn expander(separator: Separator) -> HostlistExpander {
        let mut groups = HashMap::new();
        groups.insert("web", vec!["web2", "web1", "web3"]);
        groups.insert("db", vec!["db1", "web1"]);
        groups.insert("empty", vec![]);

        let mut registry = ResolverRegistry::new();
        registry
            .register(Arc::new(MapResolver {
                modifier: '%',
                groups,
            }))
            .unwrap();

        HostlistExpander::new(
            ExpanderConfig {
                separator,
                pattern_limit: DEFAULT_PATTERN_LIMIT,
            },
            registry,
        )
    }

    #[tokio::test]
    async fn test_union_is_sorted_and_unique() {
        let expander = expander(Separator::Whitespace);
        let hosts = expander.expand("%web %db web1 zz").await.unwrap();
        assert_eq!(hosts, vec!["db1", "web1", "web2", "web3", "zz"]);
    }

    #[tokio::test]
    async fn test_negation_is_order_sensitive() {
        let expander = expander(Separator::Comma);
        assert!(expander.expand("a,-a").await.unwrap().is_empty());
        assert_eq!(expander.expand("-a,a").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_negated_group() {
        let expander = expander(Separator::Whitespace);
        let hosts = expander.expand("%web -%db").await.unwrap();
        assert_eq!(hosts, vec!["web2", "web3"]);
    }

    #[tokio::test]
    async fn test_readd_after_negation() {
        let expander = expander(Separator::Whitespace);
        let hosts = expander.expand("%web -web1 %db").await.unwrap();
        assert_eq!(hosts, vec!["db1", "web1", "web2", "web3"]);
    }

    #[tokio::test]
    async fn test_empty_positive_group_is_fatal() {
        let expander = expander(Separator::Whitespace);
        let err = expander.expand("%web %empty").await.unwrap_err();
        assert_eq!(
            err,
            HostlistError::EmptyGroup {
                token: "%empty".to_string()
            }
        );
        assert!(expander.expand("%web %missing").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_negated_group_is_allowed() {
        let expander = expander(Separator::Whitespace);
        let hosts = expander.expand("%web -%empty").await.unwrap();
        assert_eq!(hosts.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_modifier_is_fatal() {
        let expander = expander(Separator::Whitespace);
        assert_eq!(
            expander.expand("web1 !prod").await,
            Err(HostlistError::UnknownModifier {
                modifier: '!',
                token: "!prod".to_string()
            })
        );
        assert!(matches!(
            expander.expand("web1 -=x").await,
            Err(HostlistError::UnknownModifier { modifier: '=', .. })
        ));
    }

    #[tokio::test]
    async fn test_unsafe_pattern_is_fatal() {
        let expander = expander(Separator::Whitespace);
        assert!(matches!(
            expander.expand("%web web*").await,
            Err(HostlistError::UnsafePattern { .. })
        ));
    }

    #[tokio::test]
    async fn test_quoted_expression() {
        let expander = expander(Separator::Whitespace);
        let hosts = expander.expand("\"node[1-2] -node1\"").await.unwrap();
        assert_eq!(hosts, vec!["node2"]);
    }

    #[tokio::test]
    async fn test_comma_separator_keeps_brackets_intact() {
        let expander = expander(Separator::Comma);
        let hosts = expander.expand("(a|b)x, c[1-2]").await.unwrap();
        assert_eq!(hosts, vec!["ax", "bx", "c1", "c2"]);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let expander = expander(Separator::Whitespace);
        let first = expander.expand("%db n[0-9] %web -n5").await.unwrap();
        for _ in 0..5 {
            assert_eq!(expander.expand("%db n[0-9] %web -n5").await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_empty_expression() {
        let expander = expander(Separator::Whitespace);
        assert!(expander.expand("   ").await.unwrap().is_empty());
    }
}
