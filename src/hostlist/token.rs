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

//! Tokenizing host expressions

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::HostlistError;
use super::pattern::is_pattern_start;

/// Separator between tokens of a host expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    #[default]
    Whitespace,
    Comma,
}

impl Separator {
    fn is_separator(self, ch: char) -> bool {
        match self {
            Separator::Whitespace => ch.is_whitespace(),
            Separator::Comma => ch == ',',
        }
    }

    /// String used to join hostnames back into an expression
    pub fn joiner(self) -> &'static str {
        match self {
            Separator::Whitespace => " ",
            Separator::Comma => ",",
        }
    }
}

/// One parsed term of a host expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostToken {
    pub negated: bool,
    /// `None` for literal patterns
    pub modifier: Option<char>,
    pub remainder: String,
}

impl HostToken {
    /// Parse a single raw token
    ///
    /// A leading `-` marks negation. The next character is the modifier
    /// unless it can start a pattern, in which case the whole remainder is
    /// a literal pattern.
    pub fn parse(raw: &str) -> Result<Self, HostlistError> {
        let (negated, body) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let mut chars = body.chars();
        let first = chars.next().ok_or_else(|| HostlistError::InvalidPattern {
            pattern: raw.to_string(),
            reason: "token has no host pattern".to_string(),
        })?;

        if is_pattern_start(first) {
            Ok(Self {
                negated,
                modifier: None,
                remainder: body.to_string(),
            })
        } else {
            Ok(Self {
                negated,
                modifier: Some(first),
                remainder: chars.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for HostToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "-")?;
        }
        if let Some(modifier) = self.modifier {
            write!(f, "{modifier}")?;
        }
        write!(f, "{}", self.remainder)
    }
}

/// Strip one pair of matching surrounding quotes
pub fn strip_quotes(expr: &str) -> &str {
    let expr = expr.trim();
    for quote in ['"', '\''] {
        if expr.len() >= 2 && expr.starts_with(quote) && expr.ends_with(quote) {
            return &expr[1..expr.len() - 1];
        }
    }
    expr
}

/// Split an expression into raw tokens
///
/// Separators inside `[...]` or `(...)` do not split. Empty tokens are
/// dropped.
pub fn split_tokens(expr: &str, separator: Separator) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut escaped = false;

    for ch in expr.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                current.push(ch);
            }
            '[' | '(' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            _ if depth == 0 && separator.is_separator(ch) => {
                let token = current.trim();
                if !token.is_empty() {
                    tokens.push(token.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let token = current.trim();
    if !token.is_empty() {
        tokens.push(token.to_string());
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal() {
        let token = HostToken::parse("web01").unwrap();
        assert!(!token.negated);
        assert_eq!(token.modifier, None);
        assert_eq!(token.remainder, "web01");
    }

    #[test]
    fn test_parse_negated_group() {
        let token = HostToken::parse("-%db").unwrap();
        assert!(token.negated);
        assert_eq!(token.modifier, Some('%'));
        assert_eq!(token.remainder, "db");
        assert_eq!(token.to_string(), "-%db");
    }

    #[test]
    fn test_parse_pattern_start() {
        let token = HostToken::parse("(a|b)1").unwrap();
        assert_eq!(token.modifier, None);
        assert_eq!(token.remainder, "(a|b)1");
    }

    #[test]
    fn test_parse_bare_dash() {
        assert!(matches!(
            HostToken::parse("-"),
            Err(HostlistError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_split_whitespace() {
        assert_eq!(
            split_tokens("  a  b\tc\n", Separator::Whitespace),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_split_comma_respects_brackets() {
        assert_eq!(
            split_tokens("a,(b|c),d[1-2],,-e", Separator::Comma),
            vec!["a", "(b|c)", "d[1-2]", "-e"]
        );
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"a b\""), "a b");
        assert_eq!(strip_quotes("'a'"), "a");
        assert_eq!(strip_quotes("\"a'"), "\"a'");
        assert_eq!(strip_quotes("a"), "a");
    }
}
