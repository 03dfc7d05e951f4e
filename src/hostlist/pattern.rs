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

//! Host pattern parsing and bounded expansion
//!
//! Patterns use a small, finite subset of regular-expression syntax so that
//! every pattern denotes an enumerable set of hostnames:
//!
//! - Literal characters: alphanumerics and `- _ . : @ /` (`.` is a literal dot)
//! - Escapes: `\x` makes any single character literal
//! - Character classes: `web[1-3]` -> `web1, web2, web3`, `[abx-z]`
//! - Alternation groups: `(web|db)01` -> `web01, db01`, nestable
//!
//! Quantifiers and wildcards (`* + ? { }`) are rejected rather than
//! expanded, as are negated classes (`[^...]`).
//!
//! Generation is a cartesian product where the leftmost element varies
//! slowest. Output is capped at a limit and truncated to the first `limit`
//! names in generation order.

use std::collections::HashSet;

use super::error::HostlistError;

/// Default cap on the number of hostnames one pattern may generate
pub const DEFAULT_PATTERN_LIMIT: usize = 1000;

/// Characters that would denote an unbounded or shell-glob expansion
const UNSAFE_CHARS: &[char] = &['*', '+', '?', '{', '}'];

/// Non-alphanumeric characters allowed as literals
const LITERAL_PUNCT: &[char] = &['-', '_', '.', ':', '@', '/'];

/// Returns true if `ch` may start a literal pattern token
pub fn is_pattern_start(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '(' | '[' | '\\')
}

/// One element of a parsed pattern
#[derive(Debug, Clone, PartialEq, Eq)]
enum Element {
    Literal(String),
    Class(Vec<char>),
    Group(Vec<Vec<Element>>),
}

struct PatternParser<'a> {
    pattern: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> PatternParser<'a> {
    fn new(pattern: &'a str) -> Self {
        Self {
            pattern,
            chars: pattern.chars().collect(),
            pos: 0,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> HostlistError {
        HostlistError::InvalidPattern {
            pattern: self.pattern.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    /// Parse `alt ( '|' alt )*` until end of input or a closing paren
    fn parse_alternatives(&mut self, depth: usize) -> Result<Vec<Vec<Element>>, HostlistError> {
        let mut alternatives = vec![self.parse_sequence(depth)?];
        while self.peek() == Some('|') {
            self.pos += 1;
            alternatives.push(self.parse_sequence(depth)?);
        }
        Ok(alternatives)
    }

    fn parse_sequence(&mut self, depth: usize) -> Result<Vec<Element>, HostlistError> {
        let mut elements = Vec::new();
        let mut literal = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '|' => break,
                ')' if depth > 0 => break,
                ')' => return Err(self.invalid("unmatched ')'")),
                ']' => return Err(self.invalid("unmatched ']'")),
                '(' | '[' => {
                    if !literal.is_empty() {
                        elements.push(Element::Literal(std::mem::take(&mut literal)));
                    }
                    self.pos += 1;
                    if ch == '(' {
                        let alternatives = self.parse_alternatives(depth + 1)?;
                        if self.bump() != Some(')') {
                            return Err(self.invalid("unclosed '('"));
                        }
                        elements.push(Element::Group(alternatives));
                    } else {
                        elements.push(Element::Class(self.parse_class()?));
                    }
                }
                '\\' => {
                    self.pos += 1;
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.invalid("trailing escape character"))?;
                    literal.push(escaped);
                }
                _ if UNSAFE_CHARS.contains(&ch) => {
                    return Err(HostlistError::UnsafePattern {
                        pattern: self.pattern.to_string(),
                        character: ch,
                    });
                }
                _ if is_literal_char(ch) => {
                    literal.push(ch);
                    self.pos += 1;
                }
                _ => return Err(self.invalid(format!("unexpected character '{ch}'"))),
            }
        }

        if !literal.is_empty() {
            elements.push(Element::Literal(literal));
        }
        Ok(elements)
    }

    /// Parse the body of a character class; the opening `[` is consumed
    ///
    /// Members must be literal hostname characters. An escaped single
    /// member is taken as-is, like an escape outside a class.
    fn parse_class(&mut self) -> Result<Vec<char>, HostlistError> {
        if self.peek() == Some('^') {
            return Err(self.invalid("negated character classes cannot be enumerated"));
        }

        let mut members: Vec<char> = Vec::new();
        let mut seen: HashSet<char> = HashSet::new();
        loop {
            let ch = self.bump().ok_or_else(|| self.invalid("unclosed '['"))?;
            let (start, escaped) = match ch {
                ']' => break,
                '[' => return Err(self.invalid("nested '[' inside character class")),
                '\\' => (
                    self.bump()
                        .ok_or_else(|| self.invalid("trailing escape character"))?,
                    true,
                ),
                _ => (ch, false),
            };

            // `a-z` range; a '-' directly before ']' is literal
            let is_range = self.peek() == Some('-')
                && self.chars.get(self.pos + 1).is_some_and(|&c| c != ']');
            if is_range {
                self.pos += 1;
                let end = match self.bump() {
                    Some('\\') => self
                        .bump()
                        .ok_or_else(|| self.invalid("trailing escape character"))?,
                    Some(c) => c,
                    None => return Err(self.invalid("unclosed '['")),
                };
                // Valid endpoints are ASCII, which bounds the walk
                self.check_class_member(start)?;
                self.check_class_member(end)?;
                if start > end {
                    return Err(self.invalid(format!("reversed range '{start}-{end}'")));
                }
                for c in start..=end {
                    self.check_class_member(c)?;
                    if seen.insert(c) {
                        members.push(c);
                    }
                }
            } else {
                if !escaped {
                    self.check_class_member(start)?;
                }
                if seen.insert(start) {
                    members.push(start);
                }
            }
        }

        if members.is_empty() {
            return Err(self.invalid("empty character class"));
        }
        Ok(members)
    }

    fn check_class_member(&self, ch: char) -> Result<(), HostlistError> {
        if UNSAFE_CHARS.contains(&ch) {
            return Err(HostlistError::UnsafePattern {
                pattern: self.pattern.to_string(),
                character: ch,
            });
        }
        if !is_literal_char(ch) {
            return Err(self.invalid(format!(
                "character '{}' is not allowed in a hostname",
                ch.escape_default()
            )));
        }
        Ok(())
    }
}

fn is_literal_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || LITERAL_PUNCT.contains(&ch)
}

fn expand_sequence(elements: &[Element], limit: usize) -> Vec<String> {
    let mut results = vec![String::new()];

    for element in elements {
        let values = expand_element(element, limit);
        let mut next = Vec::with_capacity(results.len().saturating_mul(values.len()).min(limit));
        'outer: for prefix in &results {
            for value in &values {
                if next.len() >= limit {
                    break 'outer;
                }
                next.push(format!("{prefix}{value}"));
            }
        }
        results = next;
    }

    results.truncate(limit);
    results
}

fn expand_element(element: &Element, limit: usize) -> Vec<String> {
    match element {
        Element::Literal(lit) => vec![lit.clone()],
        Element::Class(members) => members.iter().take(limit).map(|c| c.to_string()).collect(),
        Element::Group(alternatives) => {
            let mut values = Vec::new();
            for alternative in alternatives {
                if values.len() >= limit {
                    break;
                }
                let remaining = limit - values.len();
                values.extend(expand_sequence(alternative, remaining));
            }
            values
        }
    }
}

/// Expand a host pattern into the hostnames it denotes
///
/// The result is deduplicated (first occurrence kept) and holds at most
/// `limit` names. An empty pattern yields an empty list.
///
/// # Examples
///
/// ```rust
/// use swk::hostlist::expand_pattern;
///
/// let hosts = expand_pattern("web[1-3].example.com", 1000).unwrap();
/// assert_eq!(hosts, vec!["web1.example.com", "web2.example.com", "web3.example.com"]);
///
/// let hosts = expand_pattern("(web|db)0[12]", 1000).unwrap();
/// assert_eq!(hosts, vec!["web01", "web02", "db01", "db02"]);
/// ```
pub fn expand_pattern(pattern: &str, limit: usize) -> Result<Vec<String>, HostlistError> {
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    let mut parser = PatternParser::new(pattern);
    let alternatives = parser.parse_alternatives(0)?;
    if parser.pos != parser.chars.len() {
        return Err(parser.invalid("unexpected trailing input"));
    }

    let expanded = expand_element(&Element::Group(alternatives), limit);
    let mut seen = HashSet::with_capacity(expanded.len());
    let hosts: Vec<String> = expanded
        .into_iter()
        .filter(|host| !host.is_empty() && seen.insert(host.clone()))
        .collect();

    if hosts.len() == limit {
        tracing::debug!("Pattern '{}' truncated at {} hosts", pattern, limit);
    }
    Ok(hosts)
}
