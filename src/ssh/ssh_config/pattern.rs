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

//! `Host` line pattern matching
//!
//! Patterns support `*` and `?` wildcards and are compared case-insensitively.
//! A pattern prefixed with `!` negates: if any negated pattern on a `Host`
//! line matches, the whole line does not match, regardless of the positive
//! patterns.

/// Check whether a hostname matches a `Host` line
pub(super) fn matches_host_pattern(hostname: &str, patterns: &[String]) -> bool {
    let mut matched = false;
    for pattern in patterns {
        if let Some(negated) = pattern.strip_prefix('!') {
            if wildcard_match(hostname, negated) {
                return false;
            }
        } else if wildcard_match(hostname, pattern) {
            matched = true;
        }
    }
    matched
}

/// Glob-style matching with `*` (any run) and `?` (any one character)
pub(super) fn wildcard_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut t, mut p) = (0, 0);
    // Position of the last '*' and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, start)) => {
                    p = star + 1;
                    t = start + 1;
                    backtrack = Some((star, start + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_matching() {
        assert!(wildcard_match("web1.example.com", "web*.example.com"));
        assert!(wildcard_match("web123.example.com", "web*.example.com"));
        assert!(!wildcard_match("db1.example.com", "web*.example.com"));
        assert!(wildcard_match("test", "?est"));
        assert!(!wildcard_match("testing", "?est"));
        assert!(wildcard_match("anything", "*"));
        assert!(wildcard_match("WEB1", "web?"));
        assert!(wildcard_match("a.b.c", "*.*.c"));
        assert!(!wildcard_match("", "?"));
    }

    #[test]
    fn test_negation_excludes_whole_line() {
        let patterns = vec!["*.example.com".to_string(), "!db*".to_string()];
        assert!(matches_host_pattern("web1.example.com", &patterns));
        assert!(!matches_host_pattern("db1.example.com", &patterns));

        // A negated pattern alone never matches
        let patterns = vec!["!db*".to_string()];
        assert!(!matches_host_pattern("web1", &patterns));
    }

    #[test]
    fn test_host_pattern_matching() {
        let patterns = vec!["web*.example.com".to_string(), "*.test.com".to_string()];
        assert!(matches_host_pattern("web1.example.com", &patterns));
        assert!(matches_host_pattern("api.test.com", &patterns));
        assert!(!matches_host_pattern("db1.example.com", &patterns));
    }
}
