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

//! Error types for hostlist parsing and expansion

use thiserror::Error;

/// Errors that can occur during hostlist parsing and expansion
///
/// Every variant is fatal to the expansion that raised it: no partial
/// hostlist is ever returned alongside an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostlistError {
    /// Malformed pattern (e.g., `web[1-`, `db(a|b`)
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Pattern containing a character that would expand without bound (e.g., `web*`)
    #[error("unsafe character '{character}' in pattern '{pattern}' (wildcards cannot be enumerated)")]
    UnsafePattern { pattern: String, character: char },

    /// Token prefixed by a modifier that no resolver is registered for
    #[error("unknown modifier '{modifier}' in token '{token}'")]
    UnknownModifier { modifier: char, token: String },

    /// A positive token that produced zero hosts
    #[error("'{token}' expanded to an empty host set")]
    EmptyGroup { token: String },

    /// A group resolver failed to produce its member list
    #[error("resolver '{modifier}' failed for group '{group}': {reason}")]
    Resolver {
        modifier: char,
        group: String,
        reason: String,
    },

    /// Two resolvers registered under the same modifier
    #[error("modifier '{modifier}' is registered more than once")]
    DuplicateModifier { modifier: char },

    /// A modifier that would shadow hostnames, patterns or negation
    #[error("'{modifier}' cannot be used as a group modifier")]
    InvalidModifier { modifier: char },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HostlistError::UnknownModifier {
            modifier: '!',
            token: "!prod".to_string(),
        };
        assert_eq!(err.to_string(), "unknown modifier '!' in token '!prod'");

        let err = HostlistError::EmptyGroup {
            token: "%web".to_string(),
        };
        assert_eq!(err.to_string(), "'%web' expanded to an empty host set");

        let err = HostlistError::UnsafePattern {
            pattern: "web*".to_string(),
            character: '*',
        };
        assert_eq!(
            err.to_string(),
            "unsafe character '*' in pattern 'web*' (wildcards cannot be enumerated)"
        );
    }
}
