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

//! SSH configuration parsing functionality
//!
//! Only the keywords that influence a session are kept; everything else is
//! skipped. Options that appear before the first `Host` line form an
//! implicit `Host *` block. Malformed lines are logged and skipped so a
//! single bad option never prevents a run.

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::types::SshHostConfig;

/// Split a line into a lowercased keyword and its arguments.
///
/// Supports both "Option Value" and "Option=Value" syntax.
fn split_keyword(line: &str) -> Option<(String, Vec<&str>)> {
    let (keyword, rest) = match line.find(|c: char| c == '=' || c.is_whitespace()) {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    };
    if keyword.is_empty() {
        return None;
    }

    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    let args = rest
        .split_whitespace()
        .map(|arg| arg.trim_matches('"'))
        .filter(|arg| !arg.is_empty())
        .collect();

    Some((keyword.to_lowercase(), args))
}

/// Parse SSH configuration content
pub(super) fn parse(content: &str) -> Vec<SshHostConfig> {
    let mut hosts = Vec::new();
    let mut current = SshHostConfig {
        host_patterns: vec!["*".to_string()],
        ..Default::default()
    };
    // Options under an unsupported block (e.g. `Match`) are skipped
    let mut skipping = false;

    for (index, raw) in content.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((keyword, args)) = split_keyword(line) else {
            continue;
        };

        match keyword.as_str() {
            "host" => {
                if !skipping {
                    hosts.push(std::mem::take(&mut current));
                }
                if args.is_empty() {
                    tracing::warn!(
                        "Ignoring Host directive without patterns at line {}",
                        line_number
                    );
                    skipping = true;
                    continue;
                }
                current = SshHostConfig {
                    host_patterns: args.iter().map(|s| s.to_string()).collect(),
                    ..Default::default()
                };
                skipping = false;
            }
            "match" => {
                tracing::debug!("Skipping unsupported Match block at line {}", line_number);
                if !skipping {
                    hosts.push(std::mem::take(&mut current));
                }
                skipping = true;
            }
            _ if skipping => {}
            _ => {
                if let Err(e) = parse_option(&mut current, &keyword, &args, line_number) {
                    tracing::warn!("Ignoring SSH config line {}: {:#}", line_number, e);
                }
            }
        }
    }

    if !skipping {
        hosts.push(current);
    }

    hosts
}

/// Parse a configuration option for a host
///
/// Within one block the first value of a keyword wins.
pub(super) fn parse_option(
    host: &mut SshHostConfig,
    keyword: &str,
    args: &[&str],
    line_number: usize,
) -> Result<()> {
    let first = || {
        args.first()
            .copied()
            .with_context(|| format!("{keyword} requires a value at line {line_number}"))
    };

    match keyword {
        "hostname" => {
            let value = first()?;
            host.hostname.get_or_insert_with(|| value.to_string());
        }
        "user" => {
            let value = first()?;
            host.user.get_or_insert_with(|| value.to_string());
        }
        "port" => {
            let value = first()?;
            let port: u16 = value.parse().with_context(|| {
                format!("Invalid port number '{value}' at line {line_number}")
            })?;
            host.port.get_or_insert(port);
        }
        "identityfile" => host.identity_files.push(PathBuf::from(first()?)),
        "stricthostkeychecking" => {
            let value = first()?;
            host.strict_host_key_checking.get_or_insert_with(|| value.to_lowercase());
        }
        "connecttimeout" => {
            let value = first()?;
            let timeout: u64 = value.parse().with_context(|| {
                format!("Invalid ConnectTimeout '{value}' at line {line_number}")
            })?;
            host.connect_timeout.get_or_insert(timeout);
        }
        _ => {
            tracing::trace!("Ignoring option '{}' at line {}", keyword, line_number);
        }
    }

    Ok(())
}
