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

//! Per-host resolution of SSH configuration
//!
//! Blocks are visited in file order. For each keyword the first matching
//! block that sets it wins, as in OpenSSH. Identity files accumulate.

use super::pattern::matches_host_pattern;
use super::types::SshHostConfig;

/// Find configuration for a specific hostname
pub(super) fn find_host_config(hosts: &[SshHostConfig], hostname: &str) -> SshHostConfig {
    let mut merged = SshHostConfig::default();

    for host_config in hosts {
        if matches_host_pattern(hostname, &host_config.host_patterns) {
            tracing::trace!("{} matches '{}'", hostname, host_config);
            merge_first_wins(&mut merged, host_config);
        }
    }

    if let Some(hostname_value) = merged.hostname.take() {
        merged.hostname = Some(hostname_value.replace("%h", hostname));
    }
    merged
}

/// Fill unset fields of `base` from `overlay`
fn merge_first_wins(base: &mut SshHostConfig, overlay: &SshHostConfig) {
    if base.hostname.is_none() {
        base.hostname = overlay.hostname.clone();
    }
    if base.user.is_none() {
        base.user = overlay.user.clone();
    }
    if base.port.is_none() {
        base.port = overlay.port;
    }
    base.identity_files
        .extend(overlay.identity_files.iter().cloned());
    if base.strict_host_key_checking.is_none() {
        base.strict_host_key_checking = overlay.strict_host_key_checking.clone();
    }
    if base.connect_timeout.is_none() {
        base.connect_timeout = overlay.connect_timeout;
    }
}
