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

//! Result aggregation and retry command synthesis.

use owo_colors::OwoColorize;
use std::collections::BTreeMap;

use super::result_types::ExecutionResult;
use crate::hostlist::Separator;

/// Histogram of result codes over one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSummary {
    /// Hosts per result code, codes ascending, hosts in result order
    pub by_status: BTreeMap<i32, Vec<String>>,
    /// Hosts with a non-zero code, in result order
    pub failed_hosts: Vec<String>,
}

impl ResultSummary {
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary
                .by_status
                .entry(result.status_code)
                .or_default()
                .push(result.hostname.clone());
            if !result.is_success() {
                summary.failed_hosts.push(result.hostname.clone());
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_hosts.is_empty()
    }

    /// Command line that repeats `verb` with `args` against the failed hosts only
    pub fn retry_command(
        &self,
        program: &str,
        verb: &str,
        args: &[String],
        separator: Separator,
    ) -> String {
        let hosts = self.failed_hosts.join(separator.joiner());
        let mut command = format!("{program} {verb} {}", quote(&hosts));
        for arg in args {
            command.push(' ');
            command.push_str(&quote(arg));
        }
        command
    }

    /// The failure block for stderr; `None` when every host succeeded.
    pub fn render(
        &self,
        program: &str,
        verb: &str,
        args: &[String],
        separator: Separator,
        color: bool,
    ) -> Option<String> {
        if !self.has_failures() {
            return None;
        }

        let mut lines = vec!["===".to_string(), "cmd exit status: host".to_string()];
        for (code, hosts) in self.by_status.iter().filter(|(code, _)| **code != 0) {
            lines.push(format!("{code}: {};", hosts.join(", ")));
        }
        lines.push(format!(
            "Retry: {}",
            self.retry_command(program, verb, args, separator)
        ));

        let text = lines.join("\n");
        if color {
            Some(text.red().to_string())
        } else {
            Some(text)
        }
    }
}

/// Double-quote `text` for a POSIX shell
fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(codes: &[(&str, i32)]) -> Vec<ExecutionResult> {
        codes
            .iter()
            .map(|(host, code)| ExecutionResult::new(*host, *code))
            .collect()
    }

    #[test]
    fn test_histogram_and_failed_hosts() {
        let summary =
            ResultSummary::from_results(&results(&[("h1", 0), ("h2", 1), ("h3", 254), ("h4", 1)]));

        assert_eq!(summary.failed_hosts, vec!["h2", "h3", "h4"]);
        assert_eq!(summary.by_status[&0], vec!["h1"]);
        assert_eq!(summary.by_status[&1], vec!["h2", "h4"]);
        assert_eq!(summary.by_status[&254], vec!["h3"]);
    }

    #[test]
    fn test_no_failures_renders_nothing() {
        let summary = ResultSummary::from_results(&results(&[("h1", 0), ("h2", 0)]));
        assert!(!summary.has_failures());
        assert_eq!(
            summary.render("swk", "pssh", &["uptime".into()], Separator::Whitespace, false),
            None
        );
    }

    #[test]
    fn test_render_block() {
        let summary =
            ResultSummary::from_results(&results(&[("h1", 0), ("h2", 1), ("h3", 254), ("h4", 1)]));
        let text = summary
            .render("swk", "pssh", &["uptime".into()], Separator::Whitespace, false)
            .unwrap();

        assert_eq!(
            text,
            "===\n\
             cmd exit status: host\n\
             1: h2, h4;\n\
             254: h3;\n\
             Retry: swk pssh \"h2 h3 h4\" \"uptime\""
        );
    }

    #[test]
    fn test_retry_uses_separator_and_quotes_args() {
        let summary = ResultSummary::from_results(&results(&[("a", 2), ("b", 0), ("c", 3)]));
        let retry = summary.retry_command(
            "swk",
            "ssh",
            &["echo \"$HOME\"".into()],
            Separator::Comma,
        );
        assert_eq!(retry, r#"swk ssh "a,c" "echo \"\$HOME\"""#);
    }

    #[test]
    fn test_retry_with_several_args() {
        let summary = ResultSummary::from_results(&results(&[("a", 253)]));
        let retry = summary.retry_command(
            "swk",
            "dist",
            &["app.tar".into(), "/opt".into()],
            Separator::Whitespace,
        );
        assert_eq!(retry, r#"swk dist "a" "app.tar" "/opt""#);
    }
}
