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

//! Thread-safe output synchronization for preventing race conditions
//! when multiple hosts write to stdout/stderr simultaneously.
//!
//! The unit of atomicity is one line: a host's line is never split by
//! another write, but lines of different hosts interleave freely.

use once_cell::sync::Lazy;
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

/// Global stdout mutex to prevent interleaved output
static STDOUT_MUTEX: Lazy<Mutex<io::Stdout>> = Lazy::new(|| Mutex::new(io::stdout()));

/// Global stderr mutex to prevent interleaved output
static STDERR_MUTEX: Lazy<Mutex<io::Stderr>> = Lazy::new(|| Mutex::new(io::stderr()));

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Thread-safe println! that prevents output interleaving
pub fn synchronized_println(text: &str) -> io::Result<()> {
    let mut stdout = lock(&STDOUT_MUTEX);
    writeln!(stdout, "{text}")?;
    stdout.flush()
}

/// Thread-safe eprintln! that prevents output interleaving
pub fn synchronized_eprintln(text: &str) -> io::Result<()> {
    let mut stderr = lock(&STDERR_MUTEX);
    writeln!(stderr, "{text}")?;
    stderr.flush()
}

/// Which remote stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Destination for per-host output
pub trait OutputSink: Send + Sync {
    /// Emit one complete line produced by `host`
    fn host_line(&self, host: &str, stream: OutputStream, line: &str);

    /// Emit an unprefixed progress message
    fn progress(&self, text: &str);
}

/// Writes `[host]: line` to the local stdout/stderr.
///
/// Remote stderr lines go to local stderr, coloured red when colour is on.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    color: bool,
}

impl ConsoleSink {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn format(&self, host: &str, stream: OutputStream, line: &str) -> String {
        let text = format!("[{host}]: {line}");
        match stream {
            OutputStream::Stderr if self.color => text.red().to_string(),
            _ => text,
        }
    }
}

impl OutputSink for ConsoleSink {
    fn host_line(&self, host: &str, stream: OutputStream, line: &str) {
        let text = self.format(host, stream, line);
        let result = match stream {
            OutputStream::Stdout => synchronized_println(&text),
            OutputStream::Stderr => synchronized_eprintln(&text),
        };
        if let Err(e) = result {
            tracing::debug!("Failed to write output for {}: {}", host, e);
        }
    }

    fn progress(&self, text: &str) {
        if let Err(e) = synchronized_println(text) {
            tracing::debug!("Failed to write progress: {}", e);
        }
    }
}

/// Collects output in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(String, OutputStream, String)>>,
    progress: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All host lines in emission order
    pub fn lines(&self) -> Vec<(String, OutputStream, String)> {
        lock(&self.lines).clone()
    }

    /// Lines emitted by one host on one stream
    pub fn lines_for(&self, host: &str, stream: OutputStream) -> Vec<String> {
        lock(&self.lines)
            .iter()
            .filter(|(h, s, _)| h == host && *s == stream)
            .map(|(_, _, line)| line.clone())
            .collect()
    }

    pub fn progress_messages(&self) -> Vec<String> {
        lock(&self.progress).clone()
    }
}

impl OutputSink for MemorySink {
    fn host_line(&self, host: &str, stream: OutputStream, line: &str) {
        lock(&self.lines).push((host.to_string(), stream, line.to_string()));
    }

    fn progress(&self, text: &str) {
        lock(&self.progress).push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_format() {
        let sink = ConsoleSink::new(false);
        assert_eq!(
            sink.format("web1", OutputStream::Stdout, "up 3 days"),
            "[web1]: up 3 days"
        );
        assert_eq!(
            sink.format("web1", OutputStream::Stderr, "oops"),
            "[web1]: oops"
        );

        let colored = ConsoleSink::new(true);
        let line = colored.format("web1", OutputStream::Stderr, "oops");
        assert!(line.contains("[web1]: oops"));
        assert!(line.starts_with("\u{1b}[31m"));
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        sink.host_line("a", OutputStream::Stdout, "1");
        sink.host_line("b", OutputStream::Stderr, "2");
        sink.progress("a [1/2]");

        assert_eq!(sink.lines_for("a", OutputStream::Stdout), vec!["1"]);
        assert_eq!(sink.lines_for("b", OutputStream::Stderr), vec!["2"]);
        assert!(sink.lines_for("a", OutputStream::Stderr).is_empty());
        assert_eq!(sink.progress_messages(), vec!["a [1/2]"]);
    }

    #[test]
    fn test_synchronized_output() {
        let _ = synchronized_println("test");
        let _ = synchronized_eprintln("test error");
    }
}
