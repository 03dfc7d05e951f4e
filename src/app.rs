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

//! Application flow: configuration, expansion, execution and reporting.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use swk::{
    cli::{Cli, Commands},
    config::{expand_tilde, Config, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PARALLEL},
    executor::{
        output_sync::synchronized_eprintln, ConsoleSink, ExecutorConfig, ExecutorError,
        Operation, OutputSink, ParallelExecutor, ResultSummary,
    },
    hostlist::{HostlistExpander, Separator},
    ssh::{
        SessionConfig, SessionDefaults, SessionOverrides, SshConfig, SshTransport,
        StrictHostKeyChecking,
    },
};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_HOST_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_INTERRUPTED: i32 = 130;

const PROGRAM: &str = "swk";

/// Run the parsed command line and return the process exit code.
///
/// Errors returned here are usage, configuration or expansion errors.
pub async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref()).await?;
    let registry = config.build_registry()?;
    let expander = HostlistExpander::new(config.expander_config(), registry);
    let separator = expander.config().separator;

    let expression = read_expression(cli.command.hosts(), separator).await?;
    let hosts = expander.expand(&expression).await?;

    if let Commands::Dr { .. } = cli.command {
        for host in &hosts {
            println!("{host}");
        }
        return Ok(EXIT_SUCCESS);
    }

    if hosts.is_empty() {
        bail!("Host expression '{}' matched no hosts", expression);
    }

    let operation = build_operation(&cli.command)?;

    let ssh_config_path = cli
        .ssh_config
        .clone()
        .or_else(|| config.defaults.ssh_config.as_deref().map(PathBuf::from))
        .map(|path| expand_tilde(&path));
    let ssh_config = SshConfig::load_or_default(ssh_config_path.as_deref()).await?;

    let defaults = session_defaults(&cli, &config)?;
    let overrides = session_overrides(&cli)?;
    let sessions: Vec<SessionConfig> = hosts
        .iter()
        .map(|host| SessionConfig::resolve(host, &defaults, &ssh_config, &overrides))
        .collect();

    let color = cli.use_color();
    let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink::new(color));
    let cancel = CancellationToken::new();
    watch_interrupts(cancel.clone());

    let executor = ParallelExecutor::new(
        Arc::new(SshTransport::new()),
        sink,
        executor_config(&cli, &config),
    )
    .with_cancellation(cancel);

    tracing::info!(
        "Running {} on {} hosts ({} at a time)",
        cli.command.verb(),
        sessions.len(),
        executor.config().parallel
    );

    let outcome = match (&cli.command, operation) {
        (Commands::Ssh { .. }, operation) => executor.run_sequential(sessions, operation).await,
        (
            Commands::Gather { .. },
            Operation::Get {
                source,
                destination_dir,
            },
        ) => executor.gather(sessions, source, &destination_dir).await,
        (_, operation) => executor.run_parallel(sessions, operation).await,
    };

    let results = match outcome {
        Ok(results) => results,
        Err(ExecutorError::OperationInterrupted) => {
            let _ = synchronized_eprintln(&format!("{PROGRAM}: Operation interrupted"));
            return Ok(EXIT_INTERRUPTED);
        }
        Err(e) => return Err(e.into()),
    };

    let summary = ResultSummary::from_results(&results);
    if let Some(text) = summary.render(
        PROGRAM,
        cli.command.verb(),
        &cli.command.retry_args(),
        separator,
        color,
    ) {
        let _ = synchronized_eprintln(&text);
    }

    Ok(if summary.has_failures() {
        EXIT_HOST_FAILURE
    } else {
        EXIT_SUCCESS
    })
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let expanded = expand_tilde(path);
            if !expanded.exists() {
                bail!("Configuration file not found: {}", expanded.display());
            }
            Config::load(&expanded).await
        }
        None => Config::load(&Config::default_path()).await,
    }
}

/// The host expression, read from stdin when it is `-`.
async fn read_expression(hosts: &str, separator: Separator) -> Result<String> {
    if hosts != "-" {
        return Ok(hosts.to_string());
    }
    join_expression_lines(BufReader::new(tokio::io::stdin()), separator).await
}

/// Join the non-blank lines of `reader` into one expression
async fn join_expression_lines<R>(reader: R, separator: Separator) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut tokens = Vec::new();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read host expression from stdin")?
    {
        let line = line.trim();
        if !line.is_empty() {
            tokens.push(line.to_string());
        }
    }
    Ok(tokens.join(separator.joiner()))
}

fn build_operation(command: &Commands) -> Result<Operation> {
    match command {
        Commands::Ssh { .. } | Commands::Pssh { .. } => {
            let command = command.command_text().unwrap_or_default();
            if command.trim().is_empty() {
                bail!("No command specified");
            }
            Ok(Operation::Exec { command })
        }
        Commands::Dist { paths, .. } => {
            let (sources, destination) = Commands::dist_targets(paths);
            if let Some(missing) = sources.iter().find(|source| !source.exists()) {
                bail!("Local source not found: {}", missing.display());
            }
            Ok(Operation::Put {
                sources,
                destination,
            })
        }
        Commands::Gather { paths, .. } => {
            let (source, destination_dir) = Commands::gather_targets(paths);
            Ok(Operation::Get {
                source,
                destination_dir: expand_tilde(&destination_dir),
            })
        }
        Commands::Dr { .. } => bail!("Dry run has no remote operation"),
    }
}

fn session_defaults(cli: &Cli, config: &Config) -> Result<SessionDefaults> {
    let connect_timeout = cli
        .connect_timeout
        .or(config.defaults.connect_timeout)
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

    let strict_host_key_checking = match &config.defaults.strict_host_key_checking {
        Some(value) => value
            .parse::<StrictHostKeyChecking>()
            .context("Invalid strict_host_key_checking in configuration")?,
        None => StrictHostKeyChecking::default(),
    };

    Ok(SessionDefaults {
        username: config.defaults.user.clone(),
        identity_file: config.defaults.identity_file.as_deref().map(PathBuf::from),
        connect_timeout: Duration::from_secs(connect_timeout),
        strict_host_key_checking,
    })
}

fn session_overrides(cli: &Cli) -> Result<SessionOverrides> {
    let strict_host_key_checking = cli
        .strict_host_key_checking
        .as_deref()
        .map(str::parse::<StrictHostKeyChecking>)
        .transpose()?;

    Ok(SessionOverrides {
        username: cli.user.clone(),
        identity_file: cli.identity.clone(),
        strict_host_key_checking,
    })
}

fn executor_config(cli: &Cli, config: &Config) -> ExecutorConfig {
    ExecutorConfig {
        parallel: cli
            .parallel
            .or(config.defaults.parallel)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PARALLEL),
        command_timeout: cli
            .command_timeout
            .or(config.defaults.command_timeout)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    }
}

/// Cancel the run on the first Ctrl-C; a second one exits immediately.
fn watch_interrupts(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, waiting for running hosts to finish");
        let _ = synchronized_eprintln(&format!(
            "{PROGRAM}: interrupted, waiting for running hosts (press Ctrl-C again to abort)"
        ));
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(EXIT_INTERRUPTED);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_overrides_config_defaults() {
        let config = Config::parse(
            r#"
defaults:
  user: deploy
  connect_timeout: 8
  command_timeout: 60
  parallel: 4
  strict_host_key_checking: "no"
"#,
        )
        .unwrap();

        let plain = cli(&["swk", "pssh", "web1", "uptime"]);
        let defaults = session_defaults(&plain, &config).unwrap();
        assert_eq!(defaults.username.as_deref(), Some("deploy"));
        assert_eq!(defaults.connect_timeout, Duration::from_secs(8));
        assert_eq!(defaults.strict_host_key_checking, StrictHostKeyChecking::No);

        let exec = executor_config(&plain, &config);
        assert_eq!(exec.parallel, 4);
        assert_eq!(exec.command_timeout, Some(Duration::from_secs(60)));

        let flags = cli(&[
            "swk",
            "-p",
            "32",
            "-t",
            "2",
            "--command-timeout",
            "0",
            "pssh",
            "web1",
            "uptime",
        ]);
        let defaults = session_defaults(&flags, &config).unwrap();
        assert_eq!(defaults.connect_timeout, Duration::from_secs(2));
        let exec = executor_config(&flags, &config);
        assert_eq!(exec.parallel, 32);
        assert_eq!(exec.command_timeout, None);
    }

    #[test]
    fn test_invalid_checking_mode_is_rejected() {
        let flags = cli(&[
            "swk",
            "--strict-host-key-checking",
            "sometimes",
            "pssh",
            "web1",
            "uptime",
        ]);
        assert!(session_overrides(&flags).is_err());
    }

    #[test]
    fn test_build_operation() {
        let command = cli(&["swk", "pssh", "web1", "uname", "-a"]).command;
        assert_eq!(
            build_operation(&command).unwrap(),
            Operation::Exec {
                command: "uname -a".to_string()
            }
        );

        let command = cli(&["swk", "gather", "web1", "/var/log/syslog", "out"]).command;
        assert_eq!(
            build_operation(&command).unwrap(),
            Operation::Get {
                source: "/var/log/syslog".to_string(),
                destination_dir: PathBuf::from("out"),
            }
        );

        let command = cli(&["swk", "dist", "web1", "/definitely/not/here", "/opt"]).command;
        assert!(build_operation(&command).is_err());
    }

    #[tokio::test]
    async fn test_expression_passthrough() {
        let expression = read_expression("web[1-2]", Separator::Whitespace)
            .await
            .unwrap();
        assert_eq!(expression, "web[1-2]");
    }

    #[tokio::test]
    async fn test_stdin_lines_join_with_separator() {
        let input: &[u8] = b"web[1-2]\n\n  %db  \r\n-web2\n";
        let expression = join_expression_lines(input, Separator::Whitespace)
            .await
            .unwrap();
        assert_eq!(expression, "web[1-2] %db -web2");

        let input: &[u8] = b"web1\nweb2";
        let expression = join_expression_lines(input, Separator::Comma)
            .await
            .unwrap();
        assert_eq!(expression, "web1,web2");

        let empty: &[u8] = b"\n\n";
        assert_eq!(
            join_expression_lines(empty, Separator::Whitespace)
                .await
                .unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn test_missing_explicit_config_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("nope.yaml");
        assert!(load_config(Some(&missing)).await.is_err());
    }
}
