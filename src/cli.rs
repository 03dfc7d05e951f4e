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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "swk",
    version,
    about = "Swiss knife for clusters - run commands and copy files over SSH on many hosts",
    long_about = "swk expands a host expression into a list of hosts and runs a command or a\nfile transfer on all of them over SSH. Failed hosts are summarised at the end\ntogether with a ready-to-run command that retries only those hosts.",
    after_help = "HOST EXPRESSIONS:\n  web[01-10]            character classes and ranges\n  (web|db)0[1-3]        alternation groups\n  %web                  static group from the configuration file\n  ^~/hosts.txt          one host per line from a file\n  -web05                remove hosts added by earlier tokens\n  -                     read the expression from stdin\n\nEXAMPLES:\n  swk pssh \"web[1-4] -web3\" uptime\n  swk ssh %db \"systemctl status postgresql\"\n  swk dist %web app.tar.gz /opt/app/\n  swk gather %web /var/log/syslog ./logs\n  swk dr \"(web|db)0[1-3]\"\n\nEXIT STATUS:\n  0 all hosts succeeded, 1 some host failed, 2 usage or expansion error, 130 interrupted"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = "SWK_CONFIG",
        help = "Configuration file path [default: ~/.config/swk/config.yaml]"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'u',
        long,
        global = true,
        help = "Username for SSH connections"
    )]
    pub user: Option<String>,

    #[arg(
        short = 'i',
        long,
        global = true,
        help = "SSH private key file path\nFalls back to the SSH agent and default keys (~/.ssh/id_ed25519, ~/.ssh/id_ecdsa, ~/.ssh/id_rsa)"
    )]
    pub identity: Option<PathBuf>,

    #[arg(
        short = 'p',
        long,
        global = true,
        help = "Maximum parallel connections [default: 10]"
    )]
    pub parallel: Option<usize>,

    #[arg(
        short = 't',
        long,
        global = true,
        help = "Connect and read timeout in seconds [default: 5]"
    )]
    pub connect_timeout: Option<u64>,

    #[arg(
        long,
        global = true,
        help = "Remote command timeout in seconds (0 for unlimited)"
    )]
    pub command_timeout: Option<u64>,

    #[arg(
        short = 'F',
        long = "ssh-config",
        global = true,
        help = "Use alternative SSH configuration file [default: ~/.ssh/config]"
    )]
    pub ssh_config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Host key checking mode (yes/no/accept-new) [default: accept-new]\n  yes        - Strict checking against known_hosts\n  no         - Accept all host keys\n  accept-new - Accept new hosts, reject changed keys"
    )]
    pub strict_host_key_checking: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Disable coloured output (also honoured via NO_COLOR)"
    )]
    pub no_color: bool,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    #[command(
        about = "Run a command on each host in turn",
        after_help = "Example:\n  swk ssh \"web[1-3]\" uptime"
    )]
    Ssh {
        #[arg(allow_hyphen_values = true, help = "Host expression")]
        hosts: String,

        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            help = "Command to execute"
        )]
        command: Vec<String>,
    },

    #[command(
        about = "Run a command on all hosts in parallel",
        after_help = "Example:\n  swk -p 50 pssh %web \"df -h\""
    )]
    Pssh {
        #[arg(allow_hyphen_values = true, help = "Host expression")]
        hosts: String,

        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            help = "Command to execute"
        )]
        command: Vec<String>,
    },

    #[command(
        about = "Copy local files or directories to all hosts",
        long_about = "Copies local files or directories to all hosts in parallel.\nThe last argument is the remote destination; with a single argument the\ndestination is the remote home directory.",
        after_help = "Example:\n  swk dist %web app.tar.gz conf/ /opt/app/"
    )]
    Dist {
        #[arg(allow_hyphen_values = true, help = "Host expression")]
        hosts: String,

        #[arg(required = true, num_args = 1.., help = "Sources, then the remote destination")]
        paths: Vec<String>,
    },

    #[command(
        about = "Fetch a file or directory from all hosts",
        long_about = "Fetches a remote file or directory from all hosts in parallel.\nEach copy is stored as <basename>_<host> inside the local directory, which\nis created when missing.",
        after_help = "Example:\n  swk gather %web /var/log/syslog ./logs"
    )]
    Gather {
        #[arg(allow_hyphen_values = true, help = "Host expression")]
        hosts: String,

        #[arg(required = true, num_args = 1..=2, help = "Remote path, then an optional local directory")]
        paths: Vec<String>,
    },

    #[command(about = "Dry run: print the expanded hostlist, one host per line")]
    Dr {
        #[arg(allow_hyphen_values = true, help = "Host expression")]
        hosts: String,
    },
}

impl Commands {
    /// Verb as typed on the command line
    pub fn verb(&self) -> &'static str {
        match self {
            Commands::Ssh { .. } => "ssh",
            Commands::Pssh { .. } => "pssh",
            Commands::Dist { .. } => "dist",
            Commands::Gather { .. } => "gather",
            Commands::Dr { .. } => "dr",
        }
    }

    /// The host expression argument
    pub fn hosts(&self) -> &str {
        match self {
            Commands::Ssh { hosts, .. }
            | Commands::Pssh { hosts, .. }
            | Commands::Dist { hosts, .. }
            | Commands::Gather { hosts, .. }
            | Commands::Dr { hosts } => hosts,
        }
    }

    /// Remote command text for `ssh`/`pssh`
    pub fn command_text(&self) -> Option<String> {
        match self {
            Commands::Ssh { command, .. } | Commands::Pssh { command, .. } => {
                Some(command.join(" "))
            }
            _ => None,
        }
    }

    /// Arguments that reproduce this operation in a retry command
    pub fn retry_args(&self) -> Vec<String> {
        match self {
            Commands::Ssh { .. } | Commands::Pssh { .. } => {
                self.command_text().into_iter().collect()
            }
            Commands::Dist { paths, .. } | Commands::Gather { paths, .. } => paths.clone(),
            Commands::Dr { .. } => Vec::new(),
        }
    }

    /// Split `dist` arguments into sources and the remote destination
    pub fn dist_targets(paths: &[String]) -> (Vec<PathBuf>, String) {
        match paths {
            [] => (Vec::new(), ".".to_string()),
            [single] => (vec![PathBuf::from(single)], ".".to_string()),
            [sources @ .., destination] => (
                sources.iter().map(PathBuf::from).collect(),
                destination.clone(),
            ),
        }
    }

    /// Split `gather` arguments into the remote path and the local directory
    pub fn gather_targets(paths: &[String]) -> (String, PathBuf) {
        let source = paths.first().cloned().unwrap_or_default();
        let destination = paths
            .get(1)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        (source, destination)
    }
}

impl Cli {
    /// Whether coloured output is wanted
    pub fn use_color(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").map_or(true, |value| value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_pssh_with_options() {
        let cli = parse(&[
            "swk", "-p", "20", "-u", "ops", "pssh", "web[1-3]", "uptime", "-a",
        ]);
        assert_eq!(cli.parallel, Some(20));
        assert_eq!(cli.user.as_deref(), Some("ops"));
        assert_eq!(cli.command.verb(), "pssh");
        assert_eq!(cli.command.hosts(), "web[1-3]");
        assert_eq!(cli.command.command_text().as_deref(), Some("uptime -a"));
        assert_eq!(cli.command.retry_args(), vec!["uptime -a"]);
    }

    #[test]
    fn test_negated_first_token_is_not_a_flag() {
        let cli = parse(&["swk", "dr", "-web1 web[1-3]"]);
        assert_eq!(cli.command.hosts(), "-web1 web[1-3]");

        let cli = parse(&["swk", "ssh", "-", "hostname"]);
        assert_eq!(cli.command.hosts(), "-");
    }

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["swk", "pssh", "web1"]).is_err());
        assert!(Cli::try_parse_from(["swk", "dist", "web1"]).is_err());
    }

    #[test]
    fn test_gather_accepts_at_most_two_paths() {
        assert!(Cli::try_parse_from(["swk", "gather", "web1", "/a", "./b"]).is_ok());
        assert!(Cli::try_parse_from(["swk", "gather", "web1", "/a", "./b", "./c"]).is_err());
    }

    #[test]
    fn test_dist_targets() {
        let (sources, destination) = Commands::dist_targets(&["app.tar".to_string()]);
        assert_eq!(sources, vec![PathBuf::from("app.tar")]);
        assert_eq!(destination, ".");

        let (sources, destination) = Commands::dist_targets(&[
            "a".to_string(),
            "b".to_string(),
            "/opt".to_string(),
        ]);
        assert_eq!(sources, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(destination, "/opt");
    }

    #[test]
    fn test_gather_targets() {
        let (source, destination) = Commands::gather_targets(&["/var/log/syslog".to_string()]);
        assert_eq!(source, "/var/log/syslog");
        assert_eq!(destination, PathBuf::from("."));

        let (_, destination) =
            Commands::gather_targets(&["/etc/hosts".to_string(), "out".to_string()]);
        assert_eq!(destination, PathBuf::from("out"));
    }

    #[test]
    fn test_global_options() {
        let cli = parse(&["swk", "--no-color", "-t", "9", "pssh", "web1", "uptime"]);
        assert!(cli.no_color);
        assert_eq!(cli.connect_timeout, Some(9));
    }
}
