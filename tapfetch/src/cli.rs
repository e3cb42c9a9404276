// tapfetch/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use tapfetch_common::error::Result;
use tapfetch_common::{Cache, Config};

pub mod exec;
pub mod fetch;
pub mod formula;
pub mod locate;

use crate::cli::exec::ExecArgs;
use crate::cli::fetch::FetchArgs;
use crate::cli::formula::FormulaArgs;
use crate::cli::locate::Locate;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "tapfetch", bin_name = "tapfetch")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a private GitHub archive or release asset
    Fetch(FetchArgs),
    /// Download the source a formula manifest declares
    Formula(FormulaArgs),
    /// Show how a URL would be fetched, without contacting GitHub
    Locate(Locate),
    /// Run a program with the resolved token in its environment
    Exec(ExecArgs),
}

impl Command {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        match self {
            Self::Fetch(command) => command.run(config, cache).await,
            Self::Formula(command) => command.run(config, cache).await,
            Self::Locate(command) => command.run(config),
            Self::Exec(command) => command.run(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn verbose_is_global_and_counted() {
        let args = CliArgs::try_parse_from([
            "tapfetch",
            "locate",
            "https://github.com/o/r/archive/refs/heads/main.tar.gz",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert!(matches!(args.command, Command::Locate(_)));
    }

    #[test]
    fn fetch_flags_parse() {
        let args = CliArgs::try_parse_from([
            "tapfetch",
            "fetch",
            "https://github.com/o/r/releases/download/v1/a.zip",
            "-o",
            "/tmp/a.zip",
            "--sha256",
            "abc",
            "--timeout",
            "12",
            "--handoff",
        ])
        .unwrap();
        match args.command {
            Command::Fetch(fetch) => {
                assert_eq!(fetch.output, Some(PathBuf::from("/tmp/a.zip")));
                assert_eq!(fetch.sha256.as_deref(), Some("abc"));
                assert_eq!(fetch.timeout, Some(12));
                assert!(fetch.handoff);
                assert!(!fetch.refresh);
            }
            other => panic!("expected fetch, got {other:?}"),
        }
    }

    #[test]
    fn exec_takes_trailing_program_arguments() {
        let args = CliArgs::try_parse_from([
            "tapfetch", "exec", "--env", "NPM_TOKEN", "--", "npm", "install", "--prefix", "x",
        ])
        .unwrap();
        match args.command {
            Command::Exec(exec) => {
                assert_eq!(exec.env, "NPM_TOKEN");
                assert_eq!(exec.command, ["npm", "install", "--prefix", "x"]);
            }
            other => panic!("expected exec, got {other:?}"),
        }
    }

    #[test]
    fn exec_defaults_to_github_token() {
        let args = CliArgs::try_parse_from(["tapfetch", "exec", "--", "env"]).unwrap();
        match args.command {
            Command::Exec(exec) => assert_eq!(exec.env, "GITHUB_TOKEN"),
            other => panic!("expected exec, got {other:?}"),
        }
    }
}
