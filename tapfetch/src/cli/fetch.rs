// tapfetch/src/cli/fetch.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use colored::Colorize;
use tapfetch_common::cache::Cache;
use tapfetch_common::config::Config;
use tapfetch_common::error::Result;
use tapfetch_common::locator::SourceLocator;
use tapfetch_net::{AuthenticatedArchiveFetcher, FetchOutcome, FetchRequest};
use tracing::{debug, instrument};

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// GitHub archive or release-asset URL
    pub url: String,

    /// Where to write the artifact (defaults to the download cache)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Expected SHA-256 of the artifact
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Total download timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write the resolved token to the hand-off file for a later `tapfetch exec`
    #[arg(long)]
    pub handoff: bool,

    /// Remove any existing artifact before downloading
    #[arg(long)]
    pub refresh: bool,
}

impl FetchArgs {
    #[instrument(skip(self, config, cache), fields(url = %self.url))]
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let locator = SourceLocator::parse(&self.url)?;
        let target = match &self.output {
            Some(path) => path.clone(),
            None => cache.artifact_path(&locator.file_name()),
        };
        if self.refresh {
            remove_existing(&cache, &locator, self.output.is_some(), &target)?;
        }

        let mut config = config.clone();
        if let Some(secs) = self.timeout {
            config.download_timeout = Duration::from_secs(secs);
        }
        let fetcher = AuthenticatedArchiveFetcher::new(config)?;
        let request = FetchRequest {
            url: self.url.clone(),
            expected_sha256: self.sha256.clone(),
            target,
        };
        fetch_and_report(&fetcher, &request, self.handoff).await?;
        Ok(())
    }
}

fn remove_existing(
    cache: &Cache,
    locator: &SourceLocator,
    explicit_output: bool,
    target: &Path,
) -> Result<()> {
    if explicit_output {
        if target.is_file() {
            debug!("Removing existing artifact {}", target.display());
            fs::remove_file(target)?;
        }
        Ok(())
    } else {
        cache.clear_file(&locator.file_name())
    }
}

/// Runs one fetch, prints where the artifact landed and optionally leaves the token
/// for the consuming phase.
pub(crate) async fn fetch_and_report(
    fetcher: &AuthenticatedArchiveFetcher,
    request: &FetchRequest,
    handoff: bool,
) -> Result<FetchOutcome> {
    let outcome = fetcher.fetch(request).await?;

    if outcome.reused {
        println!(
            "{}{} {}",
            "==> ".bold().blue(),
            "Already downloaded:".bold(),
            outcome.path.display()
        );
    } else {
        println!(
            "{}{} {} ({} bytes)",
            "==> ".bold().blue(),
            "Downloaded".bold(),
            outcome.locator.to_string().green(),
            outcome.size_bytes
        );
    }
    println!("{}", outcome.path.display());
    debug!("sha256 {}", outcome.sha256);

    if handoff {
        let path = fetcher.credentials().persist_for_handoff()?;
        println!(
            "{}{} {}",
            "==> ".bold().blue(),
            "Token handed off to".bold(),
            path.display()
        );
    }
    Ok(outcome)
}
