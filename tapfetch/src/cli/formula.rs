// tapfetch/src/cli/formula.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use tapfetch_common::cache::Cache;
use tapfetch_common::config::Config;
use tapfetch_common::error::Result;
use tapfetch_common::formula::Formula;
use tapfetch_net::{AuthenticatedArchiveFetcher, FetchRequest};
use tracing::{instrument, warn};

use crate::cli::fetch::fetch_and_report;

#[derive(Debug, Args)]
pub struct FormulaArgs {
    /// Formula manifest (JSON with name, version, url and sha256)
    pub file: PathBuf,

    /// Directory to download into (defaults to the download cache)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Write the resolved token to the hand-off file for a later `tapfetch exec`
    #[arg(long)]
    pub handoff: bool,
}

impl FormulaArgs {
    #[instrument(skip(self, config, cache), fields(file = %self.file.display()))]
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let formula = Formula::load(&self.file)?;
        println!(
            "{}{} {} {}",
            "==> ".bold().blue(),
            "Fetching".bold(),
            formula.name.cyan(),
            formula.version
        );
        if let Some(desc) = &formula.desc {
            println!("{desc}");
        }
        if formula.sha256.is_none() {
            warn!("Formula '{}' declares no sha256", formula.name);
        }

        let dir = self.output.as_deref().unwrap_or_else(|| cache.get_dir());
        let request = request_for(&formula, dir)?;
        let fetcher = AuthenticatedArchiveFetcher::new(config.clone())?;
        fetch_and_report(&fetcher, &request, self.handoff).await?;
        Ok(())
    }
}

fn request_for(formula: &Formula, dir: &Path) -> Result<FetchRequest> {
    Ok(FetchRequest {
        url: formula.url.clone(),
        expected_sha256: formula.sha256.clone(),
        target: dir.join(formula.artifact_file_name()?),
    })
}
