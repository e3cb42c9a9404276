// tapfetch/src/cli/locate.rs
use clap::Args;
use colored::Colorize;
use tapfetch_common::config::Config;
use tapfetch_common::error::Result;
use tapfetch_common::locator::SourceLocator;
use tapfetch_net::github::{release_by_tag_url, tarball_url};

/// Parses a URL and prints the endpoints a fetch would use. Never resolves a token.
#[derive(Debug, Args)]
pub struct Locate {
    pub url: String,
}

impl Locate {
    pub fn run(&self, config: &Config) -> Result<()> {
        let locator = SourceLocator::parse(&self.url)?;
        for (label, value) in describe(&locator, config.api_base_url())? {
            println!("{} {}", format!("{:<10}", format!("{label}:")).bold(), value);
        }
        Ok(())
    }
}

fn describe(locator: &SourceLocator, api_base: &str) -> Result<Vec<(&'static str, String)>> {
    let mut lines = vec![("locator", locator.to_string())];
    match locator {
        SourceLocator::RepoArchive {
            owner,
            repo,
            git_ref,
        } => {
            lines.push(("kind", "repository archive".to_string()));
            lines.push(("ref", git_ref.clone()));
            lines.push(("endpoint", tarball_url(api_base, owner, repo, git_ref)?.to_string()));
        }
        SourceLocator::ReleaseAsset {
            owner,
            repo,
            tag,
            asset_name,
        } => {
            lines.push(("kind", "release asset".to_string()));
            lines.push(("tag", tag.clone()));
            lines.push(("asset", asset_name.clone()));
            lines.push((
                "metadata",
                release_by_tag_url(api_base, owner, repo, tag)?.to_string(),
            ));
            lines.push((
                "endpoint",
                format!("{api_base}/repos/{owner}/{repo}/releases/assets/<id>"),
            ));
        }
    }
    lines.push(("file", locator.file_name()));
    Ok(lines)
}
