// tapfetch-net/src/github/mod.rs
//! GitHub API endpoints and the two download strategies behind [`SourceDownloader`].

pub mod archive;
pub mod release;

use std::path::Path;

use reqwest::header::HeaderValue;
use reqwest::Client;
use serde::Deserialize;
use tapfetch_common::credential::Credential;
use tapfetch_common::error::{FetchError, Result};
use url::Url;

pub use archive::ArchiveDownloader;
pub use release::ReleaseAssetDownloader;

use crate::fetcher::FetchPhase;

pub const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";
pub const ACCEPT_OCTET_STREAM: &str = "application/octet-stream";

/// `GET /repos/{owner}/{repo}/tarball/{ref}`. Unlike the browser `archive/refs/...`
/// URL this endpoint honours `Authorization` through its redirect.
pub fn tarball_url(api_base: &str, owner: &str, repo: &str, git_ref: &str) -> Result<Url> {
    api_url(api_base, &["repos", owner, repo, "tarball", git_ref])
}

/// `GET /repos/{owner}/{repo}/releases/tags/{tag}`.
pub fn release_by_tag_url(api_base: &str, owner: &str, repo: &str, tag: &str) -> Result<Url> {
    api_url(api_base, &["repos", owner, repo, "releases", "tags", tag])
}

/// `GET /repos/{owner}/{repo}/releases/assets/{id}`.
pub fn release_asset_url(api_base: &str, owner: &str, repo: &str, asset_id: u64) -> Result<Url> {
    let id = asset_id.to_string();
    api_url(api_base, &["repos", owner, repo, "releases", "assets", &id])
}

/// Joins path segments onto the API base. A ref such as `feature/login` keeps its
/// slash, which the tarball endpoint accepts.
fn api_url(api_base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(api_base).map_err(|e| {
        FetchError::Config(format!("Invalid GitHub API base URL '{api_base}': {e}"))
    })?;
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            FetchError::Config(format!("GitHub API base URL '{api_base}' cannot be a base"))
        })?;
        path.pop_if_empty();
        for segment in segments {
            for part in segment.split('/') {
                path.push(part);
            }
        }
    }
    Ok(url)
}

/// `GET /repos/{owner}/{repo}/releases/tags/{tag}` response, trimmed to what we use.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl Release {
    /// Exact, case-sensitive name match.
    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

/// Everything a downloader needs for one authenticated fetch.
pub struct Session<'a> {
    pub client: &'a Client,
    pub api_base: &'a str,
    pub credential: &'a Credential,
    pub auth: HeaderValue,
}

/// One way of turning a locator into bytes on disk.
pub(crate) trait SourceDownloader {
    /// Downloads the artifact into `temp_path`, recording the phases it passes
    /// through. Returns the number of bytes written.
    async fn download(
        &self,
        session: &Session<'_>,
        temp_path: &Path,
        phases: &mut Vec<FetchPhase>,
    ) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_built_from_api_base() {
        assert_eq!(
            tarball_url("https://api.github.com", "shanberg", "home-services", "main")
                .unwrap()
                .as_str(),
            "https://api.github.com/repos/shanberg/home-services/tarball/main"
        );
        assert_eq!(
            release_by_tag_url("http://127.0.0.1:1234/", "o", "r", "v0.1.6")
                .unwrap()
                .as_str(),
            "http://127.0.0.1:1234/repos/o/r/releases/tags/v0.1.6"
        );
        assert_eq!(
            release_asset_url("https://api.github.com", "o", "r", 42)
                .unwrap()
                .as_str(),
            "https://api.github.com/repos/o/r/releases/assets/42"
        );
    }

    #[test]
    fn branch_refs_keep_their_slashes() {
        assert_eq!(
            tarball_url("https://api.github.com", "o", "r", "feature/login")
                .unwrap()
                .path(),
            "/repos/o/r/tarball/feature/login"
        );
    }

    #[test]
    fn decoded_names_are_encoded_once() {
        assert_eq!(
            tarball_url("https://api.github.com", "o", "r", "fix-ü")
                .unwrap()
                .path(),
            "/repos/o/r/tarball/fix-%C3%BC"
        );
        assert_eq!(
            release_by_tag_url("https://api.github.com", "o", "r", "v1 beta")
                .unwrap()
                .path(),
            "/repos/o/r/releases/tags/v1%20beta"
        );
    }

    #[test]
    fn asset_lookup_is_case_sensitive() {
        let release: Release = serde_json::from_str(
            r#"{"tag_name":"v1","assets":[{"id":1,"name":"pm.tar.gz"},{"id":2,"name":"PM.zip","size":10}]}"#,
        )
        .unwrap();
        assert_eq!(release.find_asset("pm.tar.gz").map(|a| a.id), Some(1));
        assert!(release.find_asset("pm.zip").is_none());
        assert!(release.find_asset("PM.TAR.GZ").is_none());
    }

    #[test]
    fn bad_api_base_is_config_error() {
        assert!(matches!(
            tarball_url("not a url", "o", "r", "main"),
            Err(FetchError::Config(_))
        ));
    }
}
