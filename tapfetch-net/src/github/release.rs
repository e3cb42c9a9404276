use std::path::Path;

use reqwest::StatusCode;
use tapfetch_common::error::{FetchError, Result};
use tracing::{debug, error};

use super::{
    release_asset_url, release_by_tag_url, Release, Session, SourceDownloader, ACCEPT_GITHUB_JSON,
    ACCEPT_OCTET_STREAM,
};
use crate::fetcher::FetchPhase;
use crate::http::{describe_failure, send_with_redirects, stream_to_file, StreamError};

/// Fetches a named release asset: release metadata by tag, then the asset by id.
/// The browser `releases/download/...` URL ignores `Authorization` for private
/// repositories, so this two-step API route is the only authenticated path.
pub struct ReleaseAssetDownloader<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub tag: &'a str,
    pub asset_name: &'a str,
}

impl ReleaseAssetDownloader<'_> {
    fn not_found(&self) -> FetchError {
        FetchError::AssetNotFound {
            tag: self.tag.to_string(),
            asset: self.asset_name.to_string(),
        }
    }

    /// Step 1: find the asset id.
    async fn resolve_asset_id(&self, session: &Session<'_>) -> Result<u64> {
        let url = release_by_tag_url(session.api_base, self.owner, self.repo, self.tag)?;
        debug!("Resolving release {} of {}/{}", self.tag, self.owner, self.repo);

        let (_, response) =
            send_with_redirects(session.client, &url, ACCEPT_GITHUB_JSON, &session.auth)
                .await
                .map_err(|failure| FetchError::ReleaseDownloadFailed {
                    url: failure.url,
                    reason: session.credential.redact(&failure.reason),
                })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("No release tagged {} in {}/{}", self.tag, self.owner, self.repo);
            return Err(self.not_found());
        }
        if !status.is_success() {
            let reason = describe_failure(response, session.credential).await;
            error!("Release metadata request failed for {}: {}", url, reason);
            return Err(FetchError::ReleaseDownloadFailed {
                url: url.to_string(),
                reason,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::ReleaseDownloadFailed {
                url: url.to_string(),
                reason: format!("Failed to read release metadata: {}", e.without_url()),
            })?;
        let release: Release = match serde_json::from_str(&body) {
            Ok(release) => release,
            Err(e) => {
                debug!("Release metadata for {} did not parse: {}", self.tag, e);
                return Err(self.not_found());
            }
        };

        match release.find_asset(self.asset_name) {
            Some(asset) => {
                debug!(
                    "Asset '{}' of release {} has id {} ({} bytes)",
                    asset.name,
                    release.tag_name,
                    asset.id,
                    asset.size.map_or_else(|| "?".to_string(), |s| s.to_string())
                );
                Ok(asset.id)
            }
            None => {
                let available: Vec<&str> = release.assets.iter().map(|a| a.name.as_str()).collect();
                debug!(
                    "Release {} has no asset '{}'; available: {:?}",
                    self.tag, self.asset_name, available
                );
                Err(self.not_found())
            }
        }
    }
}

impl SourceDownloader for ReleaseAssetDownloader<'_> {
    async fn download(
        &self,
        session: &Session<'_>,
        temp_path: &Path,
        phases: &mut Vec<FetchPhase>,
    ) -> Result<u64> {
        phases.push(FetchPhase::ResolvingReleaseMetadata);
        let asset_id = self.resolve_asset_id(session).await?;

        // Step 2: the asset by id. Octet-stream is required, otherwise GitHub answers
        // with the asset's JSON metadata instead of its bytes.
        phases.push(FetchPhase::Downloading);
        let url = release_asset_url(session.api_base, self.owner, self.repo, asset_id)?;
        debug!("Downloading release asset {} from {}", self.asset_name, url);

        let (final_url, response) =
            send_with_redirects(session.client, &url, ACCEPT_OCTET_STREAM, &session.auth)
                .await
                .map_err(|failure| FetchError::ReleaseDownloadFailed {
                    url: failure.url,
                    reason: session.credential.redact(&failure.reason),
                })?;

        if !response.status().is_success() {
            let reason = describe_failure(response, session.credential).await;
            error!("Release asset download failed for {}: {}", url, reason);
            return Err(FetchError::ReleaseDownloadFailed {
                url: url.to_string(),
                reason,
            });
        }

        stream_to_file(response, &final_url, temp_path)
            .await
            .map_err(|e| match e {
                StreamError::Transfer(failure) => FetchError::ReleaseDownloadFailed {
                    url: failure.url,
                    reason: session.credential.redact(&failure.reason),
                },
                StreamError::Io(err) => err,
            })
    }
}
