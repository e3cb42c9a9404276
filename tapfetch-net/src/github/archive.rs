use std::path::Path;

use tapfetch_common::error::{FetchError, Result};
use tracing::{debug, error};

use super::{tarball_url, Session, SourceDownloader, ACCEPT_GITHUB_JSON};
use crate::fetcher::FetchPhase;
use crate::http::{describe_failure, send_with_redirects, stream_to_file, StreamError, TransferFailure};

/// Fetches a branch, tag or commit tarball through the API tarball endpoint.
pub struct ArchiveDownloader<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub git_ref: &'a str,
}

fn archive_error(failure: TransferFailure) -> FetchError {
    FetchError::ArchiveFetchFailed {
        url: failure.url,
        reason: failure.reason,
    }
}

impl SourceDownloader for ArchiveDownloader<'_> {
    async fn download(
        &self,
        session: &Session<'_>,
        temp_path: &Path,
        phases: &mut Vec<FetchPhase>,
    ) -> Result<u64> {
        let url = tarball_url(session.api_base, self.owner, self.repo, self.git_ref)?;
        phases.push(FetchPhase::Downloading);
        debug!("Downloading archive {}/{}@{} from {}", self.owner, self.repo, self.git_ref, url);

        let (final_url, response) =
            send_with_redirects(session.client, &url, ACCEPT_GITHUB_JSON, &session.auth)
                .await
                .map_err(|failure| {
                    // The API URL, not a signed hop, is what an operator can retry by hand.
                    archive_error(TransferFailure {
                        url: url.to_string(),
                        reason: session.credential.redact(&failure.reason),
                    })
                })?;

        if !response.status().is_success() {
            let reason = describe_failure(response, session.credential).await;
            error!("Archive download failed for {}: {}", url, reason);
            return Err(FetchError::ArchiveFetchFailed {
                url: url.to_string(),
                reason,
            });
        }

        stream_to_file(response, &final_url, temp_path)
            .await
            .map_err(|e| match e {
                StreamError::Transfer(failure) => archive_error(TransferFailure {
                    url: url.to_string(),
                    reason: session.credential.redact(&failure.reason),
                }),
                StreamError::Io(err) => err,
            })
    }
}
