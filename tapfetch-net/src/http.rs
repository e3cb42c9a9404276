use std::fs;
use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LOCATION, USER_AGENT};
use reqwest::{Client, Response};
use tapfetch_common::config::Config;
use tapfetch_common::credential::Credential;
use tapfetch_common::error::{FetchError, Result};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::validation::{display_url, validate_url};

const MAX_REDIRECTS: usize = 10;
const USER_AGENT_STRING: &str = "tapfetch (Rust; private GitHub downloads for Homebrew taps)";
const GITHUB_API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Redirects are never followed by reqwest itself; see [`send_with_redirects`].
pub fn build_http_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    Client::builder()
        .timeout(config.download_timeout)
        .connect_timeout(config.connect_timeout)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| FetchError::Generic(format!("Failed to build HTTP client: {e}")))
}

/// `Authorization` header value for `credential`, marked sensitive so it is never
/// printed by reqwest's `Debug` output.
pub fn authorization_header(credential: &Credential) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&credential.authorization_value()).map_err(|_| {
        FetchError::Validation(
            "GitHub token contains characters that are not allowed in an HTTP header"
                .to_string(),
        )
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// A failed exchange: which URL (already safe to display) and why.
#[derive(Debug, Clone)]
pub struct TransferFailure {
    pub url: String,
    pub reason: String,
}

impl TransferFailure {
    fn new(url: &Url, reason: impl Into<String>) -> Self {
        Self {
            url: display_url(url),
            reason: reason.into(),
        }
    }
}

/// Error while writing a response body to disk.
#[derive(Debug)]
pub enum StreamError {
    Transfer(TransferFailure),
    Io(FetchError),
}

/// GETs `start`, following redirects by hand. `Authorization` and the API version
/// header go only to the origin of `start`; hops to any other origin (such as a
/// signed storage URL) are sent without them. `Accept` is kept on every hop.
///
/// Returns the first non-redirect response whatever its status.
pub async fn send_with_redirects(
    client: &Client,
    start: &Url,
    accept: &str,
    auth: &HeaderValue,
) -> std::result::Result<(Url, Response), TransferFailure> {
    let origin = start.origin();
    let mut current = start.clone();

    for _ in 0..=MAX_REDIRECTS {
        validate_url(&current).map_err(|e| TransferFailure::new(&current, e.to_string()))?;

        let mut request = client.get(current.clone()).header(ACCEPT, accept);
        if current.origin() == origin {
            request = request
                .header(AUTHORIZATION, auth.clone())
                .header(GITHUB_API_VERSION_HEADER, GITHUB_API_VERSION);
        } else {
            debug!(
                "Sending request to {} without Authorization (cross-origin)",
                display_url(&current)
            );
        }

        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            debug!("HTTP request failed for {}: {}", display_url(&current), e);
            TransferFailure::new(&current, e.to_string())
        })?;
        let status = response.status();
        debug!("Received HTTP status: {} for {}", status, display_url(&current));

        if !status.is_redirection() {
            return Ok((current, response));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                TransferFailure::new(&current, format!("HTTP {status} without a Location header"))
            })?;
        let next = current.join(location).map_err(|e| {
            TransferFailure::new(&current, format!("Invalid redirect location: {e}"))
        })?;
        debug!("Following {} redirect to {}", status, display_url(&next));
        current = next;
    }

    Err(TransferFailure::new(
        &current,
        format!("Too many redirects (more than {MAX_REDIRECTS})"),
    ))
}

/// Builds `HTTP <status>: <body excerpt>` for a failed response, with the token
/// redacted from the body.
pub async fn describe_failure(response: Response, credential: &Credential) -> String {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read response body".to_string());
    let body = credential.redact(body.trim());
    let excerpt: String = body.chars().take(200).collect();
    if excerpt.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {excerpt}")
    }
}

/// Temporary download path next to `final_path`: `.<name>.download`.
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let temp_filename = format!(
        ".{}.download",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    final_path.with_file_name(temp_filename)
}

/// Removes a stale temporary file, logging rather than failing.
pub fn discard_temp(temp_path: &Path) {
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(temp_path) {
            warn!(
                "Could not remove temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }
}

/// Streams `response`'s body into `temp_path` chunk by chunk. Returns bytes written.
pub async fn stream_to_file(
    mut response: Response,
    source: &Url,
    temp_path: &Path,
) -> std::result::Result<u64, StreamError> {
    let mut temp_file = TokioFile::create(temp_path).await.map_err(|e| {
        StreamError::Io(FetchError::Generic(format!(
            "Failed to create temp file {}: {}",
            temp_path.display(),
            e
        )))
    })?;

    let mut written: u64 = 0;
    loop {
        let chunk = response.chunk().await.map_err(|e| {
            StreamError::Transfer(TransferFailure::new(
                source,
                format!("Failed to read response body: {}", e.without_url()),
            ))
        })?;
        let Some(chunk) = chunk else { break };
        temp_file.write_all(&chunk).await.map_err(|e| {
            StreamError::Io(FetchError::Generic(format!(
                "Failed to write download stream to {}: {}",
                temp_path.display(),
                e
            )))
        })?;
        written += chunk.len() as u64;
    }
    temp_file
        .flush()
        .await
        .map_err(|e| StreamError::Io(FetchError::from(e)))?;
    drop(temp_file);
    debug!(
        "Finished writing {} bytes to temp file {}",
        written,
        temp_path.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_is_hidden_sibling() {
        let temp = temp_path_for(Path::new("/cache/pm.tar.gz"));
        assert_eq!(temp, PathBuf::from("/cache/.pm.tar.gz.download"));
    }

    #[test]
    fn authorization_header_is_sensitive() {
        let credential = Credential::new("github_pat_abc").unwrap();
        let value = authorization_header(&credential).unwrap();
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().unwrap(), "Bearer github_pat_abc");
    }

    #[test]
    fn client_builds_from_isolated_config() {
        let config = Config::isolated(std::env::temp_dir());
        build_http_client(&config).unwrap();
    }
}
