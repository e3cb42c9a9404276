use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Malformed source URL '{0}': expected https://github.com/<owner>/<repo>/<path> or https://github.com/<owner>/<repo>/releases/download/<tag>/<asset>")]
    MalformedLocator(String),

    #[error("No GitHub token available ({0}). Run 'gh auth login' or set HOMEBREW_GITHUB_API_TOKEN / GITHUB_TOKEN.")]
    MissingCredential(String),

    #[error("Private GitHub archive download failed from '{url}': {reason}. Check token: curl -sI -H 'Authorization: token YOUR_TOKEN' '{url}'")]
    ArchiveFetchFailed { url: String, reason: String },

    #[error("Release '{tag}' has no asset named '{asset}' (or the release does not exist)")]
    AssetNotFound { tag: String, asset: String },

    #[error("Private GitHub release download failed from '{url}': {reason}. Ensure the token has repo scope.")]
    ReleaseDownloadFailed { url: String, reason: String },

    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Failed to execute command: {0}")]
    CommandExec(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl FetchError {
    /// Stable name of the variant, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedLocator(_) => "malformed_locator",
            Self::MissingCredential(_) => "missing_credential",
            Self::ArchiveFetchFailed { .. } => "archive_fetch_failed",
            Self::AssetNotFound { .. } => "asset_not_found",
            Self::ReleaseDownloadFailed { .. } => "release_download_failed",
            Self::ChecksumMismatch { .. } => "checksum_mismatch",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Json(_) => "json",
            Self::Config(_) => "config",
            Self::Validation(_) => "validation",
            Self::CommandExec(_) => "command_exec",
            Self::Generic(_) => "generic",
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_failure_suggests_manual_check() {
        let err = FetchError::ArchiveFetchFailed {
            url: "https://api.github.com/repos/o/r/tarball/main".to_string(),
            reason: "HTTP 404".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("curl -sI -H 'Authorization: token YOUR_TOKEN'"));
        assert!(msg.contains("https://api.github.com/repos/o/r/tarball/main"));
        assert_eq!(err.kind(), "archive_fetch_failed");
    }

    #[test]
    fn asset_not_found_names_tag_and_asset() {
        let err = FetchError::AssetNotFound {
            tag: "v1.0.0".to_string(),
            asset: "c.zip".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("v1.0.0"));
        assert!(msg.contains("c.zip"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FetchError = io.into();
        assert_eq!(err.kind(), "io");
    }
}
