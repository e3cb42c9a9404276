// tapfetch-net/src/fetcher.rs
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Client;
use tapfetch_common::config::Config;
use tapfetch_common::credential::CredentialResolver;
use tapfetch_common::error::{FetchError, Result};
use tapfetch_common::locator::SourceLocator;
use tracing::{debug, error, info};

use crate::github::{ArchiveDownloader, ReleaseAssetDownloader, Session, SourceDownloader};
use crate::http::{authorization_header, build_http_client, discard_temp, temp_path_for};
use crate::validation::{sha256_file, verify_checksum};

/// States of a single fetch. `ResolvingReleaseMetadata` only occurs for release assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    ParsingLocator,
    ResolvingCredential,
    ResolvingReleaseMetadata,
    Downloading,
    Verifying,
    Done,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ParsingLocator => "parsing-locator",
            Self::ResolvingCredential => "resolving-credential",
            Self::ResolvingReleaseMetadata => "resolving-release-metadata",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Declared source URL, one of the two GitHub shapes.
    pub url: String,
    pub expected_sha256: Option<String>,
    /// Final artifact path. Only ever written by renaming a fully verified download.
    pub target: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub locator: SourceLocator,
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
    pub phases: Vec<FetchPhase>,
    /// The target already held a file with the expected checksum; nothing was fetched.
    pub reused: bool,
}

/// Resolves a declared source URL into an authenticated GitHub download. One fetch
/// runs at a time; nothing is retried.
pub struct AuthenticatedArchiveFetcher {
    config: Config,
    client: Client,
    credentials: CredentialResolver,
}

impl AuthenticatedArchiveFetcher {
    pub fn new(config: Config) -> Result<Self> {
        let client = build_http_client(&config)?;
        let credentials = CredentialResolver::new(&config);
        Ok(Self {
            config,
            client,
            credentials,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The process-lifetime credential cache this fetcher authenticates with.
    pub fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        let mut phases = Vec::new();
        match self.run(request, &mut phases).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let phase = phases.last().copied().unwrap_or(FetchPhase::ParsingLocator);
                error!(phase = %phase, kind = e.kind(), "Fetch failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, request: &FetchRequest, phases: &mut Vec<FetchPhase>) -> Result<FetchOutcome> {
        phases.push(FetchPhase::ParsingLocator);
        let locator = SourceLocator::parse(&request.url)?;
        debug!("[{}] {} -> {}", FetchPhase::ParsingLocator, request.url, locator);

        let target = request.target.as_path();
        if let Some(outcome) = self.reuse_existing(&locator, request, phases)? {
            return Ok(outcome);
        }

        phases.push(FetchPhase::ResolvingCredential);
        let (credential, source) = self.credentials.resolve_with_source()?;
        debug!("[{}] using token from {}", FetchPhase::ResolvingCredential, source);
        let session = Session {
            client: &self.client,
            api_base: self.config.api_base_url(),
            credential: &credential,
            auth: authorization_header(&credential)?,
        };

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                FetchError::Generic(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let temp_path = temp_path_for(target);
        discard_temp(&temp_path);
        debug!("Downloading to temporary path: {}", temp_path.display());

        let downloaded = match &locator {
            SourceLocator::RepoArchive {
                owner,
                repo,
                git_ref,
            } => {
                ArchiveDownloader {
                    owner,
                    repo,
                    git_ref,
                }
                .download(&session, &temp_path, phases)
                .await
            }
            SourceLocator::ReleaseAsset {
                owner,
                repo,
                tag,
                asset_name,
            } => {
                ReleaseAssetDownloader {
                    owner,
                    repo,
                    tag,
                    asset_name,
                }
                .download(&session, &temp_path, phases)
                .await
            }
        };
        let size_bytes = match downloaded {
            Ok(size) => size,
            Err(e) => {
                discard_temp(&temp_path);
                return Err(e);
            }
        };

        phases.push(FetchPhase::Verifying);
        let sha256 = match self.verify(&temp_path, request) {
            Ok(sha) => sha,
            Err(e) => {
                discard_temp(&temp_path);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, target) {
            discard_temp(&temp_path);
            return Err(FetchError::Generic(format!(
                "Failed to move temp file {} to {}: {}",
                temp_path.display(),
                target.display(),
                e
            )));
        }
        phases.push(FetchPhase::Done);
        info!("Fetched {} ({} bytes) to {}", locator, size_bytes, target.display());

        Ok(FetchOutcome {
            locator,
            path: target.to_path_buf(),
            sha256,
            size_bytes,
            phases: phases.clone(),
            reused: false,
        })
    }

    fn verify(&self, temp_path: &Path, request: &FetchRequest) -> Result<String> {
        match request.expected_sha256.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(expected) => {
                let sha = verify_checksum(temp_path, expected, &request.target)?;
                debug!("Checksum verified for temporary file: {}", temp_path.display());
                Ok(sha)
            }
            None => {
                tracing::warn!(
                    "Skipping checksum verification for {} - none provided.",
                    request.target.display()
                );
                sha256_file(temp_path)
            }
        }
    }

    /// A target that already matches the declared checksum is used as is. Without a
    /// declared checksum nothing is reused.
    fn reuse_existing(
        &self,
        locator: &SourceLocator,
        request: &FetchRequest,
        phases: &mut Vec<FetchPhase>,
    ) -> Result<Option<FetchOutcome>> {
        let expected = match request.expected_sha256.as_deref().map(str::trim) {
            Some(expected) if !expected.is_empty() => expected,
            _ => return Ok(None),
        };
        if !request.target.is_file() {
            return Ok(None);
        }
        match verify_checksum(&request.target, expected, &request.target) {
            Ok(sha256) => {
                debug!("Using valid existing file: {}", request.target.display());
                phases.push(FetchPhase::Verifying);
                phases.push(FetchPhase::Done);
                let size_bytes = fs::metadata(&request.target)?.len();
                Ok(Some(FetchOutcome {
                    locator: locator.clone(),
                    path: request.target.clone(),
                    sha256,
                    size_bytes,
                    phases: phases.clone(),
                    reused: true,
                }))
            }
            Err(e) => {
                debug!(
                    "Existing file {} does not match ({}). Redownloading.",
                    request.target.display(),
                    e
                );
                Ok(None)
            }
        }
    }
}
