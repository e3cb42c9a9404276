// tapfetch-common/src/credential.rs
//! GitHub token resolution and the single-use hand-off file.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::{Config, CredentialHelper, ALTERNATE_TOKEN_VAR, PRIMARY_TOKEN_VAR};
use crate::error::{FetchError, Result};

const CLASSIC_PREFIX: &str = "ghp_";
const REDACTED: &str = "****";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScheme {
    /// Classic personal access token, sent as `token <value>`.
    Classic,
    /// Fine-grained or app token, sent as `Bearer <value>`.
    FineGrained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    PrimaryEnv,
    AlternateEnv,
    Helper,
    HandOff,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryEnv => write!(f, "{PRIMARY_TOKEN_VAR}"),
            Self::AlternateEnv => write!(f, "{ALTERNATE_TOKEN_VAR}"),
            Self::Helper => write!(f, "credential helper"),
            Self::HandOff => write!(f, "hand-off file"),
        }
    }
}

/// An opaque bearer token. Its value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Trims `raw`; returns `None` when nothing is left.
    pub fn new(raw: &str) -> Option<Self> {
        let token = raw.trim();
        if token.is_empty() {
            None
        } else {
            Some(Self {
                token: token.to_string(),
            })
        }
    }

    pub fn scheme(&self) -> TokenScheme {
        if self.token.starts_with(CLASSIC_PREFIX) {
            TokenScheme::Classic
        } else {
            TokenScheme::FineGrained
        }
    }

    /// Value for the HTTP `Authorization` header.
    pub fn authorization_value(&self) -> String {
        match self.scheme() {
            TokenScheme::Classic => format!("token {}", self.token),
            TokenScheme::FineGrained => format!("Bearer {}", self.token),
        }
    }

    /// Replaces every occurrence of the token in `text`.
    pub fn redact(&self, text: &str) -> String {
        text.replace(&self.token, REDACTED)
    }

    /// Raw token, for handing to a child process environment.
    pub fn expose(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme() {
            TokenScheme::Classic => "classic",
            TokenScheme::FineGrained => "fine-grained",
        };
        write!(f, "Credential({scheme}, {REDACTED})")
    }
}

/// Resolves a token once per process: primary env var, alternate env var, then the
/// credential helper. Environment values come from [`Config`], never from `std::env`.
pub struct CredentialResolver {
    primary: Option<String>,
    alternate: Option<String>,
    helper: Option<CredentialHelper>,
    handoff_path: PathBuf,
    resolved: OnceCell<(Credential, CredentialSource)>,
}

impl CredentialResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            primary: config.github_api_token.clone(),
            alternate: config.github_token.clone(),
            helper: config.credential_helper.clone(),
            handoff_path: config.handoff_path.clone(),
            resolved: OnceCell::new(),
        }
    }

    pub fn resolve(&self) -> Result<Credential> {
        self.resolve_with_source().map(|(credential, _)| credential)
    }

    pub fn resolve_with_source(&self) -> Result<(Credential, CredentialSource)> {
        self.resolved
            .get_or_try_init(|| self.resolve_uncached())
            .cloned()
    }

    /// Consuming-phase resolution: the hand-off file wins if present, and is deleted
    /// whether or not it could be read. Falls back to [`Self::resolve`].
    pub fn resolve_for_consumer(&self) -> Result<(Credential, CredentialSource)> {
        if let Some(found) = self.resolved.get() {
            take_handoff(&self.handoff_path)?;
            return Ok(found.clone());
        }
        if let Some(credential) = take_handoff(&self.handoff_path)? {
            debug!("Using credential from hand-off file");
            let entry = (credential, CredentialSource::HandOff);
            return Ok(self.resolved.get_or_init(|| entry).clone());
        }
        debug!("No hand-off file at {}; resolving directly", self.handoff_path.display());
        self.resolve_with_source()
    }

    /// Writes the resolved credential to the hand-off file for a later phase.
    pub fn persist_for_handoff(&self) -> Result<PathBuf> {
        let credential = self.resolve()?;
        write_handoff(&self.handoff_path, &credential)?;
        Ok(self.handoff_path.clone())
    }

    pub fn handoff_path(&self) -> &Path {
        &self.handoff_path
    }

    fn resolve_uncached(&self) -> Result<(Credential, CredentialSource)> {
        if let Some(credential) = self.primary.as_deref().and_then(Credential::new) {
            debug!("Using GitHub token from {PRIMARY_TOKEN_VAR}");
            return Ok((credential, CredentialSource::PrimaryEnv));
        }
        if let Some(credential) = self.alternate.as_deref().and_then(Credential::new) {
            debug!("Using GitHub token from {ALTERNATE_TOKEN_VAR}");
            return Ok((credential, CredentialSource::AlternateEnv));
        }
        match &self.helper {
            Some(helper) => {
                if let Some(credential) = run_credential_helper(helper)? {
                    debug!("Using GitHub token from '{}'", helper.program);
                    return Ok((credential, CredentialSource::Helper));
                }
                Err(FetchError::MissingCredential(format!(
                    "{PRIMARY_TOKEN_VAR} and {ALTERNATE_TOKEN_VAR} are empty and '{}' produced no token",
                    helper.program
                )))
            }
            None => Err(FetchError::MissingCredential(format!(
                "{PRIMARY_TOKEN_VAR} and {ALTERNATE_TOKEN_VAR} are empty and no credential helper is configured"
            ))),
        }
    }
}

/// Runs the helper if it is on the search path. A missing program, non-zero exit or
/// empty output all mean "no token".
fn run_credential_helper(helper: &CredentialHelper) -> Result<Option<Credential>> {
    let program = match which::which(&helper.program) {
        Ok(path) => path,
        Err(e) => {
            debug!("Credential helper '{}' not found on PATH: {}", helper.program, e);
            return Ok(None);
        }
    };
    debug!("Running credential helper {} {:?}", program.display(), helper.args);

    let output = Command::new(&program)
        .args(&helper.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            FetchError::CommandExec(format!("Failed to run {}: {}", program.display(), e))
        })?;

    if !output.status.success() {
        debug!(
            "Credential helper exited with status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Ok(None);
    }
    Ok(Credential::new(&String::from_utf8_lossy(&output.stdout)))
}

/// Writes `credential` to `path` via a sibling temp file and rename. The file is
/// created owner-read/write only.
pub fn write_handoff(path: &Path, credential: &Credential) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(credential.expose().as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| FetchError::from(e.error))?;
    debug!("Wrote credential hand-off file {}", path.display());
    Ok(())
}

/// Reads and deletes the hand-off file. Deletion is attempted even when the read
/// fails. `Ok(None)` when the file does not exist.
pub fn take_handoff(path: &Path) -> Result<Option<Credential>> {
    let read = fs::read_to_string(path);
    if let Err(e) = &read {
        if e.kind() == io::ErrorKind::NotFound {
            return Ok(None);
        }
    }

    match fs::remove_file(path) {
        Ok(()) => debug!("Removed credential hand-off file {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Could not remove credential hand-off file {}: {}",
            path.display(),
            e
        ),
    }

    Ok(Credential::new(&read?))
}
