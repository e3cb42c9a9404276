// tapfetch-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use tracing::debug;

use super::error::{FetchError, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const PRIMARY_TOKEN_VAR: &str = "HOMEBREW_GITHUB_API_TOKEN";
pub const ALTERNATE_TOKEN_VAR: &str = "GITHUB_TOKEN";
const DEFAULT_CREDENTIAL_HELPER: &str = "gh";
const HANDOFF_FILENAME: &str = "tapfetch-github-token";
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// External command that prints a token on stdout, e.g. `gh auth token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHelper {
    pub program: String,
    pub args: Vec<String>,
}

impl CredentialHelper {
    pub fn gh() -> Self {
        Self {
            program: DEFAULT_CREDENTIAL_HELPER.to_string(),
            args: vec!["auth".to_string(), "token".to_string()],
        }
    }

    /// Splits a whitespace-separated command line such as `gh auth token`.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub api_base_url: String,
    pub github_api_token: Option<String>,
    pub github_token: Option<String>,
    pub credential_helper: Option<CredentialHelper>,
    pub handoff_path: PathBuf,
    pub download_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Config {
    /// Reads every environment input tapfetch uses. Nothing else in the workspace
    /// touches the process environment for configuration.
    pub fn load() -> Result<Self> {
        debug!("Loading tapfetch configuration");

        let root = match non_empty_var("TAPFETCH_ROOT") {
            Some(root) => PathBuf::from(root),
            None => BaseDirs::new()
                .map(|dirs| dirs.cache_dir().join("tapfetch"))
                .unwrap_or_else(|| env::temp_dir().join("tapfetch")),
        };
        debug!("Effective tapfetch root set to: {}", root.display());

        let api_base_url = non_empty_var("TAPFETCH_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let credential_helper = match env::var("TAPFETCH_CREDENTIAL_HELPER") {
            Ok(program) if program.trim().is_empty() => {
                debug!("Credential helper disabled via TAPFETCH_CREDENTIAL_HELPER");
                None
            }
            Ok(command_line) => CredentialHelper::from_command_line(&command_line),
            Err(_) => Some(CredentialHelper::gh()),
        };

        let handoff_path = non_empty_var("TAPFETCH_TOKEN_HANDOFF")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join(HANDOFF_FILENAME));

        let download_timeout =
            timeout_var("TAPFETCH_DOWNLOAD_TIMEOUT_SECS", DEFAULT_DOWNLOAD_TIMEOUT_SECS)?;
        let connect_timeout =
            timeout_var("TAPFETCH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;

        debug!("Configuration loaded successfully.");
        Ok(Self {
            root,
            api_base_url,
            github_api_token: non_empty_var(PRIMARY_TOKEN_VAR),
            github_token: non_empty_var(ALTERNATE_TOKEN_VAR),
            credential_helper,
            handoff_path,
            download_timeout,
            connect_timeout,
        })
    }

    /// A configuration rooted at `root` with no tokens and no helper. Used as a base
    /// for explicit construction.
    pub fn isolated(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            handoff_path: root.join(HANDOFF_FILENAME),
            root,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            github_api_token: None,
            github_token: None,
            credential_helper: None,
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    non_empty(env::var(name).ok())
}

/// Blank values count as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn timeout_var(name: &str, default_secs: u64) -> Result<Duration> {
    parse_timeout(name, env::var(name).ok(), default_secs)
}

fn parse_timeout(name: &str, value: Option<String>, default_secs: u64) -> Result<Duration> {
    match non_empty(value) {
        Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|e| {
            FetchError::Config(format!("{name} must be a whole number of seconds, got '{raw}': {e}"))
        }),
        None => Ok(Duration::from_secs(default_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_config_has_no_credentials() {
        let config = Config::isolated("/tmp/tapfetch-test");
        assert!(config.github_api_token.is_none());
        assert!(config.github_token.is_none());
        assert!(config.credential_helper.is_none());
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/tapfetch-test/cache"));
        assert!(config.handoff_path.starts_with("/tmp/tapfetch-test"));
    }

    #[test]
    fn api_base_url_drops_trailing_slash() {
        let mut config = Config::isolated("/tmp/x");
        config.api_base_url = "http://127.0.0.1:1234/".to_string();
        assert_eq!(config.api_base_url(), "http://127.0.0.1:1234");
    }

    #[test]
    fn helper_command_line_is_split() {
        let helper = CredentialHelper::from_command_line("  op read op://vault/github/token ").unwrap();
        assert_eq!(helper.program, "op");
        assert_eq!(helper.args, vec!["read", "op://vault/github/token"]);
        assert!(CredentialHelper::from_command_line("   ").is_none());
    }

    #[test]
    fn blank_values_count_as_unset() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("  \t ".to_string())), None);
        assert_eq!(non_empty(Some(" ghp_x \n".to_string())).as_deref(), Some("ghp_x"));
    }

    #[test]
    fn timeout_parses_whole_seconds() {
        assert_eq!(
            parse_timeout("T", Some(" 45 ".to_string()), 300).unwrap(),
            Duration::from_secs(45)
        );
    }

    #[test]
    fn blank_or_missing_timeout_uses_default() {
        assert_eq!(parse_timeout("T", None, 300).unwrap(), Duration::from_secs(300));
        assert_eq!(
            parse_timeout("T", Some("   ".to_string()), 30).unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn non_numeric_timeout_is_config_error() {
        for raw in ["ten", "1.5", "-3"] {
            match parse_timeout("TAPFETCH_DOWNLOAD_TIMEOUT_SECS", Some(raw.to_string()), 300) {
                Err(FetchError::Config(msg)) => {
                    assert!(msg.contains("TAPFETCH_DOWNLOAD_TIMEOUT_SECS"));
                    assert!(msg.contains(raw));
                }
                other => panic!("expected Config error for {raw}, got {other:?}"),
            }
        }
    }

    #[test]
    fn gh_helper_invokes_auth_token() {
        let helper = CredentialHelper::gh();
        assert_eq!(helper.program, "gh");
        assert_eq!(helper.args, vec!["auth", "token"]);
    }
}
