// tapfetch-common/src/locator.rs
//! Parses declared GitHub source URLs into a [`SourceLocator`].

use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{FetchError, Result};

const GITHUB_HOSTS: &[&str] = &["github.com", "www.github.com"];
const TARBALL_SUFFIX: &str = ".tar.gz";

/// Where an artifact lives on GitHub. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// Tarball of a branch, tag or commit, fetched through the API tarball endpoint.
    RepoArchive {
        owner: String,
        repo: String,
        git_ref: String,
    },
    /// A named file attached to a tagged release.
    ReleaseAsset {
        owner: String,
        repo: String,
        tag: String,
        asset_name: String,
    },
}

impl SourceLocator {
    pub fn parse(url_str: &str) -> Result<Self> {
        let url = Url::parse(url_str)
            .map_err(|_| FetchError::MalformedLocator(url_str.to_string()))?;
        // Credentials embedded in the URL are rejected and never echoed back.
        let has_userinfo = !url.username().is_empty() || url.password().is_some();
        let shown = if has_userinfo {
            let mut stripped = url.clone();
            let _ = stripped.set_username("");
            let _ = stripped.set_password(None);
            stripped.to_string()
        } else {
            url_str.to_string()
        };
        let malformed = || FetchError::MalformedLocator(shown.clone());

        if has_userinfo || url.scheme() != "https" {
            return Err(malformed());
        }
        match url.host_str() {
            Some(host) if GITHUB_HOSTS.contains(&host.to_ascii_lowercase().as_str()) => {}
            _ => return Err(malformed()),
        }

        // Decoded once here; the endpoint builders re-encode.
        let decoded = url
            .path_segments()
            .ok_or_else(malformed)?
            .map(|segment| {
                percent_decode_str(segment)
                    .decode_utf8()
                    .map(|name| name.into_owned())
                    .map_err(|_| malformed())
            })
            .collect::<Result<Vec<String>>>()?;
        let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
        if segments.len() < 3 || segments[..3].iter().any(|s| s.is_empty()) {
            return Err(malformed());
        }
        let owner = segments[0].to_string();
        let repo = segments[1].to_string();

        if let ["releases", "download", tag, asset_name] = &segments[2..] {
            if tag.is_empty() || asset_name.is_empty() {
                return Err(malformed());
            }
            return Ok(Self::ReleaseAsset {
                owner,
                repo,
                tag: tag.to_string(),
                asset_name: asset_name.to_string(),
            });
        }
        if segments[2..].starts_with(&["releases", "download"]) {
            return Err(malformed());
        }

        let path = segments[2..].join("/");
        let git_ref = ref_from_archive_path(&path).ok_or_else(malformed)?;
        Ok(Self::RepoArchive {
            owner,
            repo,
            git_ref,
        })
    }

    pub fn owner(&self) -> &str {
        match self {
            Self::RepoArchive { owner, .. } | Self::ReleaseAsset { owner, .. } => owner,
        }
    }

    pub fn repo(&self) -> &str {
        match self {
            Self::RepoArchive { repo, .. } | Self::ReleaseAsset { repo, .. } => repo,
        }
    }

    /// Default local file name for the artifact this locator names.
    pub fn file_name(&self) -> String {
        match self {
            Self::RepoArchive { repo, git_ref, .. } => {
                format!("{}-{}{}", repo, git_ref.replace('/', "-"), TARBALL_SUFFIX)
            }
            Self::ReleaseAsset { asset_name, .. } => asset_name.clone(),
        }
    }
}

/// `refs/heads/<name>.tar.gz` and `refs/tags/<name>.tar.gz` yield `<name>`; anything
/// else yields the base name without `.tar.gz`.
fn ref_from_archive_path(path: &str) -> Option<String> {
    for marker in ["refs/heads/", "refs/tags/"] {
        if let Some(idx) = path.find(marker) {
            let rest = &path[idx + marker.len()..];
            if let Some(name) = rest.strip_suffix(TARBALL_SUFFIX) {
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }

    let base = path.rsplit('/').next().unwrap_or(path);
    let git_ref = base.strip_suffix(TARBALL_SUFFIX).unwrap_or(base);
    if git_ref.is_empty() {
        None
    } else {
        Some(git_ref.to_string())
    }
}

impl FromStr for SourceLocator {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepoArchive {
                owner,
                repo,
                git_ref,
            } => write!(f, "{owner}/{repo}@{git_ref}"),
            Self::ReleaseAsset {
                owner,
                repo,
                tag,
                asset_name,
            } => write!(f, "{owner}/{repo}@{tag}:{asset_name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_ref(url: &str) -> String {
        match SourceLocator::parse(url).unwrap() {
            SourceLocator::RepoArchive { git_ref, .. } => git_ref,
            other => panic!("expected archive locator, got {other:?}"),
        }
    }

    #[test]
    fn head_and_tag_refs_are_extracted() {
        assert_eq!(
            archive_ref("https://github.com/shanberg/home-services/archive/refs/heads/main.tar.gz"),
            "main"
        );
        assert_eq!(
            archive_ref("https://github.com/shanberg/project-manager/archive/refs/tags/v0.1.0.tar.gz"),
            "v0.1.0"
        );
        assert_eq!(
            archive_ref("https://github.com/o/r/archive/refs/heads/feature/login.tar.gz"),
            "feature/login"
        );
    }

    #[test]
    fn other_paths_use_base_name() {
        assert_eq!(
            archive_ref("https://github.com/shanberg/home-services/archive/fce266c8029a55a049e7e545d9e1acb57008b516.tar.gz"),
            "fce266c8029a55a049e7e545d9e1acb57008b516"
        );
        assert_eq!(archive_ref("https://github.com/o/r/archive/v2"), "v2");
    }

    #[test]
    fn archive_locator_keeps_owner_and_repo() {
        let locator =
            SourceLocator::parse("https://github.com/shanberg/home-services/archive/refs/heads/main.tar.gz")
                .unwrap();
        assert_eq!(locator.owner(), "shanberg");
        assert_eq!(locator.repo(), "home-services");
        assert_eq!(locator.to_string(), "shanberg/home-services@main");
        assert_eq!(locator.file_name(), "home-services-main.tar.gz");
    }

    #[test]
    fn release_asset_fields_are_verbatim() {
        let locator = SourceLocator::parse(
            "https://github.com/shanberg/project-manager/releases/download/v0.1.6/project-manager-0.1.6.tar.gz",
        )
        .unwrap();
        assert_eq!(
            locator,
            SourceLocator::ReleaseAsset {
                owner: "shanberg".to_string(),
                repo: "project-manager".to_string(),
                tag: "v0.1.6".to_string(),
                asset_name: "project-manager-0.1.6.tar.gz".to_string(),
            }
        );
        assert_eq!(locator.file_name(), "project-manager-0.1.6.tar.gz");
        assert_eq!(
            locator.to_string(),
            "shanberg/project-manager@v0.1.6:project-manager-0.1.6.tar.gz"
        );
    }

    #[test]
    fn embedded_tokens_are_rejected_without_echo() {
        let err = SourceLocator::parse("https://ghp_secret@github.com/o/r/archive/main.tar.gz")
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedLocator(_)));
        assert!(!err.to_string().contains("ghp_secret"));
    }

    #[test]
    fn non_ascii_names_are_decoded() {
        assert_eq!(
            archive_ref("https://github.com/o/r/archive/refs/heads/fix-ü.tar.gz"),
            "fix-ü"
        );
        assert_eq!(
            archive_ref("https://github.com/o/r/archive/refs/tags/v1%2B%C3%A9.tar.gz"),
            "v1+é"
        );
        let locator =
            SourceLocator::parse("https://github.com/o/r/releases/download/v1/%C3%BCber%20tool.zip").unwrap();
        match locator {
            SourceLocator::ReleaseAsset { asset_name, .. } => assert_eq!(asset_name, "über tool.zip"),
            other => panic!("expected release locator, got {other:?}"),
        }
    }

    #[test]
    fn query_string_is_ignored() {
        let locator =
            SourceLocator::parse("https://github.com/o/r/releases/download/v1/Rider-v1.zip?raw=1").unwrap();
        assert_eq!(locator.file_name(), "Rider-v1.zip");
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for url in [
            "https://github.com/owner",
            "https://github.com/owner/",
            "https://github.com/owner/repo",
            "https://github.com/owner/repo/",
            "https://github.com//repo/archive/main.tar.gz",
            "http://github.com/o/r/archive/main.tar.gz",
            "https://gitlab.com/o/r/archive/main.tar.gz",
            "https://github.com/o/r/archive/.tar.gz",
            "https://github.com/o/r/releases/download//a.zip",
            "https://github.com/o/r/releases/download/v1/a.zip/extra",
            "https://github.com/o/r/archive/%FF.tar.gz",
            "not a url",
        ] {
            match SourceLocator::parse(url) {
                Err(FetchError::MalformedLocator(echo)) => assert_eq!(echo, url),
                other => panic!("expected MalformedLocator for {url}, got {other:?}"),
            }
        }
    }
}
