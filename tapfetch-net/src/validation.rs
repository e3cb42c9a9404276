// tapfetch-net/src/validation.rs
use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use tapfetch_common::error::{FetchError, Result};
use url::{Host, Url};

/// Hex-encoded SHA-256 of the file at `path`.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let bytes_copied = io::copy(&mut file, &mut hasher)?;
    let actual = hex::encode(hasher.finalize());
    tracing::debug!(
        "Calculated SHA256: {} ({} bytes read) for {}",
        actual,
        bytes_copied,
        path.display()
    );
    Ok(actual)
}

/// Checks the file against `expected` (hex, case-insensitive). `reported_path` is the
/// path named in a mismatch error, which may differ from the temporary file hashed.
pub fn verify_checksum(path: &Path, expected: &str, reported_path: &Path) -> Result<String> {
    let actual = sha256_file(path)?;
    tracing::debug!("Expected SHA256:   {}", expected);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(actual)
    } else {
        Err(FetchError::ChecksumMismatch {
            path: reported_path.to_path_buf(),
            expected: expected.trim().to_ascii_lowercase(),
            actual,
        })
    }
}

/// Validates a URL, ensuring it uses the HTTPS scheme. Plain HTTP is only accepted
/// for loopback hosts.
pub fn validate_url(url: &Url) -> Result<()> {
    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(url) => Ok(()),
        other => Err(FetchError::Validation(format!(
            "Invalid URL scheme for '{}': Must be https, but got '{}'",
            display_url(url),
            other
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

/// URL without query or fragment, safe for logs and error messages (signed storage
/// URLs carry their signature in the query).
pub fn display_url(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.set_fragment(None);
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    // printf 'hello' | shasum -a 256
    const HELLO_SHA: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn checksum_matches_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello");
        fs::write(&path, b"hello").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), HELLO_SHA);
        verify_checksum(&path, &HELLO_SHA.to_ascii_uppercase(), &path).unwrap();
    }

    #[test]
    fn checksum_mismatch_reports_final_path() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join(".a.download");
        let target = dir.path().join("a");
        fs::write(&temp, b"hello!").unwrap();
        match verify_checksum(&temp, HELLO_SHA, &target).unwrap_err() {
            FetchError::ChecksumMismatch {
                path,
                expected,
                actual,
            } => {
                assert_eq!(path, target);
                assert_eq!(expected, HELLO_SHA);
                assert_ne!(actual, HELLO_SHA);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn only_https_or_loopback_http() {
        validate_url(&Url::parse("https://api.github.com/repos").unwrap()).unwrap();
        validate_url(&Url::parse("http://127.0.0.1:8080/x").unwrap()).unwrap();
        validate_url(&Url::parse("http://localhost/x").unwrap()).unwrap();
        assert!(matches!(
            validate_url(&Url::parse("http://example.com/x").unwrap()),
            Err(FetchError::Validation(_))
        ));
        assert!(validate_url(&Url::parse("ftp://127.0.0.1/x").unwrap()).is_err());
    }

    #[test]
    fn display_url_drops_signature() {
        let url = Url::parse("https://objects.githubusercontent.com/a/b?X-Amz-Signature=abc#frag")
            .unwrap();
        assert_eq!(display_url(&url), "https://objects.githubusercontent.com/a/b");
    }
}
