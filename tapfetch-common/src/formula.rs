// tapfetch-common/src/formula.rs
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FetchError, Result};
use crate::locator::SourceLocator;

/// The download-relevant part of a tap formula.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Formula {
    pub name: String,
    pub version: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl Formula {
    pub fn from_json(raw: &str) -> Result<Self> {
        let formula: Formula = serde_json::from_str(raw)?;
        formula.validate()?;
        Ok(formula)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading formula manifest from {}", path.display());
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("name", &self.name), ("version", &self.version), ("url", &self.url)] {
            if value.trim().is_empty() {
                return Err(FetchError::Validation(format!(
                    "Formula field '{field}' must not be empty"
                )));
            }
        }
        if let Some(sha) = &self.sha256 {
            if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(FetchError::Validation(format!(
                    "Formula '{}' has an invalid sha256 '{}': expected 64 hex characters",
                    self.name, sha
                )));
            }
        }
        Ok(())
    }

    pub fn locator(&self) -> Result<SourceLocator> {
        SourceLocator::parse(&self.url)
    }

    /// `<name>-<version>-<locator file name>`.
    pub fn artifact_file_name(&self) -> Result<String> {
        let locator = self.locator()?;
        Ok(format!("{}-{}-{}", self.name, self.version, locator.file_name()))
    }
}
