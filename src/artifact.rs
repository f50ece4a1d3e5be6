//! Names, versions and references of registry artifacts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::LATEST_TAG;
use crate::error::{CleaningError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionSpec {
    Latest,
    Number(u32),
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => f.write_str(LATEST_TAG),
            VersionSpec::Number(n) => write!(f, "v{}", n),
        }
    }
}

/// `name`, `name:latest`, `name:v3` or `name:3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    pub version: VersionSpec,
}

impl FromStr for ArtifactRef {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, version) = match s.rsplit_once(':') {
            None => (s, VersionSpec::Latest),
            Some((name, tag)) => (name, parse_version_tag(s, tag)?),
        };
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

fn parse_version_tag(reference: &str, tag: &str) -> Result<VersionSpec> {
    if tag == LATEST_TAG {
        return Ok(VersionSpec::Latest);
    }
    let digits = tag.strip_prefix('v').unwrap_or(tag);
    digits
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .map(VersionSpec::Number)
        .ok_or_else(|| {
            CleaningError::Config(format!(
                "invalid version '{}' in artifact reference '{}'",
                tag, reference
            ))
        })
}

/// Artifact names are single path-free tokens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CleaningError::Config("artifact name is empty".to_string()));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '\\' || c == ':')
    {
        return Err(CleaningError::Config(format!(
            "artifact name '{}' must not contain whitespace, ':' or path separators",
            name
        )));
    }
    Ok(())
}

/// A resolved artifact version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId {
    pub name: String,
    pub version: u32,
}

impl ArtifactId {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:v{}", self.name, self.version)
    }
}

/// A snapshot made available locally by the registry. Read-only.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub id: ArtifactId,
    pub path: PathBuf,
    pub sha256: String,
}

/// Result of a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactVersion {
    pub id: ArtifactId,
    pub sha256: String,
    /// Content matched the newest existing version, so no version was added.
    pub deduplicated: bool,
}
