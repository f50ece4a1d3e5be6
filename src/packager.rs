use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

use crate::artifact::{validate_name, ArtifactId};
use crate::dataset::Dataset;
use crate::error::Result;

/// Metadata the registry stores alongside the published file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMetadata {
    pub name: String,
    pub artifact_type: String,
    pub description: String,
    pub file_name: String,
    pub lineage: Vec<ArtifactId>,
    pub row_count: usize,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Serialized dataset ready for publish. The scratch directory holding the
/// file is removed when the package is dropped.
#[derive(Debug)]
pub struct ArtifactPackage {
    pub metadata: ArtifactMetadata,
    path: PathBuf,
    _scratch: Option<TempDir>,
}

impl ArtifactPackage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wrap a file that already exists on disk, e.g. a raw snapshot being ingested.
    pub fn from_existing_file(
        path: &Path,
        name: &str,
        artifact_type: &str,
        description: &str,
    ) -> Result<Self> {
        validate_name(name)?;
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let row_count = csv::Reader::from_reader(bytes.as_slice()).records().count();
        Ok(Self {
            metadata: ArtifactMetadata {
                name: name.to_string(),
                artifact_type: artifact_type.to_string(),
                description: description.to_string(),
                file_name,
                lineage: Vec::new(),
                row_count,
                sha256: sha256_hex(&bytes),
                size_bytes: bytes.len() as u64,
            },
            path: path.to_path_buf(),
            _scratch: None,
        })
    }
}

pub struct ArtifactPackager {
    name: String,
    artifact_type: String,
    description: String,
}

impl ArtifactPackager {
    pub fn new(name: &str, artifact_type: &str, description: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            artifact_type: artifact_type.to_string(),
            description: description.to_string(),
        })
    }

    /// File name the CSV is written under; the artifact name itself when it
    /// already carries a `.csv` extension.
    pub fn file_name(&self) -> String {
        if self.name.to_ascii_lowercase().ends_with(".csv") {
            self.name.clone()
        } else {
            format!("{}.csv", self.name)
        }
    }

    #[tracing::instrument(level = "info", skip(self, dataset), fields(name = %self.name, rows = dataset.len()))]
    pub fn package(&self, dataset: &Dataset, input: &ArtifactId) -> Result<ArtifactPackage> {
        let bytes = dataset.to_csv_bytes()?;
        let scratch = tempfile::Builder::new()
            .prefix("basic_cleaning-")
            .tempdir()?;
        let path = scratch.path().join(self.file_name());
        fs::write(&path, &bytes)?;

        let metadata = ArtifactMetadata {
            name: self.name.clone(),
            artifact_type: self.artifact_type.clone(),
            description: self.description.clone(),
            file_name: self.file_name(),
            lineage: vec![input.clone()],
            row_count: dataset.len(),
            sha256: sha256_hex(&bytes),
            size_bytes: bytes.len() as u64,
        };
        info!(path = %path.display(), sha256 = %metadata.sha256, "saved cleaned dataset locally");
        Ok(ArtifactPackage {
            metadata,
            path,
            _scratch: Some(scratch),
        })
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
