use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::app::ports::ArtifactRegistry;
use crate::artifact::{ArtifactId, ArtifactRef, ArtifactVersion, FetchedArtifact, VersionSpec};
use crate::error::{CleaningError, Result};
use crate::gateway::cas_fs;
use crate::infra::registry_meta::{RegistryMeta, VersionRow};
use crate::packager::{sha256_hex, ArtifactPackage};
use crate::session::{RunOutcome, RunSession};

/// Filesystem-backed registry: blobs under `<root>/cas`, catalog in
/// `<root>/registry.db`.
pub struct LocalRegistry {
    root: PathBuf,
    meta: RegistryMeta,
}

impl LocalRegistry {
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("cas"))?;
        let meta = RegistryMeta::open_at_root(&root)?;
        Ok(Self { root, meta })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &RegistryMeta {
        &self.meta
    }

    fn cas_root(&self) -> PathBuf {
        self.root.join("cas")
    }

    pub fn resolve(&self, reference: &ArtifactRef) -> Result<VersionRow> {
        let row = match reference.version {
            VersionSpec::Latest => self.meta.latest(&reference.name)?,
            VersionSpec::Number(n) => self.meta.get(&reference.name, n)?,
        };
        row.ok_or_else(|| CleaningError::NotFound(reference.to_string()))
    }

    /// Publish a file outside of any run, e.g. to seed the raw dataset.
    pub fn ingest(
        &self,
        path: &Path,
        name: &str,
        artifact_type: &str,
        description: &str,
    ) -> Result<ArtifactVersion> {
        let package = ArtifactPackage::from_existing_file(path, name, artifact_type, description)?;
        self.store(&package, &[], None)
    }

    /// All versions of `name` with their lineage, oldest first.
    pub fn versions(&self, name: &str) -> Result<Vec<(VersionRow, Vec<ArtifactId>)>> {
        self.meta
            .versions(name)?
            .into_iter()
            .map(|row| -> Result<(VersionRow, Vec<ArtifactId>)> {
                let lineage = self.meta.lineage_of(&row.id)?;
                Ok((row, lineage))
            })
            .collect()
    }

    fn store(
        &self,
        package: &ArtifactPackage,
        lineage: &[ArtifactId],
        run_id: Option<&str>,
    ) -> Result<ArtifactVersion> {
        let bytes = fs::read(package.path()).map_err(|e| {
            CleaningError::Registry(format!("cannot read {}: {}", package.path().display(), e))
        })?;
        let sha256 = sha256_hex(&bytes);
        if sha256 != package.metadata.sha256 {
            return Err(CleaningError::Registry(format!(
                "{} changed after packaging (expected sha256 {}, found {})",
                package.path().display(),
                package.metadata.sha256,
                sha256
            )));
        }
        cas_fs::write_cas(&self.cas_root(), &bytes)?;
        let (id, deduplicated) = self
            .meta
            .publish_version(&package.metadata, lineage, run_id)?;
        if deduplicated {
            info!(artifact = %id, "content unchanged; reusing existing version");
        } else {
            info!(artifact = %id, payload_ref = %cas_fs::payload_ref(&sha256), "stored new version");
        }
        Ok(ArtifactVersion {
            id,
            sha256,
            deduplicated,
        })
    }
}

impl ArtifactRegistry for LocalRegistry {
    fn open_session(&self, job_type: &str, config: serde_json::Value) -> Result<RunSession> {
        let session = RunSession::new(job_type, config);
        self.meta.insert_run(&session)?;
        info!(run_id = %session.run_id(), job_type, "run session opened");
        Ok(session)
    }

    fn fetch(&self, session: &mut RunSession, reference: &ArtifactRef) -> Result<FetchedArtifact> {
        let row = self.resolve(reference)?;
        let path = cas_fs::verified_path(&self.cas_root(), &row.sha256)?;
        self.meta
            .record_run_input(&session.run_id().to_string(), &row.id)?;
        session.record_use(row.id.clone());
        info!(artifact = %row.id, path = %path.display(), "fetched artifact");
        Ok(FetchedArtifact {
            id: row.id,
            path,
            sha256: row.sha256,
        })
    }

    fn publish(&self, session: &mut RunSession, package: &ArtifactPackage) -> Result<ArtifactVersion> {
        let mut lineage = package.metadata.lineage.clone();
        for used in session.used_artifacts() {
            if !lineage.contains(used) {
                lineage.push(used.clone());
            }
        }
        let run_id = session.run_id().to_string();
        self.store(package, &lineage, Some(&run_id))
    }

    fn close_session(&self, session: RunSession, outcome: &RunOutcome) -> Result<()> {
        let run_id = session.run_id().to_string();
        self.meta.finish_run(&run_id, outcome)?;
        match outcome {
            RunOutcome::Finished => info!(run_id = %run_id, "run session closed"),
            RunOutcome::Failed { stage, message } => {
                warn!(run_id = %run_id, stage = %stage, error = %message, "run session closed as failed")
            }
        }
        Ok(())
    }
}
