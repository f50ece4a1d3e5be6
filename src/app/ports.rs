use crate::artifact::{ArtifactRef, ArtifactVersion, FetchedArtifact};
use crate::error::Result;
use crate::packager::ArtifactPackage;
use crate::session::{RunOutcome, RunSession};

/// Versioned artifact store the cleaning step reads from and publishes to.
/// Calls are synchronous and block until the registry answers.
pub trait ArtifactRegistry {
    fn open_session(&self, job_type: &str, config: serde_json::Value) -> Result<RunSession>;

    /// Resolve `reference` to a readable local snapshot and record it as an
    /// input of the session.
    fn fetch(&self, session: &mut RunSession, reference: &ArtifactRef) -> Result<FetchedArtifact>;

    /// Upload the package; the registry assigns the version.
    fn publish(&self, session: &mut RunSession, package: &ArtifactPackage)
        -> Result<ArtifactVersion>;

    fn close_session(&self, session: RunSession, outcome: &RunOutcome) -> Result<()>;
}
