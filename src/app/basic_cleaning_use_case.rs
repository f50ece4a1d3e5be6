use serde::Serialize;
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::app::ports::ArtifactRegistry;
use crate::artifact::{ArtifactId, ArtifactVersion};
use crate::cleaning::{CleaningPipeline, CleaningSummary};
use crate::config::RunConfig;
use crate::constants::JOB_TYPE;
use crate::dataset::Table;
use crate::error::Result;
use crate::metrics::{time_stage, CleaningMetrics};
use crate::packager::ArtifactPackager;
use crate::run_state::{RunState, RunTracker};
use crate::session::{RunOutcome, RunSession};

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub input: ArtifactId,
    pub output: ArtifactVersion,
    pub summary: CleaningSummary,
    pub states: Vec<RunState>,
}

/// Fetch a raw snapshot, clean it, and publish the result with lineage.
/// Publishing is the final step; a failure anywhere before it leaves the
/// registry without a new version.
pub struct BasicCleaningUseCase {
    registry: Box<dyn ArtifactRegistry>,
}

impl BasicCleaningUseCase {
    pub fn new(registry: Box<dyn ArtifactRegistry>) -> Self {
        Self { registry }
    }

    pub fn run(&self, config: &RunConfig) -> Result<RunReport> {
        let mut session = self.registry.open_session(JOB_TYPE, config.to_json())?;
        let run_id = session.run_id();
        let span = info_span!("basic_cleaning", run_id = %run_id, input = %config.input);
        let _enter = span.enter();

        let mut tracker = RunTracker::new();
        match self.execute(config, &mut session, &mut tracker) {
            Ok((input, output, summary)) => {
                // Output is committed by now; a close failure only gets logged.
                if let Err(close_err) = self.registry.close_session(session, &RunOutcome::Finished) {
                    error!(error = %close_err, "failed to close run session");
                }
                info!(
                    "Success cleaning {} and uploading {}",
                    input, output.id
                );
                Ok(RunReport {
                    run_id,
                    input,
                    output,
                    summary,
                    states: tracker.history().to_vec(),
                })
            }
            Err(e) => {
                let stage = tracker.state();
                tracker.fail();
                CleaningMetrics::record_failure(stage, e.kind());
                error!(stage = %stage, error = %e, "cleaning run failed");
                let outcome = RunOutcome::Failed {
                    stage,
                    message: e.to_string(),
                };
                if let Err(close_err) = self.registry.close_session(session, &outcome) {
                    error!(error = %close_err, "failed to close run session");
                }
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        config: &RunConfig,
        session: &mut RunSession,
        tracker: &mut RunTracker,
    ) -> Result<(ArtifactId, ArtifactVersion, CleaningSummary)> {
        tracker.advance(RunState::Fetching)?;
        info!("Downloading input artifact {}", config.input);
        let (input, table) = {
            let _timing = time_stage(RunState::Fetching);
            let fetched = self.registry.fetch(session, &config.input)?;
            (fetched.id, Table::from_csv_path(&fetched.path)?)
        };

        info!(
            "Cleaning {} - removing outliers and changing last_review to datetime",
            input
        );
        let pipeline = CleaningPipeline::new(config.options.clone());
        let cleaned = pipeline.clean_tracked(table, tracker)?;

        tracker.advance(RunState::Packaging)?;
        info!("Saving as {} locally", config.output_artifact);
        let package = {
            let _timing = time_stage(RunState::Packaging);
            let packager = ArtifactPackager::new(
                &config.output_artifact,
                &config.output_type,
                &config.output_description,
            )?;
            packager.package(&cleaned.dataset, &input)?
        };

        tracker.advance(RunState::Publishing)?;
        info!("Uploading {} to the registry", config.output_artifact);
        let output = {
            let _timing = time_stage(RunState::Publishing);
            self.registry.publish(session, &package)?
        };
        CleaningMetrics::record_publish(output.deduplicated);

        tracker.advance(RunState::Done)?;
        Ok((input, output, cleaned.summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactRef, FetchedArtifact};
    use crate::cleaning::price::PriceRange;
    use crate::cleaning::CleaningOptions;
    use crate::error::{CleaningError, ErrorKind};
    use crate::packager::ArtifactPackage;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        published: Vec<(String, Vec<u8>)>,
        closed: Vec<RunOutcome>,
    }

    struct MockRegistry {
        snapshot: PathBuf,
        calls: Arc<Mutex<Calls>>,
        fail_close: bool,
    }

    impl ArtifactRegistry for MockRegistry {
        fn open_session(&self, job_type: &str, config: serde_json::Value) -> Result<RunSession> {
            Ok(RunSession::new(job_type, config))
        }

        fn fetch(&self, session: &mut RunSession, reference: &ArtifactRef) -> Result<FetchedArtifact> {
            let id = ArtifactId::new(reference.name.clone(), 7);
            session.record_use(id.clone());
            Ok(FetchedArtifact {
                id,
                path: self.snapshot.clone(),
                sha256: String::new(),
            })
        }

        fn publish(&self, _session: &mut RunSession, package: &ArtifactPackage) -> Result<ArtifactVersion> {
            let bytes = std::fs::read(package.path())?;
            self.calls
                .lock()
                .unwrap()
                .published
                .push((package.metadata.name.clone(), bytes));
            Ok(ArtifactVersion {
                id: ArtifactId::new(package.metadata.name.clone(), 1),
                sha256: package.metadata.sha256.clone(),
                deduplicated: false,
            })
        }

        fn close_session(&self, _session: RunSession, outcome: &RunOutcome) -> Result<()> {
            self.calls.lock().unwrap().closed.push(outcome.clone());
            if self.fail_close {
                return Err(CleaningError::Registry("catalog locked".to_string()));
            }
            Ok(())
        }
    }

    fn setup(csv: &str) -> (tempfile::TempDir, BasicCleaningUseCase, Arc<Mutex<Calls>>) {
        setup_with(csv, false)
    }

    fn setup_with(
        csv: &str,
        fail_close: bool,
    ) -> (tempfile::TempDir, BasicCleaningUseCase, Arc<Mutex<Calls>>) {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("sample.csv");
        std::fs::write(&snapshot, csv).unwrap();
        let calls = Arc::new(Mutex::new(Calls::default()));
        let registry = MockRegistry {
            snapshot,
            calls: calls.clone(),
            fail_close,
        };
        (dir, BasicCleaningUseCase::new(Box::new(registry)), calls)
    }

    fn config(min: f64, max: f64) -> RunConfig {
        RunConfig {
            input: "sample.csv".parse().unwrap(),
            output_artifact: "clean_sample.csv".to_string(),
            output_type: "clean_sample".to_string(),
            output_description: "cleaned".to_string(),
            options: CleaningOptions::new(PriceRange::new(min, max)),
        }
    }

    #[test]
    fn publishes_cleaned_csv_and_closes_session() {
        let (_dir, use_case, calls) =
            setup("id,price,last_review\n1,50,2019-01-01\n2,500,2019-05-21\n3,5000,\n");
        let report = use_case.run(&config(100.0, 1000.0)).unwrap();

        assert_eq!(report.input, ArtifactId::new("sample.csv", 7));
        assert_eq!(report.summary.output_rows, 1);
        assert_eq!(report.states.last(), Some(&RunState::Done));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.published.len(), 1);
        assert_eq!(calls.published[0].0, "clean_sample.csv");
        assert_eq!(calls.published[0].1, b"id,price,last_review\n2,500,2019-05-21\n");
        assert_eq!(calls.closed, vec![RunOutcome::Finished]);
    }

    #[test]
    fn schema_failure_skips_publish_and_marks_session_failed() {
        let (_dir, use_case, calls) = setup("id,cost\n1,50\n");
        let err = use_case.run(&config(0.0, 100.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);

        let calls = calls.lock().unwrap();
        assert!(calls.published.is_empty());
        match &calls.closed[..] {
            [RunOutcome::Failed { stage, message }] => {
                assert_eq!(*stage, RunState::Validating);
                assert!(message.contains("price"));
            }
            other => panic!("unexpected close calls: {other:?}"),
        }
    }

    #[test]
    fn parse_failure_skips_publish() {
        let (_dir, use_case, calls) = setup("price,last_review\n150,not-a-date\n");
        let err = use_case.run(&config(100.0, 1000.0)).unwrap_err();
        assert!(matches!(err, CleaningError::Parse { .. }));
        let calls = calls.lock().unwrap();
        assert!(calls.published.is_empty());
        assert!(matches!(
            calls.closed[0],
            RunOutcome::Failed {
                stage: RunState::DateNormalizing,
                ..
            }
        ));
    }

    #[test]
    fn close_failure_after_publish_still_reports_success() {
        let (_dir, use_case, calls) = setup_with("price,last_review\n150,2019-05-21\n", true);
        let report = use_case.run(&config(100.0, 1000.0)).unwrap();
        assert_eq!(report.output.id, ArtifactId::new("clean_sample.csv", 1));
        assert_eq!(report.states.last(), Some(&RunState::Done));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.published.len(), 1);
        assert_eq!(calls.closed, vec![RunOutcome::Finished]);
    }
}
