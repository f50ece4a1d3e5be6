use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::artifact::ArtifactId;
use crate::error::Result;
use crate::packager::ArtifactMetadata;
use crate::session::{RunOutcome, RunSession};

/// One stored artifact version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRow {
    pub id: ArtifactId,
    pub artifact_type: String,
    pub description: String,
    pub file_name: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub row_count: u64,
    pub run_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRow {
    pub run_id: String,
    pub job_type: String,
    pub status: String,
    pub failed_stage: Option<String>,
    pub error: Option<String>,
}

/// SQLite catalog of runs, artifact versions and lineage.
pub struct RegistryMeta {
    conn: Connection,
}

const VERSION_COLUMNS: &str = "name, version, artifact_type, description, file_name, sha256, \
                               size_bytes, row_count, run_id, created_at";

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        id: ArtifactId::new(row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32),
        artifact_type: row.get(2)?,
        description: row.get(3)?,
        file_name: row.get(4)?,
        sha256: row.get(5)?,
        size_bytes: row.get::<_, i64>(6)? as u64,
        row_count: row.get::<_, i64>(7)? as u64,
        run_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl RegistryMeta {
    pub fn open_at_root<P: AsRef<Path>>(registry_root: P) -> Result<Self> {
        let db_path = registry_root.as_ref().join("registry.db");
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS runs (
                run_id        TEXT PRIMARY KEY,
                job_type      TEXT NOT NULL,
                config        TEXT NOT NULL,
                status        TEXT NOT NULL,
                started_at    TEXT NOT NULL,
                finished_at   TEXT,
                failed_stage  TEXT,
                error         TEXT
            );
            CREATE TABLE IF NOT EXISTS artifact_versions (
                name           TEXT NOT NULL,
                version        INTEGER NOT NULL,
                artifact_type  TEXT NOT NULL,
                description    TEXT NOT NULL,
                file_name      TEXT NOT NULL,
                sha256         TEXT NOT NULL,
                size_bytes     INTEGER NOT NULL,
                row_count      INTEGER NOT NULL,
                run_id         TEXT,
                created_at     TEXT NOT NULL,
                PRIMARY KEY (name, version)
            );
            CREATE TABLE IF NOT EXISTS lineage (
                output_name     TEXT NOT NULL,
                output_version  INTEGER NOT NULL,
                input_name      TEXT NOT NULL,
                input_version   INTEGER NOT NULL,
                run_id          TEXT,
                PRIMARY KEY (output_name, output_version, input_name, input_version)
            );
            CREATE TABLE IF NOT EXISTS run_inputs (
                run_id   TEXT NOT NULL,
                name     TEXT NOT NULL,
                version  INTEGER NOT NULL,
                PRIMARY KEY (run_id, name, version)
            );
            CREATE TABLE IF NOT EXISTS run_outputs (
                run_id   TEXT NOT NULL,
                name     TEXT NOT NULL,
                version  INTEGER NOT NULL,
                PRIMARY KEY (run_id, name, version)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    // Runs
    pub fn insert_run(&self, session: &RunSession) -> Result<()> {
        self.conn.execute(
            "INSERT INTO runs (run_id, job_type, config, status, started_at) VALUES (?1, ?2, ?3, 'running', ?4)",
            params![
                session.run_id().to_string(),
                session.job_type(),
                serde_json::to_string(session.config())?,
                session.started_at().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str, outcome: &RunOutcome) -> Result<()> {
        let (stage, error) = match outcome {
            RunOutcome::Finished => (None, None),
            RunOutcome::Failed { stage, message } => (Some(stage.as_str()), Some(message.as_str())),
        };
        self.conn.execute(
            "UPDATE runs SET status = ?2, finished_at = ?3, failed_stage = ?4, error = ?5 WHERE run_id = ?1",
            params![run_id, outcome.status(), Utc::now().to_rfc3339(), stage, error],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<RunRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT run_id, job_type, status, failed_stage, error FROM runs WHERE run_id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRow {
                        run_id: row.get(0)?,
                        job_type: row.get(1)?,
                        status: row.get(2)?,
                        failed_stage: row.get(3)?,
                        error: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Runs of `job_type`, oldest first.
    pub fn runs(&self, job_type: &str) -> Result<Vec<RunRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, job_type, status, failed_stage, error FROM runs
             WHERE job_type = ?1 ORDER BY started_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![job_type], |row| {
                Ok(RunRow {
                    run_id: row.get(0)?,
                    job_type: row.get(1)?,
                    status: row.get(2)?,
                    failed_stage: row.get(3)?,
                    error: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn record_run_input(&self, run_id: &str, id: &ArtifactId) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO run_inputs (run_id, name, version) VALUES (?1, ?2, ?3)",
            params![run_id, id.name, id.version as i64],
        )?;
        Ok(())
    }

    pub fn run_inputs(&self, run_id: &str) -> Result<Vec<ArtifactId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, version FROM run_inputs WHERE run_id = ?1 ORDER BY name, version")?;
        let ids = stmt
            .query_map(params![run_id], |row| {
                Ok(ArtifactId::new(row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    // Versions
    pub fn latest(&self, name: &str) -> Result<Option<VersionRow>> {
        let sql = format!(
            "SELECT {} FROM artifact_versions WHERE name = ?1 ORDER BY version DESC LIMIT 1",
            VERSION_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![name], version_from_row)
            .optional()?)
    }

    pub fn get(&self, name: &str, version: u32) -> Result<Option<VersionRow>> {
        let sql = format!(
            "SELECT {} FROM artifact_versions WHERE name = ?1 AND version = ?2",
            VERSION_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![name, version as i64], version_from_row)
            .optional()?)
    }

    pub fn versions(&self, name: &str) -> Result<Vec<VersionRow>> {
        let sql = format!(
            "SELECT {} FROM artifact_versions WHERE name = ?1 ORDER BY version ASC",
            VERSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![name], version_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn lineage_of(&self, id: &ArtifactId) -> Result<Vec<ArtifactId>> {
        let mut stmt = self.conn.prepare(
            "SELECT input_name, input_version FROM lineage
             WHERE output_name = ?1 AND output_version = ?2
             ORDER BY input_name, input_version",
        )?;
        let ids = stmt
            .query_map(params![id.name, id.version as i64], |row| {
                Ok(ArtifactId::new(row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Register a new version of `metadata.name`, or reuse the newest one when
    /// its digest, type and description are all identical. Lineage and run output rows are written in the
    /// same transaction. Returns the version and whether it was reused.
    pub fn publish_version(
        &self,
        metadata: &ArtifactMetadata,
        lineage: &[ArtifactId],
        run_id: Option<&str>,
    ) -> Result<(ArtifactId, bool)> {
        let tx = self.conn.unchecked_transaction()?;

        let newest: Option<(i64, String, String, String)> = tx
            .query_row(
                "SELECT version, sha256, artifact_type, description FROM artifact_versions
                 WHERE name = ?1 ORDER BY version DESC LIMIT 1",
                params![metadata.name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let (version, deduplicated) = match newest {
            Some((version, sha, artifact_type, description))
                if sha == metadata.sha256
                    && artifact_type == metadata.artifact_type
                    && description == metadata.description =>
            {
                (version, true)
            }
            Some((version, ..)) => (version + 1, false),
            None => (1, false),
        };

        if !deduplicated {
            tx.execute(
                "INSERT INTO artifact_versions (name, version, artifact_type, description, file_name, sha256, size_bytes, row_count, run_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    metadata.name,
                    version,
                    metadata.artifact_type,
                    metadata.description,
                    metadata.file_name,
                    metadata.sha256,
                    metadata.size_bytes as i64,
                    metadata.row_count as i64,
                    run_id,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }

        for input in lineage {
            tx.execute(
                "INSERT OR IGNORE INTO lineage (output_name, output_version, input_name, input_version, run_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![metadata.name, version, input.name, input.version as i64, run_id],
            )?;
        }
        if let Some(run_id) = run_id {
            tx.execute(
                "INSERT OR IGNORE INTO run_outputs (run_id, name, version) VALUES (?1, ?2, ?3)",
                params![run_id, metadata.name, version],
            )?;
        }

        tx.commit()?;
        Ok((ArtifactId::new(metadata.name.clone(), version as u32), deduplicated))
    }
}
