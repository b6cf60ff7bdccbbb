//! Read-only access to the jobs tracked by SbatchMan.
//!
//! SbatchMan keeps its state in a SQLite database with three tables that
//! matter here: `clusters`, `configs` (one per cluster) and `jobs` (one per
//! config). Each job row carries the directory its stdout was captured to.

use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle state of a job as recorded by the job manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Submitting,
    Queued,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
    /// Anything this tool doesn't know about, kept verbatim.
    Other(String),
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUBMITTING" => JobStatus::Submitting,
            "QUEUED" => JobStatus::Queued,
            "RUNNING" => JobStatus::Running,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            "TIMEOUT" => JobStatus::Timeout,
            "CANCELLED" => JobStatus::Cancelled,
            _ => JobStatus::Other(s.to_string()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Submitting => "SUBMITTING",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Timeout => "TIMEOUT",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Other(s) => s,
        };
        f.write_str(s)
    }
}

/// One job as seen by the report.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    /// Name of the job's configuration, e.g. `8_threads`.
    pub config_name: String,
    /// Free-form job label, e.g. `double_100000`.
    pub tag: String,
    pub cluster: String,
    pub status: JobStatus,
    pub stdout_path: PathBuf,
}

impl JobRecord {
    /// Read the captured stdout of this job.
    pub fn stdout(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.stdout_path)
    }
}

/// Source of job records.
pub trait JobSource {
    /// Jobs whose status is one of `statuses`, restricted to `cluster` when given.
    fn jobs_list(
        &self,
        statuses: &[JobStatus],
        cluster: Option<&str>,
    ) -> Result<Vec<JobRecord>, SourceError>;

    /// Name of the cluster the jobs ran on.
    fn cluster_name(&self) -> Result<String, SourceError>;
}

/// Job source backed by the SbatchMan SQLite database.
pub struct SqliteJobSource {
    conn: Connection,
    path: PathBuf,
    stdout_file: String,
    include_archived: bool,
}

impl SqliteJobSource {
    /// Open the database read-only. The file must already exist.
    pub fn open(
        path: &Path,
        stdout_file: &str,
        include_archived: bool,
    ) -> Result<Self, SourceError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| SourceError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            stdout_file: stdout_file.to_string(),
            include_archived,
        })
    }

    fn query_jobs(&self, cluster: Option<&str>) -> rusqlite::Result<Vec<JobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT j.id, j.job_id, j.job_name, c.config_name, cl.cluster_name, j.status, j.directory
             FROM jobs j
             JOIN configs c ON j.config_id = c.id
             JOIN clusters cl ON c.cluster_id = cl.id
             WHERE (?1 OR COALESCE(j.archived, 0) = 0)
               AND (?2 IS NULL OR cl.cluster_name = ?2)
             ORDER BY j.id ASC",
        )?;

        let iter = stmt.query_map(rusqlite::params![self.include_archived, cluster], |row| {
            let row_id: i64 = row.get(0)?;
            let scheduler_id: Option<String> = row.get(1)?;
            let status: String = row.get(5)?;
            let directory: String = row.get(6)?;
            Ok(JobRecord {
                job_id: scheduler_id.unwrap_or_else(|| row_id.to_string()),
                tag: row.get(2)?,
                config_name: row.get(3)?,
                cluster: row.get(4)?,
                status: JobStatus::from(status.as_str()),
                stdout_path: Path::new(&directory).join(&self.stdout_file),
            })
        })?;
        iter.collect()
    }
}

impl JobSource for SqliteJobSource {
    fn jobs_list(
        &self,
        statuses: &[JobStatus],
        cluster: Option<&str>,
    ) -> Result<Vec<JobRecord>, SourceError> {
        let all = self.query_jobs(cluster).map_err(SourceError::Db)?;
        let total = all.len();
        let jobs: Vec<JobRecord> = all
            .into_iter()
            .filter(|job| statuses.contains(&job.status))
            .collect();

        tracing::debug!(
            db = %self.path.display(),
            total,
            matching = jobs.len(),
            "listed jobs"
        );
        Ok(jobs)
    }

    fn cluster_name(&self) -> Result<String, SourceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT cluster_name FROM clusters ORDER BY id ASC")
            .map_err(SourceError::Db)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|iter| iter.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(SourceError::Db)?;

        match names.as_slice() {
            [] => Err(SourceError::NoCluster),
            [name] => Ok(name.clone()),
            _ => Err(SourceError::AmbiguousCluster(names.clone())),
        }
    }
}

#[derive(Debug)]
pub enum SourceError {
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    Db(rusqlite::Error),
    /// The database has no clusters registered.
    NoCluster,
    /// Several clusters are registered and none was chosen.
    AmbiguousCluster(Vec<String>),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Open { path, source } => {
                write!(f, "cannot open job database {}: {source}", path.display())
            }
            SourceError::Db(e) => write!(f, "job database error: {e}"),
            SourceError::NoCluster => write!(f, "no cluster registered in the job database"),
            SourceError::AmbiguousCluster(names) => write!(
                f,
                "job database holds several clusters ({}); pick one with --cluster",
                names.join(", ")
            ),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Open { source, .. } => Some(source),
            SourceError::Db(e) => Some(e),
            SourceError::NoCluster | SourceError::AmbiguousCluster(_) => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::TempDir;

    /// Create an SbatchMan-shaped database at `path`.
    pub(crate) fn create_db(path: &Path) -> Connection {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE clusters (
                id           INTEGER PRIMARY KEY,
                cluster_name TEXT NOT NULL,
                scheduler    INTEGER NOT NULL,
                max_jobs     INTEGER
            );
            CREATE TABLE configs (
                id          INTEGER PRIMARY KEY,
                config_name TEXT NOT NULL,
                cluster_id  INTEGER NOT NULL,
                flags       TEXT NOT NULL DEFAULT '{}',
                env         TEXT NOT NULL DEFAULT '{}'
            );
            CREATE TABLE jobs (
                id          INTEGER PRIMARY KEY,
                job_name    TEXT NOT NULL,
                config_id   INTEGER NOT NULL,
                submit_time INTEGER NOT NULL DEFAULT 0,
                directory   TEXT NOT NULL,
                command     TEXT NOT NULL DEFAULT '',
                status      TEXT NOT NULL,
                job_id      TEXT,
                end_time    INTEGER,
                preprocess  TEXT,
                postprocess TEXT,
                archived    INTEGER,
                variables   TEXT NOT NULL DEFAULT '{}'
            );",
        )
        .unwrap();
        conn
    }

    pub(crate) fn insert_cluster(conn: &Connection, id: i64, name: &str) {
        conn.execute(
            "INSERT INTO clusters (id, cluster_name, scheduler) VALUES (?1, ?2, 0)",
            params![id, name],
        )
        .unwrap();
    }

    pub(crate) fn insert_config(conn: &Connection, id: i64, name: &str, cluster_id: i64) {
        conn.execute(
            "INSERT INTO configs (id, config_name, cluster_id) VALUES (?1, ?2, ?3)",
            params![id, name, cluster_id],
        )
        .unwrap();
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert_job(
        conn: &Connection,
        id: i64,
        job_name: &str,
        config_id: i64,
        directory: &Path,
        status: &str,
        job_id: Option<&str>,
        archived: Option<i64>,
    ) {
        conn.execute(
            "INSERT INTO jobs (id, job_name, config_id, directory, status, job_id, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                job_name,
                config_id,
                directory.to_string_lossy(),
                status,
                job_id,
                archived
            ],
        )
        .unwrap();
    }

    fn seeded() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sbatchman.db");
        let conn = create_db(&path);
        insert_cluster(&conn, 1, "baldo");
        insert_config(&conn, 1, "1_threads", 1);
        insert_config(&conn, 2, "8_threads", 1);
        let jobdir = dir.path().join("exp");
        insert_job(&conn, 1, "float_1000", 1, &jobdir, "COMPLETED", Some("4411"), None);
        insert_job(&conn, 2, "float_1000", 2, &jobdir, "FAILED", Some("4412"), None);
        insert_job(&conn, 3, "double_1000", 2, &jobdir, "COMPLETED", None, Some(0));
        insert_job(&conn, 4, "double_10", 2, &jobdir, "COMPLETED", Some("4414"), Some(1));
        (dir, path)
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(JobStatus::from("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::from(" TIMEOUT "), JobStatus::Timeout);
        assert_eq!(
            JobStatus::from("VIRTUAL_QUEUE"),
            JobStatus::Other("VIRTUAL_QUEUE".to_string())
        );
    }

    #[test]
    fn status_display_is_upper_case() {
        assert_eq!(JobStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(JobStatus::Other("weird".into()).to_string(), "weird");
    }

    #[test]
    fn lists_completed_jobs_skipping_archived() {
        let (dir, path) = seeded();
        let source = SqliteJobSource::open(&path, "stdout.log", false).unwrap();

        let jobs = source.jobs_list(&[JobStatus::Completed], None).unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.job_id.as_str()).collect();
        // Job 3 has no scheduler id, so its row id stands in.
        assert_eq!(ids, vec!["4411", "3"]);

        assert_eq!(jobs[0].config_name, "1_threads");
        assert_eq!(jobs[0].tag, "float_1000");
        assert_eq!(jobs[0].cluster, "baldo");
        assert_eq!(jobs[0].stdout_path, dir.path().join("exp").join("stdout.log"));
    }

    #[test]
    fn include_archived_returns_everything() {
        let (_dir, path) = seeded();
        let source = SqliteJobSource::open(&path, "stdout.log", true).unwrap();
        let jobs = source.jobs_list(&[JobStatus::Completed], None).unwrap();
        assert_eq!(jobs.len(), 3);
    }

    #[test]
    fn several_statuses() {
        let (_dir, path) = seeded();
        let source = SqliteJobSource::open(&path, "stdout.log", false).unwrap();
        let jobs = source
            .jobs_list(&[JobStatus::Completed, JobStatus::Failed], None)
            .unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[1].status, JobStatus::Failed);
    }

    #[test]
    fn cluster_filter() {
        let (_dir, path) = seeded();
        {
            let conn = Connection::open(&path).unwrap();
            insert_cluster(&conn, 2, "leonardo");
            insert_config(&conn, 3, "32_threads", 2);
            insert_job(&conn, 5, "float_1000", 3, Path::new("/x"), "COMPLETED", Some("9"), None);
        }
        let source = SqliteJobSource::open(&path, "stdout.log", false).unwrap();

        let jobs = source
            .jobs_list(&[JobStatus::Completed], Some("leonardo"))
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].config_name, "32_threads");

        let jobs = source.jobs_list(&[JobStatus::Completed], None).unwrap();
        assert_eq!(jobs.len(), 3);
    }

    #[test]
    fn single_cluster_name() {
        let (_dir, path) = seeded();
        let source = SqliteJobSource::open(&path, "stdout.log", false).unwrap();
        assert_eq!(source.cluster_name().unwrap(), "baldo");
    }

    #[test]
    fn ambiguous_cluster_name() {
        let (_dir, path) = seeded();
        {
            let conn = Connection::open(&path).unwrap();
            insert_cluster(&conn, 2, "leonardo");
        }
        let source = SqliteJobSource::open(&path, "stdout.log", false).unwrap();
        match source.cluster_name() {
            Err(SourceError::AmbiguousCluster(names)) => {
                assert_eq!(names, vec!["baldo", "leonardo"]);
            }
            other => panic!("expected AmbiguousCluster, got {other:?}"),
        }
    }

    #[test]
    fn empty_cluster_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sbatchman.db");
        drop(create_db(&path));
        let source = SqliteJobSource::open(&path, "stdout.log", false).unwrap();
        assert!(matches!(source.cluster_name(), Err(SourceError::NoCluster)));
    }

    #[test]
    fn missing_database_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let result = SqliteJobSource::open(&dir.path().join("nope.db"), "stdout.log", false);
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }

    #[test]
    fn stdout_reads_captured_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stdout.log");
        std::fs::write(&path, "Pi (double) = 3.1415\n").unwrap();
        let job = JobRecord {
            job_id: "1".into(),
            config_name: "1_threads".into(),
            tag: "double_10".into(),
            cluster: "baldo".into(),
            status: JobStatus::Completed,
            stdout_path: path,
        };
        assert_eq!(job.stdout().unwrap(), "Pi (double) = 3.1415\n");
    }
}
