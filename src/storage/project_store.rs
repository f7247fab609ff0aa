use std::{path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::TimeDelta;
use rusqlite::{params, Connection, Row};
use tracing::{debug, info};

use crate::utils::time::{from_storage_timestamp, to_storage_timestamp};

use super::entities::{LogId, LogWithProject, Project, ProjectId, TimeLog};

/// Interface the engine persists through. Calls are synchronous and made from the foreground
/// consumer only.
#[cfg_attr(test, mockall::automock)]
pub trait ProjectStore {
    fn create_project(&self, name: &str, max_time: Duration) -> Result<Project>;

    /// Writes name, max time, running flag and elapsed of an existing project.
    fn update_project(&self, project: &Project) -> Result<()>;

    /// Removes the project together with its logs.
    fn delete_project(&self, id: ProjectId) -> Result<()>;

    fn list_projects(&self) -> Result<Vec<Project>>;

    /// Saves the log and returns the identifier it was stored under.
    fn create_log(&self, log: &TimeLog) -> Result<LogId>;

    /// Logs of one project, newest stop time first.
    fn list_logs_for_project(&self, id: ProjectId) -> Result<Vec<TimeLog>>;

    /// Every log with its project name, newest stop time first.
    fn list_all_logs(&self) -> Result<Vec<LogWithProject>>;

    /// Flushes and releases the underlying connection. Later calls fail.
    fn close(&mut self) -> Result<()>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS projects (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        name          TEXT NOT NULL,
        max_time_secs INTEGER NOT NULL,
        running       INTEGER NOT NULL DEFAULT 0,
        elapsed_secs  INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS time_logs (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id  INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        started_at  TEXT NOT NULL,
        stopped_at  TEXT NOT NULL,
        duration_ms INTEGER NOT NULL,
        tag         TEXT NOT NULL DEFAULT ''
    );

    CREATE INDEX IF NOT EXISTS idx_time_logs_project_stopped ON time_logs(project_id, stopped_at);
    CREATE INDEX IF NOT EXISTS idx_time_logs_stopped ON time_logs(stopped_at);
";

/// The main realization of [ProjectStore], a single SQLite file.
pub struct SqliteStore {
    conn: Option<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {path:?}"))?;
        info!("Opened database {path:?}");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| anyhow!("Store has already been closed"))
    }
}

impl ProjectStore for SqliteStore {
    fn create_project(&self, name: &str, max_time: Duration) -> Result<Project> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO projects (name, max_time_secs, running, elapsed_secs)
             VALUES (?1, ?2, 0, 0)",
            params![name, max_time.as_secs() as i64],
        )?;
        let id = ProjectId(conn.last_insert_rowid());
        debug!("Created project {id}");
        Ok(Project {
            id,
            name: name.to_string(),
            max_time,
            running: false,
            elapsed: Duration::ZERO,
        })
    }

    fn update_project(&self, project: &Project) -> Result<()> {
        let changed = self.conn()?.execute(
            "UPDATE projects
             SET name = ?1, max_time_secs = ?2, running = ?3, elapsed_secs = ?4
             WHERE id = ?5",
            params![
                project.name,
                project.max_time.as_secs() as i64,
                project.running,
                project.elapsed.as_secs() as i64,
                project.id.0
            ],
        )?;
        if changed == 0 {
            return Err(anyhow!("Project {} doesn't exist", project.id));
        }
        debug!("Updated project {:?}", project);
        Ok(())
    }

    fn delete_project(&self, id: ProjectId) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM projects WHERE id = ?1", params![id.0])?;
        debug!("Deleted project {id}");
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT id, name, max_time_secs, running, elapsed_secs FROM projects ORDER BY id",
        )?;
        let projects = statement
            .query_map([], read_project)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    fn create_log(&self, log: &TimeLog) -> Result<LogId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO time_logs (project_id, started_at, stopped_at, duration_ms, tag)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                log.project_id.0,
                to_storage_timestamp(log.started_at),
                to_storage_timestamp(log.stopped_at),
                log.duration.num_milliseconds(),
                log.tag
            ],
        )?;
        let id = LogId(conn.last_insert_rowid());
        debug!("Created log {:?} for project {}", id, log.project_id);
        Ok(id)
    }

    fn list_logs_for_project(&self, id: ProjectId) -> Result<Vec<TimeLog>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT id, project_id, started_at, stopped_at, duration_ms, tag
             FROM time_logs WHERE project_id = ?1
             ORDER BY stopped_at DESC, id DESC",
        )?;
        let rows = statement
            .query_map(params![id.0], read_log)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_all_logs(&self) -> Result<Vec<LogWithProject>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(
            "SELECT tl.id, tl.project_id, tl.started_at, tl.stopped_at, tl.duration_ms, tl.tag,
                    p.name
             FROM time_logs tl
             JOIN projects p ON tl.project_id = p.id
             ORDER BY tl.stopped_at DESC, tl.id DESC",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok(LogWithProject {
                    log: read_log(row)?,
                    project_name: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| e)?;
        info!("Closed database");
        Ok(())
    }
}

fn read_log(row: &Row<'_>) -> rusqlite::Result<TimeLog> {
    let timestamp = |index: usize| -> rusqlite::Result<_> {
        let raw: String = row.get(index)?;
        from_storage_timestamp(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    };
    Ok(TimeLog {
        id: Some(LogId(row.get(0)?)),
        project_id: ProjectId(row.get(1)?),
        started_at: timestamp(2)?,
        stopped_at: timestamp(3)?,
        duration: TimeDelta::milliseconds(row.get(4)?),
        tag: row.get(5)?,
    })
}

fn read_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: ProjectId(row.get(0)?),
        name: row.get(1)?,
        max_time: Duration::from_secs(row.get::<_, i64>(2)?.max(0) as u64),
        running: row.get(3)?,
        elapsed: Duration::from_secs(row.get::<_, i64>(4)?.max(0) as u64),
    })
}
