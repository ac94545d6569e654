//! Relational store for users, projects, tasks, comments and activity.
//!
//! Each caller opens its own connection for the duration of one request
//! or batch run; nothing is cached across invocations.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::warn;

use crate::mentions::MentionCandidates;

#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
}

/// User record snapshot fetched at notification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub username: String,
}

/// One incomplete task as the digest job sees it.
#[derive(Debug, Clone)]
pub struct OpenTask {
    pub id: i64,
    pub title: String,
    pub status: String,
    pub priority: String,
    pub due_date: Option<NaiveDate>,
    pub project_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<i64>,
    pub created_by: i64,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub task_id: i64,
    pub user_id: i64,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve extracted mention candidates to user records.
    ///
    /// One batched lookup per call; candidates without a matching record
    /// are silently dropped.
    pub fn resolve_candidates(
        &self,
        candidates: &MentionCandidates,
    ) -> Result<Vec<ResolvedUser>, StoreError> {
        match candidates {
            MentionCandidates::None => Ok(Vec::new()),
            MentionCandidates::UserIds(ids) => self.users_by_ids(ids),
            MentionCandidates::Usernames(names) => self.users_by_usernames(names),
        }
    }

    pub fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<ResolvedUser>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.open()?;
        let placeholders = placeholders(ids.len());
        let sql = format!(
            "SELECT id, email, full_name, username FROM users WHERE id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), user_from_row)?;
        collect_users(rows, |user| {
            ids.iter().position(|id| *id == user.id).unwrap_or(usize::MAX)
        })
    }

    pub fn users_by_usernames(&self, names: &[String]) -> Result<Vec<ResolvedUser>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.open()?;
        let placeholders = placeholders(names.len());
        let sql = format!(
            "SELECT id, email, full_name, username FROM users WHERE username IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(names.iter()), user_from_row)?;
        collect_users(rows, |user| {
            names
                .iter()
                .position(|name| *name == user.username)
                .unwrap_or(usize::MAX)
        })
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<ResolvedUser>, StoreError> {
        let conn = self.open()?;
        let user = conn
            .query_row(
                "SELECT id, email, full_name, username FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn active_users(&self) -> Result<Vec<ResolvedUser>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, email, full_name, username FROM users WHERE is_active = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map([], user_from_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    pub fn active_user(&self, id: i64) -> Result<Option<ResolvedUser>, StoreError> {
        let conn = self.open()?;
        let user = conn
            .query_row(
                "SELECT id, email, full_name, username FROM users WHERE id = ?1 AND is_active = 1",
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// All tasks assigned to the user whose status is not `done`, with
    /// the project name joined, overdue and due-today first, then by
    /// urgency.
    pub fn incomplete_tasks_for_user(&self, user_id: i64) -> Result<Vec<OpenTask>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.title, t.status, t.priority, t.due_date, p.name
             FROM tasks t
             LEFT JOIN projects p ON t.project_id = p.id
             WHERE t.assigned_to = ?1 AND t.status != 'done'
             ORDER BY
                 CASE
                     WHEN t.due_date IS NOT NULL AND t.due_date < date('now') THEN 1
                     WHEN t.due_date = date('now') THEN 2
                     WHEN t.priority = 'urgent' THEN 3
                     WHEN t.priority = 'high' THEN 4
                     ELSE 5
                 END,
                 t.due_date ASC,
                 t.priority DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, title, status, priority, due_raw, project_name) = row?;
            // The write path only ever stores %Y-%m-%d; anything else
            // was edited externally and must not sink the whole run.
            let due_date = due_raw.and_then(|raw| {
                match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                    Ok(date) => Some(date),
                    Err(err) => {
                        warn!("task {} has unparseable due_date '{}': {}", id, raw, err);
                        None
                    }
                }
            });
            tasks.push(OpenTask {
                id,
                title,
                status,
                priority,
                due_date,
                project_name,
            });
        }
        Ok(tasks)
    }

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        full_name: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO users (username, email, full_name, is_active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![username, email, full_name, format_datetime(Utc::now())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn deactivate_user(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn create_project(&self, name: &str) -> Result<i64, StoreError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO projects (name, created_at) VALUES (?1, ?2)",
            params![name, format_datetime(Utc::now())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn project_name(&self, id: i64) -> Result<Option<String>, StoreError> {
        let conn = self.open()?;
        let name = conn
            .query_row(
                "SELECT name FROM projects WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(name)
    }

    pub fn create_task(&self, task: &NewTask) -> Result<i64, StoreError> {
        let conn = self.open()?;
        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM tasks WHERE project_id = ?1",
            params![task.project_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO tasks (project_id, title, description, status, priority,
                                assigned_to, created_by, due_date, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.project_id,
                task.title,
                task.description,
                task.status,
                task.priority,
                task.assigned_to,
                task.created_by,
                task.due_date.map(|date| date.format("%Y-%m-%d").to_string()),
                position,
                format_datetime(Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn create_comment(&self, comment: &NewComment) -> Result<i64, StoreError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO task_comments (task_id, user_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                comment.task_id,
                comment.user_id,
                comment.content,
                format_datetime(Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Task title and project name, as the comment pipeline's context.
    pub fn task_context(&self, task_id: i64) -> Result<Option<(String, Option<String>)>, StoreError> {
        let conn = self.open()?;
        let context = conn
            .query_row(
                "SELECT t.title, p.name
                 FROM tasks t
                 LEFT JOIN projects p ON t.project_id = p.id
                 WHERE t.id = ?1",
                params![task_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        Ok(context)
    }

    pub fn log_activity(
        &self,
        task_id: i64,
        user_id: i64,
        action_type: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO task_activity (task_id, user_id, action_type, old_value, new_value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                task_id,
                user_id,
                action_type,
                old_value,
                new_value,
                format_datetime(Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn open(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(TASKFLOW_SCHEMA)?;
        Ok(conn)
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResolvedUser> {
    Ok(ResolvedUser {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        username: row.get(3)?,
    })
}

fn placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count * 2);
    for index in 0..count {
        if index > 0 {
            out.push(',');
        }
        out.push('?');
    }
    out
}

/// Collect rows and restore the candidates' first-occurrence order,
/// which an `IN (...)` query does not preserve.
fn collect_users(
    rows: impl Iterator<Item = rusqlite::Result<ResolvedUser>>,
    rank: impl Fn(&ResolvedUser) -> usize,
) -> Result<Vec<ResolvedUser>, StoreError> {
    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    users.sort_by_key(|user| rank(user));
    Ok(users)
}

const TASKFLOW_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    full_name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'not_started',
    priority TEXT NOT NULL DEFAULT 'medium',
    assigned_to INTEGER,
    created_by INTEGER,
    due_date TEXT,
    position INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS task_comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS task_activity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    action_type TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    created_at TEXT NOT NULL
);
"#;

fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}
