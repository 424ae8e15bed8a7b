//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the store operations the index coordinator consumes:
//!   create, find by id, find by filter, update, delete, distinct ids.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before SQL mutations.
//! - A task row and its prerequisite rows are written in one transaction.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Prerequisite ids are free references and may name deleted tasks.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::task::{Priority, Task, TaskId, TaskStatus, TaskValidationError};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    tasks.id,
    tasks.title,
    tasks.description,
    tasks.deadline,
    tasks.priority,
    tasks.duration_minutes,
    tasks.estimated_duration_minutes,
    tasks.actual_duration_minutes,
    tasks.status,
    tasks.priority_score,
    tasks.completed_at
FROM tasks";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    AlreadyExists(TaskId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::AlreadyExists(id) => write!(f, "task already exists: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "task repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::AlreadyExists(_)
            | Self::UninitializedConnection { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Filter options for listing tasks. All set filters must match.
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
    /// Restrict to these ids. An empty list matches nothing.
    pub ids: Option<Vec<TaskId>>,
    /// Only tasks listing this id among their prerequisites.
    pub has_prerequisite: Option<TaskId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl TaskListQuery {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_ids(ids: impl IntoIterator<Item = TaskId>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn depending_on(prerequisite: TaskId) -> Self {
        Self {
            has_prerequisite: Some(prerequisite),
            ..Self::default()
        }
    }
}

/// Store operations consumed by the index coordinator.
pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Lists matching tasks in insertion order.
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    /// Full replacement of the stored record, prerequisites included.
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    fn distinct_task_ids(&self, query: &TaskListQuery) -> RepoResult<Vec<TaskId>>;
    /// Deletes every task. Returns the number of rows removed.
    fn delete_all_tasks(&self) -> RepoResult<usize>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1);",
            [task.id.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(RepoError::AlreadyExists(task.id));
        }

        tx.execute(
            "INSERT INTO tasks (
                id,
                title,
                description,
                deadline,
                priority,
                duration_minutes,
                estimated_duration_minutes,
                actual_duration_minutes,
                status,
                priority_score,
                completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                task.id.to_string(),
                task.title.as_str(),
                task.description.as_deref(),
                task.deadline,
                task.priority.as_str(),
                task.duration_minutes,
                task.estimated_duration_minutes,
                task.actual_duration_minutes,
                task.status.as_str(),
                task.priority_score,
                task.completed_at,
            ],
        )?;
        write_prerequisites(&tx, task)?;
        tx.commit()?;

        Ok(task.id)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let task = self
            .conn
            .query_row(
                &format!("{TASK_SELECT_SQL} WHERE tasks.id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_task_row(row)),
            )
            .optional()?
            .transpose()?;

        match task {
            Some(mut task) => {
                task.prerequisites = load_prerequisites(self.conn, task.id)?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        if matches!(&query.ids, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values = Vec::new();
        push_filters(query, &mut sql, &mut bind_values);
        sql.push_str(" ORDER BY tasks.rowid ASC");
        push_pagination(query, &mut sql, &mut bind_values);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        for task in &mut tasks {
            task.prerequisites = load_prerequisites(self.conn, task.id)?;
        }
        Ok(tasks)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE tasks
             SET
                title = ?1,
                description = ?2,
                deadline = ?3,
                priority = ?4,
                duration_minutes = ?5,
                estimated_duration_minutes = ?6,
                actual_duration_minutes = ?7,
                status = ?8,
                priority_score = ?9,
                completed_at = ?10,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?11;",
            params![
                task.title.as_str(),
                task.description.as_deref(),
                task.deadline,
                task.priority.as_str(),
                task.duration_minutes,
                task.estimated_duration_minutes,
                task.actual_duration_minutes,
                task.status.as_str(),
                task.priority_score,
                task.completed_at,
                task.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(task.id));
        }

        tx.execute(
            "DELETE FROM task_prerequisites WHERE task_id = ?1;",
            [task.id.to_string()],
        )?;
        write_prerequisites(&tx, task)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn distinct_task_ids(&self, query: &TaskListQuery) -> RepoResult<Vec<TaskId>> {
        if matches!(&query.ids, Some(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }

        let mut sql = String::from("SELECT DISTINCT tasks.id FROM tasks WHERE 1 = 1");
        let mut bind_values = Vec::new();
        push_filters(query, &mut sql, &mut bind_values);
        sql.push_str(" ORDER BY tasks.rowid ASC");
        push_pagination(query, &mut sql, &mut bind_values);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            ids.push(parse_task_id(&text, "tasks.id")?);
        }
        Ok(ids)
    }

    fn delete_all_tasks(&self) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM task_prerequisites;", [])?;
        let removed = tx.execute("DELETE FROM tasks;", [])?;
        tx.commit()?;
        Ok(removed)
    }
}

fn push_filters(query: &TaskListQuery, sql: &mut String, bind_values: &mut Vec<Value>) {
    if let Some(status) = query.status {
        sql.push_str(" AND tasks.status = ?");
        bind_values.push(Value::Text(status.as_str().to_string()));
    }

    if let Some(ids) = &query.ids {
        let placeholders = vec!["?"; ids.len()].join(", ");
        sql.push_str(&format!(" AND tasks.id IN ({placeholders})"));
        bind_values.extend(ids.iter().map(|id| Value::Text(id.to_string())));
    }

    if let Some(prerequisite) = query.has_prerequisite {
        sql.push_str(
            " AND EXISTS (
                SELECT 1 FROM task_prerequisites
                WHERE task_prerequisites.task_id = tasks.id
                  AND task_prerequisites.prerequisite_id = ?
            )",
        );
        bind_values.push(Value::Text(prerequisite.to_string()));
    }
}

fn push_pagination(query: &TaskListQuery, sql: &mut String, bind_values: &mut Vec<Value>) {
    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }
    } else if query.offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.offset)));
    }
}

fn write_prerequisites(conn: &Connection, task: &Task) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO task_prerequisites (task_id, prerequisite_id, position)
         VALUES (?1, ?2, ?3);",
    )?;
    for (position, prerequisite) in task.prerequisites.iter().enumerate() {
        stmt.execute(params![
            task.id.to_string(),
            prerequisite.to_string(),
            position as i64
        ])?;
    }
    Ok(())
}

fn load_prerequisites(conn: &Connection, id: TaskId) -> RepoResult<Vec<TaskId>> {
    let mut stmt = conn.prepare(
        "SELECT prerequisite_id
         FROM task_prerequisites
         WHERE task_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut prerequisites = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        prerequisites.push(parse_task_id(&text, "task_prerequisites.prerequisite_id")?);
    }
    Ok(prerequisites)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = row.get("id")?;
    let id = parse_task_id(&id_text, "tasks.id")?;

    let priority_text: String = row.get("priority")?;
    let priority = Priority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid priority `{priority_text}` in tasks.priority"))
    })?;

    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in tasks.status"))
    })?;

    let task = Task {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        deadline: row.get("deadline")?,
        priority,
        duration_minutes: row.get("duration_minutes")?,
        estimated_duration_minutes: row.get("estimated_duration_minutes")?,
        actual_duration_minutes: row.get("actual_duration_minutes")?,
        status,
        prerequisites: Vec::new(),
        priority_score: row.get("priority_score")?,
        completed_at: row.get("completed_at")?,
    };
    task.validate()?;
    Ok(task)
}

fn parse_task_id(value: &str, column: &'static str) -> RepoResult<TaskId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
