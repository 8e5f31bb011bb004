//! SQLite-backed content store.
//!
//! # Responsibility
//! - Persist grammar rules and quiz questions behind the `RemoteStore` trait.
//! - Keep SQL details inside this adapter.
//!
//! # Invariants
//! - Sequence columns (`examples`, `options`) hold JSON string arrays.
//! - Updates touch only the columns present in the patch, plus `updated_at`.
//! - Listing order is `grade ASC, created_at ASC, id ASC`.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::grammar_rule::RulePatch;
use crate::model::quiz_question::QuestionPatch;
use crate::remote::rows::{RemoteQuestionRow, RemoteRuleRow};
use crate::remote::{RemoteError, RemoteFilter, RemoteResult, RemoteStore};
use async_trait::async_trait;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::spawn_blocking;

const STORE_ID: &str = "sqlite";

const RULE_SELECT_SQL: &str = "SELECT
    id,
    title,
    explanation,
    examples,
    unit,
    grade,
    created_at,
    updated_at
FROM grammar_rules
WHERE (?1 IS NULL OR grade = ?1)
ORDER BY grade ASC, created_at ASC, id ASC";

const QUESTION_SELECT_SQL: &str = "SELECT
    id,
    question,
    options,
    correct,
    explanation,
    unit,
    grade,
    created_at,
    updated_at
FROM quiz_questions
WHERE (?1 IS NULL OR grade = ?1)
ORDER BY grade ASC, created_at ASC, id ASC";

const TOUCH_UPDATED_AT_SQL: &str = "updated_at = (CAST(strftime('%s', 'now') AS INTEGER) * 1000)";

impl From<rusqlite::Error> for RemoteError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::Rejected(value.to_string()),
            _ => Self::Unavailable(value.to_string()),
        }
    }
}

impl From<DbError> for RemoteError {
    fn from(value: DbError) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// Content store over one SQLite connection.
///
/// Every statement runs on the blocking thread pool, so a caller's timeout
/// still fires while SQLite waits on a locked database.
#[derive(Clone)]
pub struct SqliteRemoteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRemoteStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `work` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: &'static str, work: F) -> RemoteResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> RemoteResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| RemoteError::Unavailable("connection lock poisoned".to_string()))?;
            work(&*guard)
        })
        .await
        .map_err(|err| {
            warn!("event=remote_call module=remote status=error store={STORE_ID} op={op} error={err}");
            RemoteError::Unavailable(format!("{op} did not complete: {err}"))
        })?
    }
}

#[async_trait]
impl RemoteStore for SqliteRemoteStore {
    fn store_id(&self) -> &str {
        STORE_ID
    }

    async fn list_rules(&self, filter: &RemoteFilter) -> RemoteResult<Vec<RemoteRuleRow>> {
        let grade = filter.grade.map(|grade| i64::from(grade.get()));
        self.with_conn("list_rules", move |conn| {
            let mut stmt = conn.prepare(RULE_SELECT_SQL)?;
            let mut rows = stmt.query(params![grade])?;
            let mut listed = Vec::new();
            while let Some(row) = rows.next()? {
                listed.push(parse_rule_row(row)?);
            }
            Ok(listed)
        })
        .await
    }

    async fn list_questions(&self, filter: &RemoteFilter) -> RemoteResult<Vec<RemoteQuestionRow>> {
        let grade = filter.grade.map(|grade| i64::from(grade.get()));
        self.with_conn("list_questions", move |conn| {
            let mut stmt = conn.prepare(QUESTION_SELECT_SQL)?;
            let mut rows = stmt.query(params![grade])?;
            let mut listed = Vec::new();
            while let Some(row) = rows.next()? {
                listed.push(parse_question_row(row)?);
            }
            Ok(listed)
        })
        .await
    }

    async fn insert_rule(&self, row: &RemoteRuleRow) -> RemoteResult<()> {
        let id = require_id(row.id.as_deref())?.to_string();
        let examples = encode_list(row.examples.as_deref().unwrap_or_default())?;
        let row = row.clone();
        self.with_conn("insert_rule", move |conn| {
            conn.execute(
                "INSERT INTO grammar_rules (id, title, explanation, examples, unit, grade)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    id,
                    row.title.as_deref(),
                    row.explanation.as_deref(),
                    examples,
                    row.unit.as_deref(),
                    row.grade,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_question(&self, row: &RemoteQuestionRow) -> RemoteResult<()> {
        let id = require_id(row.id.as_deref())?.to_string();
        let options = encode_list(row.options.as_deref().unwrap_or_default())?;
        let row = row.clone();
        self.with_conn("insert_question", move |conn| {
            conn.execute(
                "INSERT INTO quiz_questions (id, question, options, correct, explanation, unit, grade)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    id,
                    row.question.as_deref(),
                    options,
                    row.correct,
                    row.explanation.as_deref(),
                    row.unit.as_deref(),
                    row.grade,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_rule_by_id(&self, id: &str, patch: &RulePatch) -> RemoteResult<()> {
        let mut assignments = UpdateBuilder::default();
        if let Some(title) = &patch.title {
            assignments.set("title", Value::Text(title.clone()));
        }
        if let Some(explanation) = &patch.explanation {
            assignments.set("explanation", Value::Text(explanation.clone()));
        }
        if let Some(examples) = &patch.examples {
            assignments.set("examples", Value::Text(encode_list(examples)?));
        }
        if let Some(unit) = &patch.unit {
            assignments.set("unit", Value::Text(unit.clone()));
        }
        if let Some(grade) = patch.grade {
            assignments.set("grade", Value::Integer(i64::from(grade.get())));
        }
        let id = id.to_string();
        self.with_conn("update_rule", move |conn| {
            assignments.execute(conn, "grammar_rules", &id)
        })
        .await
    }

    async fn update_question_by_id(&self, id: &str, patch: &QuestionPatch) -> RemoteResult<()> {
        let mut assignments = UpdateBuilder::default();
        if let Some(question) = &patch.question {
            assignments.set("question", Value::Text(question.clone()));
        }
        if let Some(options) = &patch.options {
            assignments.set("options", Value::Text(encode_list(options)?));
        }
        if let Some(correct) = patch.correct {
            let correct = i64::try_from(correct)
                .map_err(|_| RemoteError::Rejected(format!("correct index {correct} too large")))?;
            assignments.set("correct", Value::Integer(correct));
        }
        if let Some(explanation) = &patch.explanation {
            assignments.set("explanation", Value::Text(explanation.clone()));
        }
        if let Some(unit) = &patch.unit {
            assignments.set("unit", Value::Text(unit.clone()));
        }
        if let Some(grade) = patch.grade {
            assignments.set("grade", Value::Integer(i64::from(grade.get())));
        }
        let id = id.to_string();
        self.with_conn("update_question", move |conn| {
            assignments.execute(conn, "quiz_questions", &id)
        })
        .await
    }

    async fn delete_rule_by_id(&self, id: &str) -> RemoteResult<()> {
        let id = id.to_string();
        self.with_conn("delete_rule", move |conn| {
            delete_by_id(conn, "grammar_rules", &id)
        })
        .await
    }

    async fn delete_question_by_id(&self, id: &str) -> RemoteResult<()> {
        let id = id.to_string();
        self.with_conn("delete_question", move |conn| {
            delete_by_id(conn, "quiz_questions", &id)
        })
        .await
    }
}

/// Collects `column = ?` assignments for a partial update.
#[derive(Default)]
struct UpdateBuilder {
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl UpdateBuilder {
    fn set(&mut self, column: &'static str, value: Value) {
        self.columns.push(column);
        self.values.push(value);
    }

    fn execute(mut self, conn: &Connection, table: &'static str, id: &str) -> RemoteResult<()> {
        let mut sql = format!("UPDATE {table} SET ");
        for column in &self.columns {
            sql.push_str(column);
            sql.push_str(" = ?, ");
        }
        sql.push_str(TOUCH_UPDATED_AT_SQL);
        sql.push_str(" WHERE id = ?;");
        self.values.push(Value::Text(id.to_string()));

        let changed = conn.execute(&sql, params_from_iter(self.values))?;
        if changed == 0 {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn delete_by_id(conn: &Connection, table: &'static str, id: &str) -> RemoteResult<()> {
    let changed = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1;"), [id])?;
    if changed == 0 {
        return Err(RemoteError::NotFound(id.to_string()));
    }
    Ok(())
}

fn require_id(id: Option<&str>) -> RemoteResult<&str> {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(RemoteError::Rejected("row id is required".to_string())),
    }
}

fn encode_list(values: &[String]) -> RemoteResult<String> {
    serde_json::to_string(values).map_err(|err| RemoteError::Rejected(err.to_string()))
}

/// Decodes a JSON array column. Malformed content yields `None` so the row is
/// rejected by the domain mapping instead of failing the whole listing.
fn decode_list(table: &str, id: &str, raw: &str) -> Option<Vec<String>> {
    match serde_json::from_str(raw) {
        Ok(values) => Some(values),
        Err(err) => {
            warn!(
                "event=row_decode module=remote status=error table={table} id={id} error={err}"
            );
            None
        }
    }
}

fn parse_rule_row(row: &Row<'_>) -> RemoteResult<RemoteRuleRow> {
    let id: String = row.get("id")?;
    let examples: String = row.get("examples")?;
    Ok(RemoteRuleRow {
        examples: decode_list("grammar_rules", &id, &examples),
        title: row.get("title")?,
        explanation: row.get("explanation")?,
        unit: row.get("unit")?,
        grade: row.get("grade")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        id: Some(id),
    })
}

fn parse_question_row(row: &Row<'_>) -> RemoteResult<RemoteQuestionRow> {
    let id: String = row.get("id")?;
    let options: String = row.get("options")?;
    Ok(RemoteQuestionRow {
        options: decode_list("quiz_questions", &id, &options),
        question: row.get("question")?,
        correct: row.get("correct")?,
        explanation: row.get("explanation")?,
        unit: row.get("unit")?,
        grade: row.get("grade")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        id: Some(id),
    })
}
