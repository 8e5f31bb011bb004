//! Remote content store contract.
//!
//! # Responsibility
//! - Define the minimal CRUD surface the resolver depends on.
//! - Define explicit row schemas and their mapping into domain records.
//!
//! # Invariants
//! - Implementations report failures as `RemoteError`; they never panic on
//!   transport or constraint problems.
//! - Rows are mapped through `rows::*::into_*` before reaching callers of
//!   the resolver; rows missing required fields are rejected, not trusted.

pub mod rows;
pub mod sqlite_store;

use crate::model::grade::Grade;
use crate::model::grammar_rule::RulePatch;
use crate::model::quiz_question::QuestionPatch;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub use rows::{RemoteQuestionRow, RemoteRuleRow, RowMappingError};
pub use sqlite_store::SqliteRemoteStore;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote store failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Store unreachable or failed at transport level.
    Unavailable(String),
    /// Call exceeded the configured bound.
    Timeout(Duration),
    /// Store refused the write (constraint, malformed row).
    Rejected(String),
    /// Target id does not exist remotely.
    NotFound(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "remote store unavailable: {message}"),
            Self::Timeout(after) => {
                write!(f, "remote store timed out after {}ms", after.as_millis())
            }
            Self::Rejected(message) => write!(f, "remote store rejected write: {message}"),
            Self::NotFound(id) => write!(f, "remote record not found: {id}"),
        }
    }
}

impl Error for RemoteError {}

/// Listing filter; `grade = None` lists every grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteFilter {
    pub grade: Option<Grade>,
}

/// CRUD surface of the external content store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short adapter label used in diagnostics.
    fn store_id(&self) -> &str;

    async fn list_rules(&self, filter: &RemoteFilter) -> RemoteResult<Vec<RemoteRuleRow>>;
    async fn list_questions(&self, filter: &RemoteFilter) -> RemoteResult<Vec<RemoteQuestionRow>>;

    async fn insert_rule(&self, row: &RemoteRuleRow) -> RemoteResult<()>;
    async fn insert_question(&self, row: &RemoteQuestionRow) -> RemoteResult<()>;

    async fn update_rule_by_id(&self, id: &str, patch: &RulePatch) -> RemoteResult<()>;
    async fn update_question_by_id(&self, id: &str, patch: &QuestionPatch) -> RemoteResult<()>;

    async fn delete_rule_by_id(&self, id: &str) -> RemoteResult<()>;
    async fn delete_question_by_id(&self, id: &str) -> RemoteResult<()>;
}
