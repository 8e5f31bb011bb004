//! Core content layer for the English learning app.
//! Resolves grade-scoped grammar rules and quiz questions from the bundled
//! catalog and an optional remote store, and owns every content invariant.

pub mod catalog;
pub mod config;
pub mod db;
pub mod export;
pub mod filter;
pub mod logging;
pub mod model;
pub mod remote;
pub mod resolver;

pub use catalog::{CatalogError, StaticCatalog};
pub use config::{EmptyRemotePolicy, ResolverConfig};
pub use export::{export_questions, export_rules, CsvExport, CsvLabels, ExportError};
pub use filter::{distinct_units, filter_questions, filter_rules, EntityFilter};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::grade::{Grade, Scope};
pub use model::grammar_rule::{GrammarRule, RuleDraft, RulePatch};
pub use model::quiz_question::{QuestionDraft, QuestionPatch, QuizQuestion};
pub use model::validation::ValidationError;
pub use model::{EntityKind, EntityOrigin};
pub use remote::{RemoteError, RemoteFilter, RemoteResult, RemoteStore, SqliteRemoteStore};
pub use resolver::{DataResolver, DataSource, ResolverError, ResolverSnapshot};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
