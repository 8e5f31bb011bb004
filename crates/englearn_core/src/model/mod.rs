//! Domain model for grade-scoped learning content.
//!
//! # Responsibility
//! - Define grammar rule and quiz question records shared by every layer.
//! - Own field normalization and validation rules for those records.
//!
//! # Invariants
//! - A resolved entity always carries a non-empty, scope-unique `id`.
//! - `QuizQuestion::correct` always indexes a real option.
//! - Rule `examples` are never empty after normalization.

pub mod grade;
pub mod grammar_rule;
pub mod quiz_question;
pub mod validation;

use serde::{Deserialize, Serialize};

/// Where a resolved entity came from.
///
/// Not part of the persisted shape; the resolver stamps it on every record it
/// hands out so mutation rules can tell static fallback data apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOrigin {
    /// Bundled catalog entry.
    Static,
    /// Row read from the remote store.
    Remote,
    /// Created in this session and not yet seen in a remote listing.
    #[default]
    Local,
}

/// Entity class handled by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Rule,
    Question,
}

impl EntityKind {
    /// Stable label used in fallback ids and log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Question => "question",
        }
    }
}
