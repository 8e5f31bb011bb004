//! Remote row schemas and their mapping into domain records.

use crate::model::grade::Grade;
use crate::model::grammar_rule::GrammarRule;
use crate::model::quiz_question::QuizQuestion;
use crate::model::validation::ValidationError;
use crate::model::{EntityKind, EntityOrigin};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why a remote row could not become a domain record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowMappingError {
    MissingField {
        kind: EntityKind,
        field: &'static str,
    },
    NegativeIndex {
        id: String,
        value: i64,
    },
    Invalid {
        kind: EntityKind,
        id: String,
        source: ValidationError,
    },
}

impl Display for RowMappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { kind, field } => {
                write!(f, "remote {} row is missing `{field}`", kind.as_str())
            }
            Self::NegativeIndex { id, value } => {
                write!(f, "remote question `{id}` has negative correct index {value}")
            }
            Self::Invalid { kind, id, source } => {
                write!(f, "remote {} `{id}` is invalid: {source}", kind.as_str())
            }
        }
    }
}

impl Error for RowMappingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Grammar rule as stored remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRuleRow {
    pub id: Option<String>,
    pub title: Option<String>,
    pub explanation: Option<String>,
    pub examples: Option<Vec<String>>,
    pub unit: Option<String>,
    pub grade: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// Quiz question as stored remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteQuestionRow {
    pub id: Option<String>,
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct: Option<i64>,
    pub explanation: Option<String>,
    pub unit: Option<String>,
    pub grade: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

fn required<T>(kind: EntityKind, field: &'static str, value: Option<T>) -> Result<T, RowMappingError> {
    value.ok_or(RowMappingError::MissingField { kind, field })
}

impl RemoteRuleRow {
    pub fn from_rule(rule: &GrammarRule) -> Self {
        Self {
            id: rule.id.clone(),
            title: Some(rule.title.clone()),
            explanation: Some(rule.explanation.clone()),
            examples: Some(rule.examples.clone()),
            unit: Some(rule.unit.clone()),
            grade: Some(i64::from(rule.grade.get())),
            created_at: None,
            updated_at: None,
        }
    }

    /// Maps the row into a rule, trusting its id as-is.
    pub fn into_rule(self) -> Result<GrammarRule, RowMappingError> {
        let kind = EntityKind::Rule;
        let id = required(kind, "id", self.id.filter(|id| !id.trim().is_empty()))?;
        let invalid = |source: ValidationError| RowMappingError::Invalid {
            kind,
            id: id.clone(),
            source,
        };
        let grade = Grade::from_i64(required(kind, "grade", self.grade)?).map_err(invalid)?;

        let mut rule = GrammarRule {
            id: Some(id.clone()),
            title: required(kind, "title", self.title)?,
            explanation: required(kind, "explanation", self.explanation)?,
            examples: required(kind, "examples", self.examples)?,
            unit: required(kind, "unit", self.unit)?,
            grade,
            origin: EntityOrigin::Remote,
        };
        rule.normalize();
        rule.validate().map_err(invalid)?;
        Ok(rule)
    }
}

impl RemoteQuestionRow {
    pub fn from_question(question: &QuizQuestion) -> Self {
        Self {
            id: question.id.clone(),
            question: Some(question.question.clone()),
            options: Some(question.options.clone()),
            correct: i64::try_from(question.correct).ok(),
            explanation: Some(question.explanation.clone()),
            unit: Some(question.unit.clone()),
            grade: Some(i64::from(question.grade.get())),
            created_at: None,
            updated_at: None,
        }
    }

    /// Maps the row into a question, trusting its id as-is.
    pub fn into_question(self) -> Result<QuizQuestion, RowMappingError> {
        let kind = EntityKind::Question;
        let id = required(kind, "id", self.id.filter(|id| !id.trim().is_empty()))?;
        let invalid = |source: ValidationError| RowMappingError::Invalid {
            kind,
            id: id.clone(),
            source,
        };
        let grade = Grade::from_i64(required(kind, "grade", self.grade)?).map_err(invalid)?;
        let raw_correct = required(kind, "correct", self.correct)?;
        let correct = usize::try_from(raw_correct).map_err(|_| RowMappingError::NegativeIndex {
            id: id.clone(),
            value: raw_correct,
        })?;

        let mut question = QuizQuestion {
            id: Some(id.clone()),
            question: required(kind, "question", self.question)?,
            options: required(kind, "options", self.options)?,
            correct,
            explanation: required(kind, "explanation", self.explanation)?,
            unit: required(kind, "unit", self.unit)?,
            grade,
            origin: EntityOrigin::Remote,
        };
        question.normalize();
        question.validate().map_err(invalid)?;
        Ok(question)
    }
}
