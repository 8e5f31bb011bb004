//! Multiple-choice quiz question record, draft and patch.
//!
//! # Invariants
//! - At least `MIN_OPTIONS` options, none blank.
//! - `0 <= correct < options.len()`.

use crate::model::grade::Grade;
use crate::model::validation::{normalize_label, normalize_text, require_non_blank, ValidationError};
use crate::model::EntityOrigin;
use serde::{Deserialize, Serialize};

/// Minimum number of answer options per question.
pub const MIN_OPTIONS: usize = 2;

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    pub correct: usize,
    pub explanation: String,
    pub unit: String,
    pub grade: Grade,
    #[serde(skip)]
    pub origin: EntityOrigin,
}

/// Input for creating a new question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
    pub explanation: String,
    pub unit: String,
    pub grade: Grade,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuestionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
}

impl QuizQuestion {
    /// Builds a normalized, validated question without an id.
    pub fn from_draft(draft: QuestionDraft) -> Result<Self, ValidationError> {
        let mut question = Self {
            id: None,
            question: draft.question,
            options: draft.options,
            correct: draft.correct,
            explanation: draft.explanation,
            unit: draft.unit,
            grade: draft.grade,
            origin: EntityOrigin::Local,
        };
        question.normalize();
        question.validate()?;
        Ok(question)
    }

    /// Trims text fields. Options keep their positions so `correct` stays put.
    pub fn normalize(&mut self) {
        self.question = normalize_label(&self.question);
        self.explanation = normalize_text(&self.explanation);
        self.unit = normalize_label(&self.unit);
        self.options = self
            .options
            .iter()
            .map(|option| normalize_label(option))
            .collect();
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("question", &self.question)?;
        require_non_blank("explanation", &self.explanation)?;
        require_non_blank("unit", &self.unit)?;
        if self.options.len() < MIN_OPTIONS {
            return Err(ValidationError::TooFewOptions {
                count: self.options.len(),
            });
        }
        if let Some(index) = self
            .options
            .iter()
            .position(|option| option.trim().is_empty())
        {
            return Err(ValidationError::EmptyOption { index });
        }
        if self.correct >= self.options.len() {
            return Err(ValidationError::CorrectOutOfRange {
                correct: self.correct,
                options: self.options.len(),
            });
        }
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: &QuestionPatch) {
        if let Some(question) = &patch.question {
            self.question = question.clone();
        }
        if let Some(options) = &patch.options {
            self.options = options.clone();
        }
        if let Some(correct) = patch.correct {
            self.correct = correct;
        }
        if let Some(explanation) = &patch.explanation {
            self.explanation = explanation.clone();
        }
        if let Some(unit) = &patch.unit {
            self.unit = unit.clone();
        }
        if let Some(grade) = patch.grade {
            self.grade = grade;
        }
    }

    /// Text of the correct option.
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct).map(String::as_str)
    }

    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

impl QuestionPatch {
    pub fn is_empty(&self) -> bool {
        self.question.is_none()
            && self.options.is_none()
            && self.correct.is_none()
            && self.explanation.is_none()
            && self.unit.is_none()
            && self.grade.is_none()
    }

    /// Rebuilds this patch with the normalized values of `merged`.
    pub fn normalized_from(&self, merged: &QuizQuestion) -> Self {
        Self {
            question: self.question.as_ref().map(|_| merged.question.clone()),
            options: self.options.as_ref().map(|_| merged.options.clone()),
            correct: self.correct.map(|_| merged.correct),
            explanation: self.explanation.as_ref().map(|_| merged.explanation.clone()),
            unit: self.unit.as_ref().map(|_| merged.unit.clone()),
            grade: self.grade.map(|_| merged.grade),
        }
    }
}
