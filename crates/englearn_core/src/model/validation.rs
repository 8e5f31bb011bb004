//! Field validation errors and text normalization helpers.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Validation failure for drafts, patches and persisted records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Grade outside `1..=12`.
    UnsupportedGrade(i64),
    /// Required text field is blank after trim.
    EmptyField(&'static str),
    /// Every rule example was blank.
    EmptyExamples,
    /// Question has fewer options than the minimum.
    TooFewOptions { count: usize },
    /// One question option is blank.
    EmptyOption { index: usize },
    /// `correct` does not index an option.
    CorrectOutOfRange { correct: usize, options: usize },
    /// Grade change requested on a static catalog entity.
    GradeImmutable { id: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedGrade(value) => {
                write!(f, "grade {value} is not supported; expected 1..=12")
            }
            Self::EmptyField(field) => write!(f, "{field} must not be blank"),
            Self::EmptyExamples => write!(f, "examples must contain at least one non-empty entry"),
            Self::TooFewOptions { count } => {
                write!(f, "question needs at least 2 options, got {count}")
            }
            Self::EmptyOption { index } => write!(f, "option {index} must not be blank"),
            Self::CorrectOutOfRange { correct, options } => write!(
                f,
                "correct index {correct} is out of range for {options} option(s)"
            ),
            Self::GradeImmutable { id } => {
                write!(f, "grade of static entity `{id}` cannot be changed")
            }
        }
    }
}

impl Error for ValidationError {}

/// Trims and collapses interior whitespace runs to one space.
///
/// Used for single-line labels (titles, units, questions, options).
pub fn normalize_label(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

/// Trims multi-line text without touching interior layout.
pub fn normalize_text(value: &str) -> String {
    value.trim().to_string()
}

pub(crate) fn require_non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}
