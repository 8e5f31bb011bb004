//! Grade levels and request scopes.

use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// School grade level, always within `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Grade(u8);

impl Grade {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 12;

    /// Validates and wraps a raw grade number.
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::UnsupportedGrade(i64::from(value)))
        }
    }

    /// Validates a wide integer, e.g. a database column.
    pub fn from_i64(value: i64) -> Result<Self, ValidationError> {
        u8::try_from(value)
            .map_err(|_| ValidationError::UnsupportedGrade(value))
            .and_then(Self::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All supported grades in ascending order.
    pub fn supported() -> impl Iterator<Item = Grade> {
        (Self::MIN..=Self::MAX).map(Grade)
    }
}

impl TryFrom<u8> for Grade {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Grade> for u8 {
    fn from(value: Grade) -> Self {
        value.0
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The grade (or every grade) a data request is filtered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    All,
    Grade(Grade),
}

impl Scope {
    pub fn grade(self) -> Option<Grade> {
        match self {
            Self::All => None,
            Self::Grade(grade) => Some(grade),
        }
    }

    /// Returns whether an entity of `grade` belongs to this scope.
    pub fn contains(self, grade: Grade) -> bool {
        match self {
            Self::All => true,
            Self::Grade(scoped) => scoped == grade,
        }
    }
}

impl From<Option<Grade>> for Scope {
    fn from(value: Option<Grade>) -> Self {
        value.map_or(Self::All, Self::Grade)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Grade(grade) => write!(f, "grade-{grade}"),
        }
    }
}
