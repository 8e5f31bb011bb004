//! Bundled static catalog of grammar rules and quiz questions.
//!
//! # Responsibility
//! - Parse the per-grade catalogs shipped with the binary exactly once.
//! - Serve read-only, scope-filtered copies with deterministic fallback ids.
//!
//! # Invariants
//! - Catalog content is immutable after construction.
//! - Every entry carries the grade of the catalog that owns it.
//! - Fallback ids depend only on kind, grade and position in the scope's
//!   concatenation, so repeated reads of one scope yield identical ids.

use crate::model::grade::{Grade, Scope};
use crate::model::grammar_rule::GrammarRule;
use crate::model::quiz_question::QuizQuestion;
use crate::model::validation::ValidationError;
use crate::model::{EntityKind, EntityOrigin};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const BUILTIN_SOURCES: &[(u8, &str)] = &[
    (1, include_str!("data/grade_01.json")),
    (2, include_str!("data/grade_02.json")),
    (3, include_str!("data/grade_03.json")),
    (4, include_str!("data/grade_04.json")),
    (5, include_str!("data/grade_05.json")),
    (6, include_str!("data/grade_06.json")),
    (9, include_str!("data/grade_09.json")),
    (10, include_str!("data/grade_10.json")),
    (11, include_str!("data/grade_11.json")),
    (12, include_str!("data/grade_12.json")),
];

/// Static catalog construction error.
#[derive(Debug)]
pub enum CatalogError {
    UnsupportedGrade(ValidationError),
    DuplicateGrade(Grade),
    Parse {
        grade: Grade,
        source: serde_json::Error,
    },
    InvalidEntry {
        grade: Grade,
        kind: EntityKind,
        index: usize,
        source: ValidationError,
    },
    GradeMismatch {
        expected: Grade,
        found: Grade,
    },
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedGrade(err) => write!(f, "{err}"),
            Self::DuplicateGrade(grade) => write!(f, "catalog for grade {grade} given twice"),
            Self::Parse { grade, source } => {
                write!(f, "catalog for grade {grade} is malformed: {source}")
            }
            Self::InvalidEntry {
                grade,
                kind,
                index,
                source,
            } => write!(
                f,
                "catalog grade {grade} {} #{index} is invalid: {source}",
                kind.as_str()
            ),
            Self::GradeMismatch { expected, found } => write!(
                f,
                "catalog for grade {expected} contains an entry for grade {found}"
            ),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnsupportedGrade(err) => Some(err),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidEntry { source, .. } => Some(source),
            Self::DuplicateGrade(_) | Self::GradeMismatch { .. } => None,
        }
    }
}

/// Rules and questions bundled for one grade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradeCatalog {
    pub rules: Vec<GrammarRule>,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    rules: Vec<CatalogRuleEntry>,
    #[serde(default)]
    questions: Vec<CatalogQuestionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogRuleEntry {
    #[serde(default)]
    id: Option<String>,
    title: String,
    explanation: String,
    examples: Vec<String>,
    unit: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogQuestionEntry {
    #[serde(default)]
    id: Option<String>,
    question: String,
    options: Vec<String>,
    correct: usize,
    explanation: String,
    unit: String,
}

/// Read-only grade -> content map shared by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticCatalog {
    grades: BTreeMap<Grade, GradeCatalog>,
}

impl StaticCatalog {
    /// Catalog with no content; every scope resolves to empty collections.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses the catalogs compiled into this crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_sources(BUILTIN_SOURCES.iter().copied())
    }

    /// Parses one JSON document per grade.
    ///
    /// Entries omit `grade`; the owning grade is stamped onto each of them.
    pub fn from_json_sources<'a>(
        sources: impl IntoIterator<Item = (u8, &'a str)>,
    ) -> Result<Self, CatalogError> {
        let mut grades = BTreeMap::new();
        for (raw_grade, json) in sources {
            let grade = Grade::new(raw_grade).map_err(CatalogError::UnsupportedGrade)?;
            let file: CatalogFile = serde_json::from_str(json)
                .map_err(|source| CatalogError::Parse { grade, source })?;

            let rules = file
                .rules
                .into_iter()
                .map(|entry| GrammarRule {
                    id: entry.id,
                    title: entry.title,
                    explanation: entry.explanation,
                    examples: entry.examples,
                    unit: entry.unit,
                    grade,
                    origin: EntityOrigin::Static,
                })
                .collect();
            let questions = file
                .questions
                .into_iter()
                .map(|entry| QuizQuestion {
                    id: entry.id,
                    question: entry.question,
                    options: entry.options,
                    correct: entry.correct,
                    explanation: entry.explanation,
                    unit: entry.unit,
                    grade,
                    origin: EntityOrigin::Static,
                })
                .collect();

            if grades
                .insert(grade, GradeCatalog { rules, questions })
                .is_some()
            {
                return Err(CatalogError::DuplicateGrade(grade));
            }
        }
        Self::from_grades(grades)
    }

    /// Builds a catalog from already-typed content.
    ///
    /// Every entry is normalized, validated and marked as static.
    pub fn from_grades(grades: BTreeMap<Grade, GradeCatalog>) -> Result<Self, CatalogError> {
        let mut checked = BTreeMap::new();
        for (grade, mut catalog) in grades {
            for (index, rule) in catalog.rules.iter_mut().enumerate() {
                if rule.grade != grade {
                    return Err(CatalogError::GradeMismatch {
                        expected: grade,
                        found: rule.grade,
                    });
                }
                rule.normalize();
                rule.validate().map_err(|source| CatalogError::InvalidEntry {
                    grade,
                    kind: EntityKind::Rule,
                    index,
                    source,
                })?;
                rule.origin = EntityOrigin::Static;
            }
            for (index, question) in catalog.questions.iter_mut().enumerate() {
                if question.grade != grade {
                    return Err(CatalogError::GradeMismatch {
                        expected: grade,
                        found: question.grade,
                    });
                }
                question.normalize();
                question
                    .validate()
                    .map_err(|source| CatalogError::InvalidEntry {
                        grade,
                        kind: EntityKind::Question,
                        index,
                        source,
                    })?;
                question.origin = EntityOrigin::Static;
            }
            checked.insert(grade, catalog);
        }
        Ok(Self { grades: checked })
    }

    /// Grades that ship content, ascending.
    pub fn grades(&self) -> impl Iterator<Item = Grade> + '_ {
        self.grades.keys().copied()
    }

    pub fn grade(&self, grade: Grade) -> Option<&GradeCatalog> {
        self.grades.get(&grade)
    }

    /// Static rules for `scope` with fallback ids assigned.
    pub fn rules_for(&self, scope: Scope) -> Vec<GrammarRule> {
        let mut rules = self.collect(scope, |catalog| &catalog.rules);
        for (index, rule) in rules.iter_mut().enumerate() {
            if rule.id.as_deref().map_or(true, str::is_empty) {
                rule.id = Some(fallback_id(EntityKind::Rule, rule.grade, index));
            }
        }
        rules
    }

    /// Static questions for `scope` with fallback ids assigned.
    pub fn questions_for(&self, scope: Scope) -> Vec<QuizQuestion> {
        let mut questions = self.collect(scope, |catalog| &catalog.questions);
        for (index, question) in questions.iter_mut().enumerate() {
            if question.id.as_deref().map_or(true, str::is_empty) {
                question.id = Some(fallback_id(EntityKind::Question, question.grade, index));
            }
        }
        questions
    }

    /// Position of the entry served as `id` for `scope`, counted within its
    /// own grade. Unlike the id, the result does not depend on the scope.
    pub fn locate(&self, kind: EntityKind, scope: Scope, id: &str) -> Option<(Grade, usize)> {
        let served = self.served_ids(kind, scope);
        let position = served.iter().position(|(_, served_id)| served_id == id)?;
        let grade = served[position].0;
        let index = served[..position]
            .iter()
            .filter(|(entry_grade, _)| *entry_grade == grade)
            .count();
        Some((grade, index))
    }

    /// Id under which the `index`-th entry of `grade` is served for `scope`.
    pub fn id_in_scope(
        &self,
        kind: EntityKind,
        scope: Scope,
        grade: Grade,
        index: usize,
    ) -> Option<String> {
        if !scope.contains(grade) {
            return None;
        }
        self.served_ids(kind, scope)
            .into_iter()
            .filter(|(entry_grade, _)| *entry_grade == grade)
            .nth(index)
            .map(|(_, id)| id)
    }

    fn served_ids(&self, kind: EntityKind, scope: Scope) -> Vec<(Grade, String)> {
        match kind {
            EntityKind::Rule => self
                .rules_for(scope)
                .into_iter()
                .map(|rule| (rule.grade, rule.id.unwrap_or_default()))
                .collect(),
            EntityKind::Question => self
                .questions_for(scope)
                .into_iter()
                .map(|question| (question.grade, question.id.unwrap_or_default()))
                .collect(),
        }
    }

    fn collect<T: Clone>(&self, scope: Scope, pick: impl Fn(&GradeCatalog) -> &Vec<T>) -> Vec<T> {
        match scope {
            Scope::Grade(grade) => self
                .grades
                .get(&grade)
                .map(|catalog| pick(catalog).clone())
                .unwrap_or_default(),
            Scope::All => Grade::supported()
                .filter_map(|grade| self.grades.get(&grade))
                .flat_map(|catalog| pick(catalog).iter().cloned())
                .collect(),
        }
    }
}

/// Deterministic id for a static entity lacking one: `<kind>-<grade>-<index>`.
pub fn fallback_id(kind: EntityKind, grade: Grade, index: usize) -> String {
    format!("{}-{}-{}", kind.as_str(), grade, index)
}
