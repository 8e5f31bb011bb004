//! Grammar rule record, creation draft and partial patch.
//!
//! # Invariants
//! - `title`, `explanation` and `unit` are non-blank.
//! - `examples` holds at least one non-blank entry; blank entries are
//!   dropped by `normalize()` before any persistence.

use crate::model::grade::Grade;
use crate::model::validation::{normalize_label, normalize_text, require_non_blank, ValidationError};
use crate::model::EntityOrigin;
use serde::{Deserialize, Serialize};

/// One grammar rule with worked examples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarRule {
    /// Optional until the resolver or a creation assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub explanation: String,
    pub examples: Vec<String>,
    /// Grouping label; may recur across grades with unrelated content.
    pub unit: String,
    pub grade: Grade,
    #[serde(skip)]
    pub origin: EntityOrigin,
}

/// Input for creating a new grammar rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDraft {
    pub title: String,
    pub explanation: String,
    pub examples: Vec<String>,
    pub unit: String,
    pub grade: Grade,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RulePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
}

impl GrammarRule {
    /// Builds a normalized, validated rule without an id.
    pub fn from_draft(draft: RuleDraft) -> Result<Self, ValidationError> {
        let mut rule = Self {
            id: None,
            title: draft.title,
            explanation: draft.explanation,
            examples: draft.examples,
            unit: draft.unit,
            grade: draft.grade,
            origin: EntityOrigin::Local,
        };
        rule.normalize();
        rule.validate()?;
        Ok(rule)
    }

    /// Trims text fields and drops blank examples.
    pub fn normalize(&mut self) {
        self.title = normalize_label(&self.title);
        self.explanation = normalize_text(&self.explanation);
        self.unit = normalize_label(&self.unit);
        self.examples = self
            .examples
            .iter()
            .map(|example| normalize_text(example))
            .filter(|example| !example.is_empty())
            .collect();
    }

    /// Checks field invariants. Does not normalize.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_blank("title", &self.title)?;
        require_non_blank("explanation", &self.explanation)?;
        require_non_blank("unit", &self.unit)?;
        if !self.examples.iter().any(|example| !example.trim().is_empty()) {
            return Err(ValidationError::EmptyExamples);
        }
        Ok(())
    }

    /// Overwrites every field present in `patch`.
    pub fn apply_patch(&mut self, patch: &RulePatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(explanation) = &patch.explanation {
            self.explanation = explanation.clone();
        }
        if let Some(examples) = &patch.examples {
            self.examples = examples.clone();
        }
        if let Some(unit) = &patch.unit {
            self.unit = unit.clone();
        }
        if let Some(grade) = patch.grade {
            self.grade = grade;
        }
    }

    /// Returns the id, or an empty string when unassigned.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

impl RulePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.explanation.is_none()
            && self.examples.is_none()
            && self.unit.is_none()
            && self.grade.is_none()
    }

    /// Rebuilds this patch with the normalized values of `merged`.
    ///
    /// Only fields present in `self` are carried, so the remote store receives
    /// exactly the fields the caller asked to change.
    pub fn normalized_from(&self, merged: &GrammarRule) -> Self {
        Self {
            title: self.title.as_ref().map(|_| merged.title.clone()),
            explanation: self.explanation.as_ref().map(|_| merged.explanation.clone()),
            examples: self.examples.as_ref().map(|_| merged.examples.clone()),
            unit: self.unit.as_ref().map(|_| merged.unit.clone()),
            grade: self.grade.map(|_| merged.grade),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GrammarRule, RuleDraft, RulePatch};
    use crate::model::grade::Grade;
    use crate::model::validation::ValidationError;

    fn draft() -> RuleDraft {
        RuleDraft {
            title: "  Plural   nouns ".to_string(),
            explanation: "Add -s to most nouns.".to_string(),
            examples: vec!["cat -> cats".to_string(), "   ".to_string()],
            unit: "Unit 2".to_string(),
            grade: Grade::new(2).unwrap(),
        }
    }

    #[test]
    fn from_draft_normalizes_and_drops_blank_examples() {
        let rule = GrammarRule::from_draft(draft()).expect("draft should be valid");
        assert_eq!(rule.title, "Plural nouns");
        assert_eq!(rule.examples, vec!["cat -> cats".to_string()]);
        assert!(rule.id.is_none());
    }

    #[test]
    fn from_draft_rejects_examples_that_trim_to_nothing() {
        let mut input = draft();
        input.examples = vec![String::new(), "  ".to_string()];
        assert_eq!(
            GrammarRule::from_draft(input),
            Err(ValidationError::EmptyExamples)
        );
    }

    #[test]
    fn from_draft_rejects_blank_title() {
        let mut input = draft();
        input.title = "\t".to_string();
        assert_eq!(
            GrammarRule::from_draft(input),
            Err(ValidationError::EmptyField("title"))
        );
    }

    #[test]
    fn apply_patch_overwrites_only_present_fields() {
        let mut rule = GrammarRule::from_draft(draft()).unwrap();
        rule.apply_patch(&RulePatch {
            unit: Some("Unit 3".to_string()),
            ..RulePatch::default()
        });
        assert_eq!(rule.unit, "Unit 3");
        assert_eq!(rule.title, "Plural nouns");
    }

    #[test]
    fn normalized_from_keeps_patch_shape() {
        let mut merged = GrammarRule::from_draft(draft()).unwrap();
        let patch = RulePatch {
            title: Some("  Irregular  plurals ".to_string()),
            ..RulePatch::default()
        };
        merged.apply_patch(&patch);
        merged.normalize();

        let normalized = patch.normalized_from(&merged);
        assert_eq!(normalized.title.as_deref(), Some("Irregular plurals"));
        assert!(normalized.examples.is_none());
        assert!(!normalized.is_empty());
        assert!(RulePatch::default().is_empty());
    }
}
