//! In-memory filtering over resolved collections.
//!
//! # Invariants
//! - Filtering never reorders; output keeps input order.
//! - Blank filter values behave as "no filter".

use crate::model::grammar_rule::GrammarRule;
use crate::model::quiz_question::QuizQuestion;
use std::collections::HashSet;

/// View filter applied after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    /// Exact unit label.
    pub unit: Option<String>,
    /// Case-insensitive substring over the entity's text fields.
    pub search: Option<String>,
}

impl EntityFilter {
    fn unit(&self) -> Option<&str> {
        self.unit
            .as_deref()
            .map(str::trim)
            .filter(|unit| !unit.is_empty())
    }

    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(str::to_lowercase)
    }

    pub fn is_empty(&self) -> bool {
        self.unit().is_none() && self.needle().is_none()
    }
}

fn matches_any<'a>(needle: &str, mut fields: impl Iterator<Item = &'a str>) -> bool {
    fields.any(|field| field.to_lowercase().contains(needle))
}

pub fn filter_rules(rules: &[GrammarRule], filter: &EntityFilter) -> Vec<GrammarRule> {
    let unit = filter.unit();
    let needle = filter.needle();
    rules
        .iter()
        .filter(|rule| unit.map_or(true, |unit| rule.unit == unit))
        .filter(|rule| {
            needle.as_deref().map_or(true, |needle| {
                let fields = [rule.title.as_str(), rule.explanation.as_str()]
                    .into_iter()
                    .chain(rule.examples.iter().map(String::as_str));
                matches_any(needle, fields)
            })
        })
        .cloned()
        .collect()
}

pub fn filter_questions(questions: &[QuizQuestion], filter: &EntityFilter) -> Vec<QuizQuestion> {
    let unit = filter.unit();
    let needle = filter.needle();
    questions
        .iter()
        .filter(|question| unit.map_or(true, |unit| question.unit == unit))
        .filter(|question| {
            needle.as_deref().map_or(true, |needle| {
                let fields = [question.question.as_str(), question.explanation.as_str()]
                    .into_iter()
                    .chain(question.options.iter().map(String::as_str));
                matches_any(needle, fields)
            })
        })
        .cloned()
        .collect()
}

/// Unit labels in first-seen order.
pub fn distinct_units<'a>(units: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    units
        .into_iter()
        .filter(|unit| seen.insert(*unit))
        .map(str::to_string)
        .collect()
}
