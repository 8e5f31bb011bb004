//! Pending local change journal.
//!
//! # Responsibility
//! - Apply one local change to the working collections.
//! - Remember every change until a load that could have observed it remotely
//!   has completed, and replay outstanding changes onto each load result.
//!
//! # Invariants
//! - Replay is idempotent: adds skip ids already present, updates reapply the
//!   same normalized fields, deletes of missing ids do nothing.
//! - Working collections only hold entities inside the active scope.

use crate::catalog::StaticCatalog;
use crate::model::grade::{Grade, Scope};
use crate::model::grammar_rule::{GrammarRule, RulePatch};
use crate::model::quiz_question::{QuestionPatch, QuizQuestion};
use crate::model::EntityKind;
use log::warn;

/// Entity an update or delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    /// Id that names the same entity in every scope.
    Id(String),
    /// Catalog entry addressed by its position within its grade; its served
    /// id is positional and differs between scopes.
    Catalog { grade: Grade, index: usize },
}

impl Target {
    /// Id of the target in the collections served for `scope`, if present.
    pub(crate) fn resolve(
        &self,
        kind: EntityKind,
        scope: Scope,
        catalog: &StaticCatalog,
    ) -> Option<String> {
        match self {
            Self::Id(id) => Some(id.clone()),
            Self::Catalog { grade, index } => catalog.id_in_scope(kind, scope, *grade, *index),
        }
    }
}

/// One optimistic local mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LocalChange {
    AddRule(GrammarRule),
    AddQuestion(QuizQuestion),
    UpdateRule { target: Target, patch: RulePatch },
    UpdateQuestion { target: Target, patch: QuestionPatch },
    DeleteRule { target: Target },
    DeleteQuestion { target: Target },
}

impl LocalChange {
    pub(crate) fn kind(&self) -> EntityKind {
        match self {
            Self::AddRule(_) | Self::UpdateRule { .. } | Self::DeleteRule { .. } => EntityKind::Rule,
            Self::AddQuestion(_) | Self::UpdateQuestion { .. } | Self::DeleteQuestion { .. } => {
                EntityKind::Question
            }
        }
    }
}

#[derive(Debug)]
struct PendingChange {
    seq: u64,
    change: LocalChange,
    /// Latest started load generation when the remote write was confirmed.
    confirmed_at: Option<u64>,
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    next_seq: u64,
    entries: Vec<PendingChange>,
}

impl Journal {
    /// Records a change that was already applied locally; returns its sequence.
    pub(crate) fn record(&mut self, change: LocalChange) -> u64 {
        self.next_seq += 1;
        self.entries.push(PendingChange {
            seq: self.next_seq,
            change,
            confirmed_at: None,
        });
        self.next_seq
    }

    /// Marks a change as accepted by the remote store.
    pub(crate) fn confirm(&mut self, seq: u64, latest_generation: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.seq == seq) {
            entry.confirmed_at = Some(latest_generation);
        }
    }

    /// Reapplies every outstanding change, oldest first.
    pub(crate) fn replay(
        &self,
        scope: Scope,
        catalog: &StaticCatalog,
        rules: &mut Vec<GrammarRule>,
        questions: &mut Vec<QuizQuestion>,
    ) {
        for entry in &self.entries {
            apply_change(scope, catalog, rules, questions, &entry.change);
        }
    }

    /// Drops confirmed changes that the completed load already reflects.
    ///
    /// A change is reflected when it was confirmed before load `generation`
    /// started and that load took its data for the change's kind from the
    /// remote store.
    pub(crate) fn settle(&mut self, generation: u64, remote_kinds: &[EntityKind]) {
        self.entries.retain(|entry| {
            let observed = entry
                .confirmed_at
                .is_some_and(|confirmed| confirmed < generation);
            !(observed && remote_kinds.contains(&entry.change.kind()))
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Applies one change to the working collections; returns whether anything
/// changed.
pub(crate) fn apply_change(
    scope: Scope,
    catalog: &StaticCatalog,
    rules: &mut Vec<GrammarRule>,
    questions: &mut Vec<QuizQuestion>,
    change: &LocalChange,
) -> bool {
    match change {
        LocalChange::AddRule(rule) => {
            if !scope.contains(rule.grade) || rules.iter().any(|r| r.id == rule.id) {
                return false;
            }
            rules.push(rule.clone());
            true
        }
        LocalChange::AddQuestion(question) => {
            if !scope.contains(question.grade) || questions.iter().any(|q| q.id == question.id) {
                return false;
            }
            questions.push(question.clone());
            true
        }
        LocalChange::UpdateRule { target, patch } => {
            let Some(id) = target.resolve(EntityKind::Rule, scope, catalog) else {
                return false;
            };
            let Some(index) = rules.iter().position(|rule| rule.id_str() == id) else {
                return false;
            };
            let mut merged = rules[index].clone();
            merged.apply_patch(patch);
            merged.normalize();
            if let Err(err) = merged.validate() {
                warn!("event=journal_replay module=resolver status=skipped kind=rule id={id} error={err}");
                return false;
            }
            if scope.contains(merged.grade) {
                rules[index] = merged;
            } else {
                rules.remove(index);
            }
            true
        }
        LocalChange::UpdateQuestion { target, patch } => {
            let Some(id) = target.resolve(EntityKind::Question, scope, catalog) else {
                return false;
            };
            let Some(index) = questions.iter().position(|question| question.id_str() == id) else {
                return false;
            };
            let mut merged = questions[index].clone();
            merged.apply_patch(patch);
            merged.normalize();
            if let Err(err) = merged.validate() {
                warn!("event=journal_replay module=resolver status=skipped kind=question id={id} error={err}");
                return false;
            }
            if scope.contains(merged.grade) {
                questions[index] = merged;
            } else {
                questions.remove(index);
            }
            true
        }
        LocalChange::DeleteRule { target } => {
            let Some(id) = target.resolve(EntityKind::Rule, scope, catalog) else {
                return false;
            };
            let before = rules.len();
            rules.retain(|rule| rule.id_str() != id);
            rules.len() != before
        }
        LocalChange::DeleteQuestion { target } => {
            let Some(id) = target.resolve(EntityKind::Question, scope, catalog) else {
                return false;
            };
            let before = questions.len();
            questions.retain(|question| question.id_str() != id);
            questions.len() != before
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_change, Journal, LocalChange, Target};
    use crate::catalog::StaticCatalog;
    use crate::model::grade::{Grade, Scope};
    use crate::model::grammar_rule::{GrammarRule, RulePatch};
    use crate::model::quiz_question::{QuestionPatch, QuizQuestion};
    use crate::model::{EntityKind, EntityOrigin};

    fn grade(value: u8) -> Grade {
        Grade::new(value).unwrap()
    }

    fn rule(id: &str, grade_value: u8) -> GrammarRule {
        GrammarRule {
            id: Some(id.to_string()),
            title: format!("Rule {id}"),
            explanation: "Explanation".to_string(),
            examples: vec!["Example".to_string()],
            unit: "Unit 1".to_string(),
            grade: grade(grade_value),
            origin: EntityOrigin::Local,
        }
    }

    fn question(id: &str) -> QuizQuestion {
        QuizQuestion {
            id: Some(id.to_string()),
            question: "Pick".to_string(),
            options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            correct: 2,
            explanation: "Because".to_string(),
            unit: "Unit 1".to_string(),
            grade: grade(3),
            origin: EntityOrigin::Remote,
        }
    }

    #[test]
    fn add_is_idempotent_and_scope_bound() {
        let mut rules = Vec::new();
        let mut questions = Vec::new();
        let catalog = StaticCatalog::empty();
        let scope = Scope::Grade(grade(2));
        let change = LocalChange::AddRule(rule("x", 2));

        assert!(apply_change(scope, &catalog, &mut rules, &mut questions, &change));
        assert!(!apply_change(scope, &catalog, &mut rules, &mut questions, &change));
        assert_eq!(rules.len(), 1);

        let other_grade = LocalChange::AddRule(rule("y", 5));
        assert!(!apply_change(scope, &catalog, &mut rules, &mut questions, &other_grade));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn update_moving_out_of_scope_removes_entity() {
        let mut rules = vec![rule("x", 2)];
        let mut questions = Vec::new();
        let change = LocalChange::UpdateRule {
            target: Target::Id("x".to_string()),
            patch: RulePatch {
                grade: Some(grade(4)),
                ..RulePatch::default()
            },
        };
        assert!(apply_change(
            Scope::Grade(grade(2)),
            &StaticCatalog::empty(),
            &mut rules,
            &mut questions,
            &change
        ));
        assert!(rules.is_empty());
    }

    #[test]
    fn replayed_update_that_no_longer_validates_is_skipped() {
        let mut rules = Vec::new();
        let mut questions = vec![question("q")];
        let change = LocalChange::UpdateQuestion {
            target: Target::Id("q".to_string()),
            patch: QuestionPatch {
                options: Some(vec!["a".to_string(), "b".to_string()]),
                ..QuestionPatch::default()
            },
        };
        assert!(!apply_change(
            Scope::All,
            &StaticCatalog::empty(),
            &mut rules,
            &mut questions,
            &change
        ));
        assert_eq!(questions[0].options.len(), 3);
    }

    #[test]
    fn delete_of_missing_id_changes_nothing() {
        let mut rules = vec![rule("x", 2)];
        let mut questions = Vec::new();
        let change = LocalChange::DeleteRule {
            target: Target::Id("missing".to_string()),
        };
        assert!(!apply_change(
            Scope::All,
            &StaticCatalog::empty(),
            &mut rules,
            &mut questions,
            &change
        ));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn settle_drops_only_confirmed_changes_seen_by_a_later_remote_load() {
        let mut journal = Journal::default();
        let confirmed = journal.record(LocalChange::AddRule(rule("a", 1)));
        let unconfirmed = journal.record(LocalChange::AddRule(rule("b", 1)));
        let _question = journal.record(LocalChange::DeleteQuestion {
            target: Target::Id("q".to_string()),
        });
        assert_ne!(confirmed, unconfirmed);

        journal.confirm(confirmed, 1);
        journal.settle(1, &[EntityKind::Rule]);
        assert_eq!(journal.len(), 3, "load 1 started before confirmation");

        journal.settle(2, &[EntityKind::Question]);
        assert_eq!(journal.len(), 3, "rules came from static data");

        journal.settle(2, &[EntityKind::Rule, EntityKind::Question]);
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn replay_applies_in_recording_order() {
        let mut journal = Journal::default();
        journal.record(LocalChange::AddRule(rule("a", 1)));
        journal.record(LocalChange::UpdateRule {
            target: Target::Id("a".to_string()),
            patch: RulePatch {
                title: Some("Renamed".to_string()),
                ..RulePatch::default()
            },
        });

        let mut rules = Vec::new();
        let mut questions = Vec::new();
        journal.replay(Scope::All, &StaticCatalog::empty(), &mut rules, &mut questions);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].title, "Renamed");
    }

    #[test]
    fn catalog_targets_follow_the_entry_across_scopes() {
        let entry = |title: &str| {
            format!(r#"{{"title":"{title}","explanation":"E","examples":["x"],"unit":"U"}}"#)
        };
        let first = format!(r#"{{"rules":[{}]}}"#, entry("G1"));
        let second = format!(
            r#"{{"rules":[{},{},{}]}}"#,
            entry("G2-A"),
            entry("G2-B"),
            entry("G2-C")
        );
        let catalog =
            StaticCatalog::from_json_sources([(1, first.as_str()), (2, second.as_str())]).unwrap();

        let mut journal = Journal::default();
        journal.record(LocalChange::DeleteRule {
            target: Target::Catalog {
                grade: grade(2),
                index: 1,
            },
        });
        journal.record(LocalChange::UpdateRule {
            target: Target::Catalog {
                grade: grade(2),
                index: 0,
            },
            patch: RulePatch {
                title: Some("G2-A edited".to_string()),
                ..RulePatch::default()
            },
        });

        let titles = |rules: &[GrammarRule]| {
            rules.iter().map(|rule| rule.title.clone()).collect::<Vec<_>>()
        };
        let mut questions = Vec::new();

        let mut all = catalog.rules_for(Scope::All);
        journal.replay(Scope::All, &catalog, &mut all, &mut questions);
        assert_eq!(titles(&all), ["G1", "G2-A edited", "G2-C"]);

        let second_grade = Scope::Grade(grade(2));
        let mut graded = catalog.rules_for(second_grade);
        journal.replay(second_grade, &catalog, &mut graded, &mut questions);
        assert_eq!(titles(&graded), ["G2-A edited", "G2-C"]);

        let first_grade = Scope::Grade(grade(1));
        let mut untouched = catalog.rules_for(first_grade);
        journal.replay(first_grade, &catalog, &mut untouched, &mut questions);
        assert_eq!(titles(&untouched), ["G1"]);
    }
}
