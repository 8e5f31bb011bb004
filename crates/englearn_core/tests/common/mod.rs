#![allow(dead_code)]

use async_trait::async_trait;
use englearn_core::remote::{RemoteQuestionRow, RemoteRuleRow};
use englearn_core::{
    DataResolver, Grade, QuestionPatch, RemoteError, RemoteFilter, RemoteResult, RemoteStore,
    ResolverConfig, RulePatch, StaticCatalog,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// In-memory remote store with scriptable failures and gates.
#[derive(Default)]
pub struct ScriptedRemote {
    rules: Mutex<Vec<RemoteRuleRow>>,
    questions: Mutex<Vec<RemoteQuestionRow>>,
    list_failure: Mutex<Option<RemoteError>>,
    write_failure: Mutex<Option<RemoteError>>,
    rule_list_gates: Mutex<VecDeque<Arc<Notify>>>,
    panic_on_list: AtomicBool,
    ignore_filter: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_rules(rows: Vec<RemoteRuleRow>) -> Arc<Self> {
        let remote = Self::default();
        *remote.rules.lock().unwrap() = rows;
        Arc::new(remote)
    }

    pub fn fail_lists(&self, error: RemoteError) {
        *self.list_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_writes(&self, error: RemoteError) {
        *self.write_failure.lock().unwrap() = Some(error);
    }

    pub fn panic_on_list(&self) {
        self.panic_on_list.store(true, Ordering::SeqCst);
    }

    /// Listings return every row regardless of the requested grade.
    pub fn ignore_filter(&self) {
        self.ignore_filter.store(true, Ordering::SeqCst);
    }

    /// Next `list_rules` call snapshots its rows, then waits for the gate.
    pub fn gate_next_rule_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.rule_list_gates
            .lock()
            .unwrap()
            .push_back(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .filter_map(|row| row.id.clone())
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_list(&self) -> RemoteResult<()> {
        if self.panic_on_list.load(Ordering::SeqCst) {
            panic!("scripted remote listing panic");
        }
        match self.list_failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn matches(&self, grade: Option<i64>, filter: &RemoteFilter) -> bool {
        self.ignore_filter.load(Ordering::SeqCst) || in_filter(grade, filter)
    }

    fn check_write(&self) -> RemoteResult<()> {
        match self.write_failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn in_filter(grade: Option<i64>, filter: &RemoteFilter) -> bool {
    filter
        .grade
        .map_or(true, |wanted| grade == Some(i64::from(wanted.get())))
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    fn store_id(&self) -> &str {
        "scripted"
    }

    async fn list_rules(&self, filter: &RemoteFilter) -> RemoteResult<Vec<RemoteRuleRow>> {
        self.record("list_rules".to_string());
        self.check_list()?;
        let rows = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|row| self.matches(row.grade, filter))
            .cloned()
            .collect::<Vec<_>>();
        let gate = self.rule_list_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(rows)
    }

    async fn list_questions(&self, filter: &RemoteFilter) -> RemoteResult<Vec<RemoteQuestionRow>> {
        self.record("list_questions".to_string());
        self.check_list()?;
        Ok(self
            .questions
            .lock()
            .unwrap()
            .iter()
            .filter(|row| self.matches(row.grade, filter))
            .cloned()
            .collect())
    }

    async fn insert_rule(&self, row: &RemoteRuleRow) -> RemoteResult<()> {
        self.record(format!("insert_rule:{}", row.id.as_deref().unwrap_or_default()));
        self.check_write()?;
        self.rules.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn insert_question(&self, row: &RemoteQuestionRow) -> RemoteResult<()> {
        self.record(format!(
            "insert_question:{}",
            row.id.as_deref().unwrap_or_default()
        ));
        self.check_write()?;
        self.questions.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn update_rule_by_id(&self, id: &str, patch: &RulePatch) -> RemoteResult<()> {
        self.record(format!("update_rule:{id}"));
        self.check_write()?;
        let mut rules = self.rules.lock().unwrap();
        let row = rules
            .iter_mut()
            .find(|row| row.id.as_deref() == Some(id))
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if let Some(title) = &patch.title {
            row.title = Some(title.clone());
        }
        if let Some(explanation) = &patch.explanation {
            row.explanation = Some(explanation.clone());
        }
        if let Some(examples) = &patch.examples {
            row.examples = Some(examples.clone());
        }
        if let Some(unit) = &patch.unit {
            row.unit = Some(unit.clone());
        }
        if let Some(grade) = patch.grade {
            row.grade = Some(i64::from(grade.get()));
        }
        Ok(())
    }

    async fn update_question_by_id(&self, id: &str, patch: &QuestionPatch) -> RemoteResult<()> {
        self.record(format!("update_question:{id}"));
        self.check_write()?;
        let mut questions = self.questions.lock().unwrap();
        let row = questions
            .iter_mut()
            .find(|row| row.id.as_deref() == Some(id))
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if let Some(options) = &patch.options {
            row.options = Some(options.clone());
        }
        if let Some(correct) = patch.correct {
            row.correct = i64::try_from(correct).ok();
        }
        Ok(())
    }

    async fn delete_rule_by_id(&self, id: &str) -> RemoteResult<()> {
        self.record(format!("delete_rule:{id}"));
        self.check_write()?;
        let mut rules = self.rules.lock().unwrap();
        let before = rules.len();
        rules.retain(|row| row.id.as_deref() != Some(id));
        if rules.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_question_by_id(&self, id: &str) -> RemoteResult<()> {
        self.record(format!("delete_question:{id}"));
        self.check_write()?;
        let mut questions = self.questions.lock().unwrap();
        let before = questions.len();
        questions.retain(|row| row.id.as_deref() != Some(id));
        if questions.len() == before {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

pub fn grade(value: u8) -> Grade {
    Grade::new(value).unwrap()
}

pub fn rule_row(id: &str, grade: i64) -> RemoteRuleRow {
    RemoteRuleRow {
        id: Some(id.to_string()),
        title: Some(format!("Remote rule {id}")),
        explanation: Some("Remote explanation".to_string()),
        examples: Some(vec!["Remote example".to_string()]),
        unit: Some("Unit R".to_string()),
        grade: Some(grade),
        ..RemoteRuleRow::default()
    }
}

pub fn builtin_catalog() -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::builtin().unwrap())
}

pub fn resolver_with(remote: Option<Arc<ScriptedRemote>>, config: ResolverConfig) -> DataResolver {
    let remote = remote.map(|remote| remote as Arc<dyn RemoteStore>);
    DataResolver::new(builtin_catalog(), remote, config).unwrap()
}

/// Resolver whose remote is configured but unreachable.
pub fn offline_resolver() -> (DataResolver, Arc<ScriptedRemote>) {
    let remote = ScriptedRemote::new();
    remote.fail_lists(RemoteError::Unavailable("offline".to_string()));
    remote.fail_writes(RemoteError::Unavailable("offline".to_string()));
    (
        resolver_with(Some(Arc::clone(&remote)), ResolverConfig::default()),
        remote,
    )
}

pub async fn wait_for_call(remote: &ScriptedRemote, prefix: &str, count: usize) {
    while remote.call_count(prefix) < count {
        tokio::task::yield_now().await;
    }
}
