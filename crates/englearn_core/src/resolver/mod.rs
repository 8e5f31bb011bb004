//! Tiered content resolution with optimistic local-first mutations.
//!
//! # Responsibility
//! - Resolve grammar rules and quiz questions for a scope from the static
//!   catalog and an optional remote store.
//! - Apply create/update/delete locally first and propagate them to the remote
//!   store as detached best-effort tasks.
//!
//! # Invariants
//! - Every entity handed out has a non-empty id unique within its collection.
//! - Only the most recently started load may replace the working collections.
//! - Remote failures never reach callers; only local validation does.
//! - Pending local changes are replayed onto every load result until the
//!   remote store is known to reflect them.

mod journal;

use crate::catalog::StaticCatalog;
use crate::config::{EmptyRemotePolicy, ResolverConfig};
use crate::model::grade::{Grade, Scope};
use crate::model::grammar_rule::{GrammarRule, RuleDraft, RulePatch};
use crate::model::quiz_question::{QuestionDraft, QuestionPatch, QuizQuestion};
use crate::model::validation::ValidationError;
use crate::model::{EntityKind, EntityOrigin};
use crate::remote::{
    RemoteError, RemoteFilter, RemoteQuestionRow, RemoteResult, RemoteRuleRow, RemoteStore,
    RowMappingError,
};
use journal::{apply_change, Journal, LocalChange, Target};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Errors surfaced synchronously by resolver operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// Input failed local invariants; nothing was changed.
    Validation(ValidationError),
    /// Update target is not in the working collection.
    NotFound { kind: EntityKind, id: String },
    /// Constructed outside a tokio runtime.
    RuntimeUnavailable,
}

impl Display for ResolverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{} not found: {id}", kind.as_str()),
            Self::RuntimeUnavailable => write!(f, "resolver requires a tokio runtime"),
        }
    }
}

impl Error for ResolverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ResolverError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Where a resolved collection came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataSource {
    #[default]
    Static,
    Remote,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Remote => "remote",
        }
    }
}

/// Point-in-time view of the resolver for UI consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSnapshot {
    pub scope: Scope,
    pub rules: Vec<GrammarRule>,
    pub questions: Vec<QuizQuestion>,
    pub rules_source: DataSource,
    pub questions_source: DataSource,
    pub loading: bool,
    /// Set only by unexpected load failures, never by remote unavailability.
    pub error: Option<String>,
    /// Local changes not yet known to be reflected remotely.
    pub pending_changes: usize,
}

#[derive(Default)]
struct ResolverState {
    scope: Scope,
    rules: Vec<GrammarRule>,
    questions: Vec<QuizQuestion>,
    rules_source: DataSource,
    questions_source: DataSource,
    loading: bool,
    error: Option<String>,
    /// Scope the working collections were resolved for; trails `scope`
    /// while a load is in flight.
    served: Scope,
    /// Generation of the most recently started load.
    generation: u64,
    journal: Journal,
}

impl ResolverState {
    fn snapshot(&self) -> ResolverSnapshot {
        ResolverSnapshot {
            scope: self.scope,
            rules: self.rules.clone(),
            questions: self.questions.clone(),
            rules_source: self.rules_source,
            questions_source: self.questions_source,
            loading: self.loading,
            error: self.error.clone(),
            pending_changes: self.journal.len(),
        }
    }

    /// Applies a validated change and records it for replay.
    fn commit(&mut self, catalog: &StaticCatalog, change: LocalChange) -> u64 {
        apply_change(self.served, catalog, &mut self.rules, &mut self.questions, &change);
        self.journal.record(change)
    }

    /// Journal key for the working entity `id`.
    ///
    /// Catalog entries are keyed by grade and position so the change still
    /// finds them after a scope switch renumbers their fallback ids.
    fn target(
        &self,
        catalog: &StaticCatalog,
        kind: EntityKind,
        origin: EntityOrigin,
        id: &str,
    ) -> Target {
        let located = match origin {
            EntityOrigin::Static => catalog.locate(kind, self.served, id),
            EntityOrigin::Remote | EntityOrigin::Local => None,
        };
        match located {
            Some((grade, index)) => Target::Catalog { grade, index },
            None => Target::Id(id.to_string()),
        }
    }
}

struct Resolution {
    rules: Vec<GrammarRule>,
    rules_source: DataSource,
    questions: Vec<QuizQuestion>,
    questions_source: DataSource,
    error: Option<String>,
}

struct Shared {
    catalog: Arc<StaticCatalog>,
    remote: Option<Arc<dyn RemoteStore>>,
    config: ResolverConfig,
    runtime: Handle,
    state: Mutex<ResolverState>,
    sync_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.sync_tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves and mutates grade-scoped content.
///
/// Cloning is cheap; clones share the same working set.
#[derive(Clone)]
pub struct DataResolver {
    shared: Arc<Shared>,
}

impl DataResolver {
    /// Creates a resolver bound to the current tokio runtime.
    ///
    /// `remote = None` means no remote store is configured; every load then
    /// resolves to static data and mutations stay local.
    pub fn new(
        catalog: Arc<StaticCatalog>,
        remote: Option<Arc<dyn RemoteStore>>,
        config: ResolverConfig,
    ) -> Result<Self, ResolverError> {
        let runtime = Handle::try_current().map_err(|_| ResolverError::RuntimeUnavailable)?;
        Ok(Self {
            shared: Arc::new(Shared {
                catalog,
                remote,
                config,
                runtime,
                state: Mutex::new(ResolverState::default()),
                sync_tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn snapshot(&self) -> ResolverSnapshot {
        self.shared.lock_state().snapshot()
    }

    pub fn rules(&self) -> Vec<GrammarRule> {
        self.shared.lock_state().rules.clone()
    }

    pub fn questions(&self) -> Vec<QuizQuestion> {
        self.shared.lock_state().questions.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock_state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.shared.lock_state().error.clone()
    }

    pub fn scope(&self) -> Scope {
        self.shared.lock_state().scope
    }

    /// Resolves `scope` and replaces the working set unless a newer load
    /// started in the meantime.
    pub async fn load(&self, scope: Scope) -> ResolverSnapshot {
        let generation = {
            let mut state = self.shared.lock_state();
            state.generation += 1;
            state.scope = scope;
            state.loading = true;
            state.generation
        };
        let started_at = Instant::now();
        info!("event=load module=resolver status=start scope={scope} generation={generation}");

        let resolution = self.resolve(scope).await;

        let mut state = self.shared.lock_state();
        if state.generation != generation {
            info!(
                "event=load_discarded module=resolver status=ok scope={scope} generation={generation} latest={}",
                state.generation
            );
            return state.snapshot();
        }

        let state = &mut *state;
        state.rules = resolution.rules;
        state.questions = resolution.questions;
        state.rules_source = resolution.rules_source;
        state.questions_source = resolution.questions_source;
        state.error = resolution.error;
        state.loading = false;
        state.served = scope;

        state.journal.replay(
            scope,
            &self.shared.catalog,
            &mut state.rules,
            &mut state.questions,
        );
        let remote_kinds = [
            (EntityKind::Rule, state.rules_source),
            (EntityKind::Question, state.questions_source),
        ]
        .into_iter()
        .filter(|(_, source)| *source == DataSource::Remote)
        .map(|(kind, _)| kind)
        .collect::<Vec<_>>();
        state.journal.settle(generation, &remote_kinds);

        info!(
            "event=load module=resolver status=ok scope={scope} generation={generation} rules={} rules_source={} questions={} questions_source={} pending={} duration_ms={}",
            state.rules.len(),
            state.rules_source.as_str(),
            state.questions.len(),
            state.questions_source.as_str(),
            state.journal.len(),
            started_at.elapsed().as_millis()
        );
        state.snapshot()
    }

    /// Re-runs `load` for the current scope.
    pub async fn refresh(&self) -> ResolverSnapshot {
        let scope = self.scope();
        self.load(scope).await
    }

    async fn resolve(&self, scope: Scope) -> Resolution {
        let catalog = &self.shared.catalog;
        let static_rules = catalog.rules_for(scope);
        let static_questions = catalog.questions_for(scope);

        let Some(remote) = self.shared.remote.clone() else {
            debug!("event=remote_fetch module=resolver status=fallback scope={scope} reason=not_configured");
            return Resolution {
                rules: static_rules,
                rules_source: DataSource::Static,
                questions: static_questions,
                questions_source: DataSource::Static,
                error: None,
            };
        };

        let filter = RemoteFilter {
            grade: scope.grade(),
        };
        let limit = self.shared.config.remote_timeout;
        let fetch = self.shared.runtime.spawn(async move {
            tokio::join!(
                bounded(limit, remote.list_rules(&filter)),
                bounded(limit, remote.list_questions(&filter)),
            )
        });

        match fetch.await {
            Ok((rule_rows, question_rows)) => {
                let policy = self.shared.config.empty_remote;
                let (rules, rules_source) = choose(
                    EntityKind::Rule,
                    scope,
                    policy,
                    rule_rows,
                    RemoteRuleRow::into_rule,
                    static_rules,
                );
                let (questions, questions_source) = choose(
                    EntityKind::Question,
                    scope,
                    policy,
                    question_rows,
                    RemoteQuestionRow::into_question,
                    static_questions,
                );
                Resolution {
                    rules,
                    rules_source,
                    questions,
                    questions_source,
                    error: None,
                }
            }
            Err(err) => {
                error!("event=load module=resolver status=error scope={scope} error={err}");
                let (rules, questions) = match scope {
                    Scope::Grade(_) => (static_rules, static_questions),
                    Scope::All => (Vec::new(), Vec::new()),
                };
                Resolution {
                    rules,
                    rules_source: DataSource::Static,
                    questions,
                    questions_source: DataSource::Static,
                    error: Some(format!("failed to load content: {err}")),
                }
            }
        }
    }

    /// Creates a rule with a fresh id and appends it to the working set.
    pub fn add_rule(&self, draft: RuleDraft) -> Result<GrammarRule, ResolverError> {
        let mut rule = GrammarRule::from_draft(draft)?;
        rule.id = Some(new_entity_id());
        rule.origin = EntityOrigin::Local;

        let id = rule.id_str().to_string();
        let row = RemoteRuleRow::from_rule(&rule);
        let seq = self
            .shared
            .lock_state()
            .commit(&self.shared.catalog, LocalChange::AddRule(rule.clone()));
        info!("event=mutation module=resolver status=ok op=add_rule id={id} grade={}", rule.grade);

        self.propagate(seq, "add_rule", id, move |remote| async move {
            remote.insert_rule(&row).await
        });
        Ok(rule)
    }

    /// Creates a question with a fresh id and appends it to the working set.
    pub fn add_question(&self, draft: QuestionDraft) -> Result<QuizQuestion, ResolverError> {
        let mut question = QuizQuestion::from_draft(draft)?;
        question.id = Some(new_entity_id());
        question.origin = EntityOrigin::Local;

        let id = question.id_str().to_string();
        let row = RemoteQuestionRow::from_question(&question);
        let seq = self
            .shared
            .lock_state()
            .commit(&self.shared.catalog, LocalChange::AddQuestion(question.clone()));
        info!(
            "event=mutation module=resolver status=ok op=add_question id={id} grade={}",
            question.grade
        );

        self.propagate(seq, "add_question", id, move |remote| async move {
            remote.insert_question(&row).await
        });
        Ok(question)
    }

    /// Merges `patch` onto the rule `id`; omitted fields stay unchanged.
    ///
    /// # Errors
    /// - `NotFound` when `id` is not in the working set.
    /// - `Validation` when the merged rule breaks an invariant or the patch
    ///   changes the grade of a static rule.
    pub fn update_rule(&self, id: &str, patch: RulePatch) -> Result<GrammarRule, ResolverError> {
        let (merged, seq, remote_patch) = {
            let mut state = self.shared.lock_state();
            let current = state
                .rules
                .iter()
                .find(|rule| rule.id_str() == id)
                .ok_or_else(|| ResolverError::NotFound {
                    kind: EntityKind::Rule,
                    id: id.to_string(),
                })?;
            if patch.is_empty() {
                return Ok(current.clone());
            }
            if current.origin == EntityOrigin::Static
                && patch.grade.is_some_and(|grade| grade != current.grade)
            {
                return Err(ValidationError::GradeImmutable { id: id.to_string() }.into());
            }

            let mut merged = current.clone();
            merged.apply_patch(&patch);
            merged.normalize();
            merged.validate()?;

            let catalog = &self.shared.catalog;
            let target = state.target(catalog, EntityKind::Rule, merged.origin, id);
            let normalized = patch.normalized_from(&merged);
            let seq = state.commit(
                catalog,
                LocalChange::UpdateRule {
                    target,
                    patch: normalized.clone(),
                },
            );
            (merged, seq, normalized)
        };
        info!("event=mutation module=resolver status=ok op=update_rule id={id}");

        let remote_id = id.to_string();
        self.propagate(seq, "update_rule", id.to_string(), move |remote| async move {
            remote.update_rule_by_id(&remote_id, &remote_patch).await
        });
        Ok(merged)
    }

    /// Merges `patch` onto the question `id`; omitted fields stay unchanged.
    ///
    /// The merged question is validated as a whole, so shrinking `options`
    /// below `correct` is rejected.
    pub fn update_question(
        &self,
        id: &str,
        patch: QuestionPatch,
    ) -> Result<QuizQuestion, ResolverError> {
        let (merged, seq, remote_patch) = {
            let mut state = self.shared.lock_state();
            let current = state
                .questions
                .iter()
                .find(|question| question.id_str() == id)
                .ok_or_else(|| ResolverError::NotFound {
                    kind: EntityKind::Question,
                    id: id.to_string(),
                })?;
            if patch.is_empty() {
                return Ok(current.clone());
            }
            if current.origin == EntityOrigin::Static
                && patch.grade.is_some_and(|grade| grade != current.grade)
            {
                return Err(ValidationError::GradeImmutable { id: id.to_string() }.into());
            }

            let mut merged = current.clone();
            merged.apply_patch(&patch);
            merged.normalize();
            merged.validate()?;

            let catalog = &self.shared.catalog;
            let target = state.target(catalog, EntityKind::Question, merged.origin, id);
            let normalized = patch.normalized_from(&merged);
            let seq = state.commit(
                catalog,
                LocalChange::UpdateQuestion {
                    target,
                    patch: normalized.clone(),
                },
            );
            (merged, seq, normalized)
        };
        info!("event=mutation module=resolver status=ok op=update_question id={id}");

        let remote_id = id.to_string();
        self.propagate(seq, "update_question", id.to_string(), move |remote| async move {
            remote.update_question_by_id(&remote_id, &remote_patch).await
        });
        Ok(merged)
    }

    /// Removes the rule `id`. Returns `false` (and does nothing else) when the
    /// id is not in the working set.
    pub fn delete_rule(&self, id: &str) -> bool {
        let seq = {
            let mut state = self.shared.lock_state();
            let Some(origin) = state
                .rules
                .iter()
                .find(|rule| rule.id_str() == id)
                .map(|rule| rule.origin)
            else {
                return false;
            };
            let catalog = &self.shared.catalog;
            let target = state.target(catalog, EntityKind::Rule, origin, id);
            state.commit(catalog, LocalChange::DeleteRule { target })
        };
        info!("event=mutation module=resolver status=ok op=delete_rule id={id}");

        let remote_id = id.to_string();
        self.propagate(seq, "delete_rule", id.to_string(), move |remote| async move {
            ignore_not_found(remote.delete_rule_by_id(&remote_id).await)
        });
        true
    }

    /// Removes the question `id`; unknown ids are a no-op.
    pub fn delete_question(&self, id: &str) -> bool {
        let seq = {
            let mut state = self.shared.lock_state();
            let Some(origin) = state
                .questions
                .iter()
                .find(|question| question.id_str() == id)
                .map(|question| question.origin)
            else {
                return false;
            };
            let catalog = &self.shared.catalog;
            let target = state.target(catalog, EntityKind::Question, origin, id);
            state.commit(catalog, LocalChange::DeleteQuestion { target })
        };
        info!("event=mutation module=resolver status=ok op=delete_question id={id}");

        let remote_id = id.to_string();
        self.propagate(seq, "delete_question", id.to_string(), move |remote| async move {
            ignore_not_found(remote.delete_question_by_id(&remote_id).await)
        });
        true
    }

    /// Waits until every propagation task spawned so far has finished.
    pub async fn wait_for_sync(&self) {
        loop {
            let pending = std::mem::take(&mut *self.shared.lock_tasks());
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(err) = task.await {
                    warn!("event=remote_sync module=resolver status=error error={err}");
                }
            }
        }
    }

    /// Spawns the detached remote write for journal entry `seq`.
    fn propagate<F, Fut>(&self, seq: u64, op: &'static str, id: String, call: F)
    where
        F: FnOnce(Arc<dyn RemoteStore>) -> Fut + Send + 'static,
        Fut: Future<Output = RemoteResult<()>> + Send + 'static,
    {
        let Some(remote) = self.shared.remote.clone() else {
            debug!("event=remote_sync module=resolver status=skipped op={op} id={id} reason=not_configured");
            return;
        };
        let shared = Arc::clone(&self.shared);
        let limit = shared.config.remote_timeout;

        let task = self.shared.runtime.spawn(async move {
            let started_at = Instant::now();
            match bounded(limit, call(remote)).await {
                Ok(()) => {
                    let mut state = shared.lock_state();
                    let latest = state.generation;
                    state.journal.confirm(seq, latest);
                    info!(
                        "event=remote_sync module=resolver status=ok op={op} id={id} duration_ms={}",
                        started_at.elapsed().as_millis()
                    );
                }
                Err(err) => warn!(
                    "event=remote_sync module=resolver status=error op={op} id={id} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                ),
            }
        });

        let mut tasks = self.shared.lock_tasks();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }
}

/// Fresh globally unique id for a created entity.
fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

async fn bounded<T>(limit: Duration, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(RemoteError::Timeout(limit)))
}

fn ignore_not_found(result: RemoteResult<()>) -> RemoteResult<()> {
    match result {
        Err(RemoteError::NotFound(_)) => Ok(()),
        other => other,
    }
}

/// Entity as seen by the remote/static choice.
trait ScopedEntity {
    fn entity_id(&self) -> &str;
    fn entity_grade(&self) -> Grade;
}

impl ScopedEntity for GrammarRule {
    fn entity_id(&self) -> &str {
        self.id_str()
    }

    fn entity_grade(&self) -> Grade {
        self.grade
    }
}

impl ScopedEntity for QuizQuestion {
    fn entity_id(&self) -> &str {
        self.id_str()
    }

    fn entity_grade(&self) -> Grade {
        self.grade
    }
}

/// Picks remote rows or static fallback for one entity kind.
///
/// Rows outside `scope` are skipped like invalid rows; the remote filter is
/// not trusted to have applied the grade.
fn choose<R, T: ScopedEntity>(
    kind: EntityKind,
    scope: Scope,
    policy: EmptyRemotePolicy,
    fetched: RemoteResult<Vec<R>>,
    map: impl Fn(R) -> Result<T, RowMappingError>,
    fallback: Vec<T>,
) -> (Vec<T>, DataSource) {
    let rows = match fetched {
        Ok(rows) => rows,
        Err(err) => {
            warn!(
                "event=remote_fetch module=resolver status=fallback kind={} scope={scope} reason=unavailable error={err}",
                kind.as_str()
            );
            return (fallback, DataSource::Static);
        }
    };

    let total = rows.len();
    let mut seen = HashSet::new();
    let mut mapped = Vec::with_capacity(total);
    for row in rows {
        match map(row) {
            Ok(entity) if !scope.contains(entity.entity_grade()) => warn!(
                "event=remote_row module=resolver status=skipped kind={} reason=out_of_scope id={} grade={} scope={scope}",
                kind.as_str(),
                entity.entity_id(),
                entity.entity_grade()
            ),
            Ok(entity) => {
                if seen.insert(entity.entity_id().to_string()) {
                    mapped.push(entity);
                } else {
                    warn!(
                        "event=remote_row module=resolver status=skipped kind={} reason=duplicate_id id={}",
                        kind.as_str(),
                        entity.entity_id()
                    );
                }
            }
            Err(err) => warn!(
                "event=remote_row module=resolver status=skipped kind={} error={err}",
                kind.as_str()
            ),
        }
    }

    if mapped.is_empty() && policy == EmptyRemotePolicy::FallBackToStatic {
        debug!(
            "event=remote_fetch module=resolver status=fallback kind={} scope={scope} reason=empty rows={total}",
            kind.as_str()
        );
        return (fallback, DataSource::Static);
    }
    (mapped, DataSource::Remote)
}
