use englearn_core::remote::{RemoteQuestionRow, RemoteRuleRow};
use englearn_core::{
    DataResolver, DataSource, Grade, QuestionPatch, RemoteError, RemoteFilter, RemoteStore,
    ResolverConfig, RulePatch, Scope, SqliteRemoteStore, StaticCatalog,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn rule_row(id: &str, grade: i64) -> RemoteRuleRow {
    RemoteRuleRow {
        id: Some(id.to_string()),
        title: Some(format!("Rule {id}")),
        explanation: Some("Explanation".to_string()),
        examples: Some(vec!["First".to_string(), "Second".to_string()]),
        unit: Some("Unit 1".to_string()),
        grade: Some(grade),
        ..RemoteRuleRow::default()
    }
}

fn question_row(id: &str, grade: i64) -> RemoteQuestionRow {
    RemoteQuestionRow {
        id: Some(id.to_string()),
        question: Some("Choose the article".to_string()),
        options: Some(vec!["a".to_string(), "an".to_string(), "the".to_string()]),
        correct: Some(1),
        explanation: Some("Vowel sound".to_string()),
        unit: Some("Unit 2".to_string()),
        grade: Some(grade),
        ..RemoteQuestionRow::default()
    }
}

fn grade(value: u8) -> RemoteFilter {
    RemoteFilter {
        grade: Some(Grade::new(value).unwrap()),
    }
}

#[tokio::test]
async fn inserted_rows_are_listed_with_grade_filter() {
    let store = SqliteRemoteStore::open_in_memory().unwrap();
    store.insert_rule(&rule_row("a", 10)).await.unwrap();
    store.insert_rule(&rule_row("b", 10)).await.unwrap();
    store.insert_rule(&rule_row("c", 4)).await.unwrap();

    let grade_ten = store.list_rules(&grade(10)).await.unwrap();
    let ids = grade_ten
        .iter()
        .map(|row| row.id.as_deref().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(
        grade_ten[0].examples.as_deref(),
        Some(&["First".to_string(), "Second".to_string()][..])
    );
    assert!(grade_ten[0].created_at.is_some());

    let all = store.list_rules(&RemoteFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id.as_deref(), Some("c"), "lower grades list first");
}

#[tokio::test]
async fn question_round_trip_maps_into_domain_record() {
    let store = SqliteRemoteStore::open_in_memory().unwrap();
    store.insert_question(&question_row("q1", 5)).await.unwrap();

    let rows = store.list_questions(&grade(5)).await.unwrap();
    assert_eq!(rows.len(), 1);
    let question = rows[0].clone().into_question().unwrap();
    assert_eq!(question.correct_option(), Some("an"));
    assert!(store.list_questions(&grade(6)).await.unwrap().is_empty());
}

#[tokio::test]
async fn partial_update_touches_only_patched_columns() {
    let store = SqliteRemoteStore::open_in_memory().unwrap();
    store.insert_rule(&rule_row("a", 10)).await.unwrap();

    store
        .update_rule_by_id(
            "a",
            &RulePatch {
                title: Some("Renamed".to_string()),
                ..RulePatch::default()
            },
        )
        .await
        .unwrap();

    let row = store.list_rules(&grade(10)).await.unwrap().remove(0);
    assert_eq!(row.title.as_deref(), Some("Renamed"));
    assert_eq!(row.explanation.as_deref(), Some("Explanation"));
}

#[tokio::test]
async fn question_update_can_move_grade() {
    let store = SqliteRemoteStore::open_in_memory().unwrap();
    store.insert_question(&question_row("q1", 5)).await.unwrap();

    store
        .update_question_by_id(
            "q1",
            &QuestionPatch {
                correct: Some(2),
                grade: Some(Grade::new(6).unwrap()),
                ..QuestionPatch::default()
            },
        )
        .await
        .unwrap();

    assert!(store.list_questions(&grade(5)).await.unwrap().is_empty());
    let moved = store.list_questions(&grade(6)).await.unwrap();
    assert_eq!(moved[0].correct, Some(2));
}

#[tokio::test]
async fn unknown_ids_report_not_found() {
    let store = SqliteRemoteStore::open_in_memory().unwrap();

    let update = store
        .update_rule_by_id(
            "missing",
            &RulePatch {
                unit: Some("U".to_string()),
                ..RulePatch::default()
            },
        )
        .await;
    assert_eq!(update, Err(RemoteError::NotFound("missing".to_string())));
    assert_eq!(
        store.delete_question_by_id("missing").await,
        Err(RemoteError::NotFound("missing".to_string()))
    );
}

#[tokio::test]
async fn duplicate_ids_and_missing_ids_are_rejected() {
    let store = SqliteRemoteStore::open_in_memory().unwrap();
    store.insert_rule(&rule_row("a", 1)).await.unwrap();

    assert!(matches!(
        store.insert_rule(&rule_row("a", 1)).await,
        Err(RemoteError::Rejected(_))
    ));
    let without_id = RemoteRuleRow {
        id: None,
        ..rule_row("x", 1)
    };
    assert!(matches!(
        store.insert_rule(&without_id).await,
        Err(RemoteError::Rejected(_))
    ));
}

#[tokio::test]
async fn delete_removes_row() {
    let store = SqliteRemoteStore::open_in_memory().unwrap();
    store.insert_rule(&rule_row("a", 2)).await.unwrap();
    store.delete_rule_by_id("a").await.unwrap();
    assert!(store.list_rules(&grade(2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn file_store_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("content.db");

    let store = SqliteRemoteStore::open(&path).unwrap();
    store.insert_question(&question_row("q1", 9)).await.unwrap();
    drop(store);

    let reopened = SqliteRemoteStore::open(&path).unwrap();
    assert_eq!(reopened.store_id(), "sqlite");
    assert_eq!(reopened.list_questions(&grade(9)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn locked_database_is_bounded_by_the_resolver_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("content.db");
    let store = SqliteRemoteStore::open(&path).unwrap();
    store.insert_rule(&rule_row("remote", 1)).await.unwrap();

    let locker = rusqlite::Connection::open(&path).unwrap();
    locker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let config = ResolverConfig {
        remote_timeout: Duration::from_millis(100),
        ..ResolverConfig::default()
    };
    let resolver = DataResolver::new(
        Arc::new(StaticCatalog::builtin().unwrap()),
        Some(Arc::new(store.clone()) as Arc<dyn RemoteStore>),
        config,
    )
    .unwrap();

    let started_at = Instant::now();
    let snapshot = resolver.load(Scope::Grade(Grade::new(1).unwrap())).await;
    let elapsed = started_at.elapsed();
    assert!(elapsed < Duration::from_secs(2), "load took {elapsed:?}");
    assert_eq!(snapshot.rules_source, DataSource::Static);
    assert_eq!(snapshot.rules.len(), 6);
    assert_eq!(snapshot.error, None);

    locker.execute_batch("COMMIT;").unwrap();
    let listed = store.list_rules(&grade(1)).await.unwrap();
    assert_eq!(listed.len(), 1);
}
