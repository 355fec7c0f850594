//! Tests for the file-backed store

use chrono::NaiveDate;
use crew_rota::builders::build_store;
use crew_rota::config::StoreBackendConfig;
use crew_rota::core::{Assignment, AssignmentStore, PlanningError, Role};
use crew_rota::infra::JsonFileStore;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn row(employee: &str, date: NaiveDate, role: Role) -> Assignment {
    Assignment {
        employee_id: employee.into(),
        resource_id: "van".into(),
        date,
        slot: "day".into(),
        role,
        note: Some("appointment at 14:30".into()),
    }
}

fn temp_path() -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("crew-rota-{}", uuid::Uuid::new_v4()))
        .join("assignments.json")
}

#[tokio::test]
async fn test_file_store_replaces_whole_days() {
    let path = temp_path();
    let store = JsonFileStore::new(&path).unwrap();
    store
        .replace_range(
            day(3),
            day(4),
            vec![row("ann", day(3), Role::Lead), row("bob", day(4), Role::Member)],
        )
        .await
        .unwrap();
    store
        .replace_range(day(4), day(4), vec![row("cid", day(4), Role::Assistant)])
        .await
        .unwrap();

    let rows = store.list_range(day(1), day(9)).await.unwrap();
    assert_eq!(
        rows,
        vec![row("ann", day(3), Role::Lead), row("cid", day(4), Role::Assistant)]
    );
    assert!(store.last_modified(day(4), day(4)).await.unwrap().is_some());
    assert!(store.last_modified(day(8), day(8)).await.unwrap().is_none());

    let reopened = JsonFileStore::new(store.path()).unwrap();
    assert_eq!(reopened.list_range(day(3), day(3)).await.unwrap().len(), 1);
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn test_file_store_rejects_rows_outside_range() {
    let path = temp_path();
    let store = build_store(&StoreBackendConfig::File { path: path.clone() }).unwrap();
    let result = store
        .replace_range(day(3), day(3), vec![row("ann", day(5), Role::Member)])
        .await;
    assert!(matches!(result, Err(PlanningError::PersistenceFailure(_))));
    assert!(store.list_range(day(1), day(9)).await.unwrap().is_empty());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn test_file_store_reports_corrupt_documents() {
    let path = temp_path();
    let store = JsonFileStore::new(&path).unwrap();
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        store.list_range(day(3), day(3)).await,
        Err(PlanningError::PersistenceFailure(_))
    ));
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
