//! Roster import integration tests

mod helpers;

use helpers::create_test_db;
use livestream_common::db::{Gender, UNASSIGNED_EVENT_NAME};
use livestream_ingest::db;
use livestream_ingest::services::roster::{import_participants, RowStatus};
use serde_json::{json, Value};

fn rows(values: Value) -> Vec<Vec<Value>> {
    serde_json::from_value(values).unwrap()
}

#[tokio::test]
async fn test_import_creates_sub_event_under_primary() {
    let (_dir, pool) = create_test_db().await.unwrap();

    let report = import_participants(
        &pool,
        &rows(json!([
            ["101", "Anna", "Svensson", "1990-04-02", "IK Stål", "D35", "K"],
            ["102", "Bo", "Ek", "1985-01-01", "", "", "Man"],
        ])),
        "Vårruset",
    )
    .await
    .unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.rejected, 0);

    let primary = db::event_by_name(&pool, "Vårruset").await.unwrap().unwrap();
    assert_eq!(primary.parent_event_id, None);
    assert_eq!(report.primary_event, primary);

    let sub = db::event_by_name(&pool, "Vårruset D35").await.unwrap().unwrap();
    assert_eq!(sub.parent_event_id, Some(primary.event_id));
    assert_eq!(sub.classification.as_deref(), Some("D35"));

    let anna = db::participant_by_bib(&pool, 101).await.unwrap().unwrap();
    assert_eq!(anna.event_id, sub.event_id);
    assert_eq!(anna.gender, Gender::Female);

    // No classification registers directly under the primary event
    let bo = db::participant_by_bib(&pool, 102).await.unwrap().unwrap();
    assert_eq!(bo.event_id, primary.event_id);
    assert_eq!(bo.gender, Gender::Male);
    assert_eq!(bo.club, None);
}

#[tokio::test]
async fn test_second_import_reuses_sub_event() {
    let (_dir, pool) = create_test_db().await.unwrap();

    import_participants(
        &pool,
        &rows(json!([["1", "A", "A", "2000", "", "H21", "M"]])),
        "Mila",
    )
    .await
    .unwrap();
    let events_before = db::list_events(&pool).await.unwrap().len();

    let report = import_participants(
        &pool,
        &rows(json!([
            ["2", "B", "B", "2000", "", "H21", "M"],
            ["1", "A", "A", "2000", "", "H21", "M"],
        ])),
        "Mila",
    )
    .await
    .unwrap();

    assert_eq!(db::list_events(&pool).await.unwrap().len(), events_before);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.already_registered, 1);
    assert!(matches!(
        &report.rows[1].status,
        RowStatus::AlreadyRegistered { bib_number: 1, event_name } if event_name == "Mila H21"
    ));
}

#[tokio::test]
async fn test_bad_rows_rejected_without_stopping_import() {
    let (_dir, pool) = create_test_db().await.unwrap();

    let report = import_participants(
        &pool,
        &rows(json!([
            ["Startnr", "Förnamn", "Efternamn", "Född", "Klubb", "Klass", "Kön"],
            ["5", "Kort"],
            [7, "Cilla", "Berg", "1970", "OK Ravinen", "D50", "Kvinna"],
        ])),
        "Mila",
    )
    .await
    .unwrap();

    assert_eq!(report.rejected, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.rows.len(), 3);
    assert!(matches!(report.rows[0].status, RowStatus::Rejected { .. }));
    assert!(matches!(report.rows[1].status, RowStatus::Rejected { .. }));
    assert!(matches!(report.rows[2].status, RowStatus::Inserted { bib_number: 7, .. }));
}

#[tokio::test]
async fn test_reserved_or_blank_primary_name_refused() {
    let (_dir, pool) = create_test_db().await.unwrap();

    for name in ["", "   ", UNASSIGNED_EVENT_NAME] {
        let result = import_participants(&pool, &[], name).await;
        assert!(
            matches!(result, Err(livestream_common::Error::InvalidInput(_))),
            "name {:?}",
            name
        );
    }
}

#[tokio::test]
async fn test_participants_grouped_by_event() {
    let (_dir, pool) = create_test_db().await.unwrap();
    import_participants(
        &pool,
        &rows(json!([
            ["3", "C", "C", "2000", "", "H21", "M"],
            ["1", "A", "A", "2000", "", "H21", "M"],
            ["2", "B", "B", "2000", "", "", "F"],
        ])),
        "Mila",
    )
    .await
    .unwrap();

    let grouped = db::list_participants_by_event(&pool).await.unwrap();
    let h21: Vec<i64> = grouped["Mila H21"].iter().map(|p| p.bib_number).collect();
    assert_eq!(h21, vec![1, 3]);
    assert_eq!(grouped["Mila"].len(), 1);
}
