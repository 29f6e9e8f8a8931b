//! TapArchive against a mock TAP endpoint.
//!
//! - count / names / rows map to the expected ADQL and decode the CSV body.
//! - 5xx responses are retried up to `max_attempts`, 4xx are not.

use std::time::Duration;

use httpmock::prelude::*;
use lex_archive::{Archive, ArchiveError, TapArchive, TapConfig};
use lex_schemas::{Cell, FieldCatalog, Selection, Table};

const CATALOG: &str = "\
pl_name:Planet Name
disc_year:Discovery Year
releasedate:Release Date~
";

fn archive(server: &MockServer, max_attempts: u32) -> TapArchive {
    let cfg = TapConfig {
        base_url: server.base_url(),
        sync_path: "/TAP/sync".to_string(),
        observation_table: "ps".to_string(),
        composite_table: "pscomppars".to_string(),
        name_column: "pl_name".to_string(),
        release_column: "releasedate".to_string(),
        update_column: "rowupdate".to_string(),
        names_per_query: 2,
        max_attempts,
        timeout: Duration::from_secs(5),
        retry_backoff: Duration::from_millis(0),
    };
    TapArchive::new(cfg, FieldCatalog::parse(CATALOG).unwrap()).unwrap()
}

#[tokio::test]
async fn count_decodes_single_cell() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/TAP/sync")
                .query_param("query", "select count(*) from pscomppars")
                .query_param("format", "csv");
            then.status(200).body("count(*)\n3\n");
        })
        .await;

    let n = archive(&server, 1)
        .count(&Selection::all(Table::Composite))
        .await
        .unwrap();
    assert_eq!(n, 3);
    m.assert_async().await;
}

#[tokio::test]
async fn rows_use_table_specific_columns() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/TAP/sync")
                .query_param("query", "select pl_name,disc_year,releasedate from ps");
            then.status(200)
                .body("pl_name,disc_year,releasedate\nA b,2001,2020-01-01\nB c,,2021-06-30\n");
        })
        .await;

    let rows = archive(&server, 1)
        .fetch_rows(&Selection::all(Table::Observations))
        .await
        .unwrap();
    m.assert_async().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].cells[1], Cell::Int(2001));
    assert_eq!(rows[1].cells[1], Cell::Null);
}

#[tokio::test]
async fn name_selection_is_split_into_chunks() {
    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET).query_param(
                "query",
                "select pl_name,disc_year from pscomppars where pl_name in ('A','B')",
            );
            then.status(200).body("pl_name,disc_year\nA,1999\nB,2000\n");
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET).query_param(
                "query",
                "select pl_name,disc_year from pscomppars where pl_name in ('C')",
            );
            then.status(200).body("pl_name,disc_year\nC,2001\n");
        })
        .await;

    let sel = Selection::names(Table::Composite, vec!["A".into(), "B".into(), "C".into()]);
    let rows = archive(&server, 1).fetch_rows(&sel).await.unwrap();
    assert_eq!(rows.len(), 3);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_until_attempts_run_out() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/TAP/sync");
            then.status(503).body("busy");
        })
        .await;

    let err = archive(&server, 3)
        .fetch_names(&Selection::all(Table::Composite))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Http { status: 503, .. }));
    assert_eq!(m.hits_async().await, 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/TAP/sync");
            then.status(400).body("bad adql");
        })
        .await;

    let err = archive(&server, 3)
        .count(&Selection::all(Table::Observations))
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Http { status: 400, .. }));
    assert_eq!(m.hits_async().await, 1);
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let cfg = TapConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        sync_path: "/TAP/sync".to_string(),
        observation_table: "ps".to_string(),
        composite_table: "pscomppars".to_string(),
        name_column: "pl_name".to_string(),
        release_column: "releasedate".to_string(),
        update_column: "rowupdate".to_string(),
        names_per_query: 10,
        max_attempts: 1,
        timeout: Duration::from_secs(2),
        retry_backoff: Duration::from_millis(0),
    };
    let a = TapArchive::new(cfg, FieldCatalog::parse(CATALOG).unwrap()).unwrap();
    let err = a.count(&Selection::all(Table::Composite)).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Transport(_)));
    assert!(err.is_retryable());
}
