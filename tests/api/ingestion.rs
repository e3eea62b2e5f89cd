use std::time::Duration;

use claims::{assert_err, assert_ok};
use mindfuel::ingestion::{
    CsvChunks, ExtractError, LoadOptions, SheetClient, clean, extract, load_csv, write_csv,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use super::helpers::{InMemoryWarehouse, init_tracing};

const PUBLISHED_SHEET: &str = r#"
<html><body>
  <div id="sheets-viewport"><table class="waffle">
    <thead><tr><th></th><th>A</th><th>B</th><th>C</th></tr></thead>
    <tbody>
      <tr><th>1</th><td>Timestamp</td><td>First Name.</td><td>Email.</td></tr>
      <tr><th>2</th><td>2026-10-18 09:15:00</td><td>Ada</td><td>ada@x.com</td></tr>
    </tbody>
  </table></div>
</body></html>"#;

async fn serve_sheet(body: &str, status: u16) -> MockServer {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(path("/sheet"))
        .and(method("GET"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn options(incremental: bool) -> LoadOptions {
    LoadOptions {
        table: "quote_subscribers".into(),
        batch_size: 1000,
        incremental,
        timestamp_column: Some("Timestamp".into()),
    }
}

#[tokio::test]
async fn a_published_sheet_is_cleaned_saved_and_loaded() {
    let server = serve_sheet(PUBLISHED_SHEET, 200).await;
    let client = SheetClient::new(Duration::from_secs(5)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("subscribers.csv");

    let table = assert_ok!(extract(&client, &format!("{}/sheet", server.uri())).await);
    let table = clean(table);

    assert_eq!(table.columns, vec!["Timestamp", "First Name.", "Email."]);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0][1].as_deref(), Some("Ada"));

    assert_ok!(write_csv(&table, &csv_path));
    let contents = std::fs::read_to_string(&csv_path).unwrap();
    assert!(contents.starts_with("Timestamp,First Name.,Email.\n"));

    let mut warehouse = InMemoryWarehouse::default();
    let report = assert_ok!(load_csv(&csv_path, &mut warehouse, &options(false)).await);
    assert_eq!(report.inserted, 1);
    assert_eq!(warehouse.rows, table.rows);
}

#[tokio::test]
async fn an_incremental_rerun_loads_nothing_new() {
    let server = MockServer::start().await;
    init_tracing();
    Mock::given(path("/sheet"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PUBLISHED_SHEET))
        .expect(2)
        .mount(&server)
        .await;

    let client = SheetClient::new(Duration::from_secs(5)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("subscribers.csv");
    let mut warehouse = InMemoryWarehouse::default();

    for expected_inserts in [1, 0] {
        let table = extract(&client, &format!("{}/sheet", server.uri()))
            .await
            .unwrap();
        write_csv(&clean(table), &csv_path).unwrap();

        let report = assert_ok!(load_csv(&csv_path, &mut warehouse, &options(true)).await);
        assert_eq!(report.inserted, expected_inserts);
    }
    assert_eq!(warehouse.rows.len(), 1);

    let chunks = CsvChunks::open(&csv_path, 1000).unwrap();
    assert_eq!(chunks.columns(), ["Timestamp", "First Name.", "Email."]);
}

#[tokio::test]
async fn a_sheet_that_cannot_be_fetched_is_an_error() {
    let server = serve_sheet("gone", 404).await;
    let client = SheetClient::new(Duration::from_secs(5)).unwrap();

    let err = assert_err!(extract(&client, &format!("{}/sheet", server.uri())).await);
    assert!(matches!(err, ExtractError::Fetch(_)));
}

#[tokio::test]
async fn a_page_without_a_table_is_an_error() {
    let server = serve_sheet("<html><body>Sign in</body></html>", 200).await;
    let client = SheetClient::new(Duration::from_secs(5)).unwrap();

    let err = assert_err!(extract(&client, &format!("{}/sheet", server.uri())).await);
    assert!(matches!(err, ExtractError::NoTable));
}
