//! Google Sheets values API contract tests.
//!
//! These verify the HTTP requests `SheetsStore` sends and how it maps
//! responses and failures.

use goal_bot::config::{LayoutConfig, SheetsConfig};
use goal_bot::directory::UserDirectory;
use goal_bot::layout::ColumnLayout;
use goal_bot::store::{SheetsStore, TabularStore};
use goal_bot::{BotError, Period};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Accept both literal and percent-encoded `!` and `:` in the A1 range.
const DIRECTORY_PATH: &str = r"^/v4/spreadsheets/sheet-1/values/Sheet1(!|%21)A2(:|%3A)B$";

fn config(server: &MockServer) -> SheetsConfig {
    SheetsConfig {
        spreadsheet_id: "sheet-1".to_owned(),
        access_token: "token-abc".to_owned(),
        api_base_url: server.uri(),
        ..SheetsConfig::default()
    }
}

fn layout() -> ColumnLayout {
    ColumnLayout::from_config("Sheet1", &LayoutConfig::default()).unwrap()
}

#[tokio::test]
async fn read_sends_bearer_token_and_parses_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(DIRECTORY_PATH))
        .and(header("authorization", "Bearer token-abc"))
        .and(query_param("majorDimension", "ROWS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Sheet1!A2:B1000",
            "majorDimension": "ROWS",
            "values": [["100", "Ann"], [], [42, "Num"]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = SheetsStore::new(&config(&server)).unwrap();
    let rows = store.read(&layout().directory_range()).await.unwrap();
    assert_eq!(
        rows,
        vec![
            vec!["100".to_owned(), "Ann".to_owned()],
            vec![],
            vec!["42".to_owned(), "Num".to_owned()],
        ]
    );
}

#[tokio::test]
async fn missing_values_read_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(DIRECTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Sheet1!A2:B1000",
            "majorDimension": "ROWS"
        })))
        .mount(&server)
        .await;

    let store = SheetsStore::new(&config(&server)).unwrap();
    assert!(store.read(&layout().directory_range()).await.unwrap().is_empty());
}

#[tokio::test]
async fn server_error_is_store_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend down"))
        .mount(&server)
        .await;

    let store = SheetsStore::new(&config(&server)).unwrap();
    let err = store.read(&layout().directory_range()).await.unwrap_err();
    assert!(matches!(err, BotError::StoreUnavailable(ref msg) if msg.contains("503")));
}

#[tokio::test]
async fn write_uses_raw_input_and_row_major_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-1/values/Sheet1(!|%21)D2$"))
        .and(query_param("valueInputOption", "RAW"))
        .and(body_partial_json(json!({
            "majorDimension": "ROWS",
            "values": [["well done"]]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "updatedCells": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let store = SheetsStore::new(&config(&server)).unwrap();
    let cell = layout().comment_cell(2, Period::Daily);
    store
        .write(&cell, vec![vec!["well done".to_owned()]])
        .await
        .unwrap();
}

#[tokio::test]
async fn append_posts_to_append_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-1/values/Sheet1(!|%21)A2(:|%3A)B:append$"))
        .and(query_param("valueInputOption", "RAW"))
        .and(query_param("insertDataOption", "OVERWRITE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store = SheetsStore::new(&config(&server)).unwrap();
    store
        .append(
            &layout().directory_range(),
            vec![vec!["7".to_owned(), "Eve".to_owned()]],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn directory_registers_through_the_sheets_api() {
    let server = MockServer::start().await;
    // First user already owns block 2.
    Mock::given(method("GET"))
        .and(path_regex(DIRECTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [["100", "Ann"]]
        })))
        .mount(&server)
        .await;
    // The id cell of block 12 is empty before the write and holds the new
    // id afterwards.
    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-1/values/Sheet1(!|%21)A12$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-1/values/Sheet1(!|%21)A12$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [["200"]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/v4/spreadsheets/sheet-1/values/Sheet1(!|%21)A12(:|%3A)B12$"))
        .and(body_partial_json(json!({ "values": [["200", "Bob"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store: Arc<dyn TabularStore> = Arc::new(SheetsStore::new(&config(&server)).unwrap());
    let directory = UserDirectory::new(store, layout());
    let registration = directory.register("200", "Bob").await.unwrap();
    assert_eq!(registration.block_start, 12);
    assert!(registration.created);
}

#[tokio::test]
async fn missing_spreadsheet_is_store_unavailable_not_an_empty_directory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(DIRECTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [["100", "Ann"]]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Requested entity was not found." }
        })))
        .mount(&server)
        .await;

    let store: Arc<dyn TabularStore> = Arc::new(SheetsStore::new(&config(&server)).unwrap());
    let directory = UserDirectory::new(store, layout());
    assert_eq!(directory.lookup("100").await.unwrap(), 2);

    let err = directory.lookup("200").await.unwrap_err();
    assert!(matches!(err, BotError::StoreUnavailable(ref msg) if msg.contains("404")));

    // The sweep must fail instead of treating the outage as an empty sheet.
    assert!(matches!(
        directory.prune_missing().await,
        Err(BotError::StoreUnavailable(_))
    ));
    assert_eq!(directory.cached_len(), 1);
}
