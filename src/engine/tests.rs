//! Tests for engine module

use super::*;
use crate::loader::load_connector_from_str;
use crate::state::CursorValue;
use crate::types::{LogLevel, SyncMode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{
    body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOG: &str = r#"
name: test
auth:
  type: api_key
  key: Authorization
  value: "{{ config.access_token }}"
headers:
  Notion-Version: "2022-06-28"
check:
  path: /users/me
streams:
  - name: users
    request: {path: /users}
    decoder: {type: json, records_path: results}
    pagination:
      type: cursor
      cursor_param: start_cursor
      cursor_path: next_cursor
      has_more_path: has_more
      page_size_param: page_size
    primary_key: [id]
  - name: pages
    request:
      method: POST
      path: /search
      body:
        filter: {property: object, value: page}
    decoder: {type: json, records_path: results}
    pagination:
      type: cursor
      cursor_param: start_cursor
      cursor_path: next_cursor
      has_more_path: has_more
      location: body
    primary_key: [id]
    cursor_field: last_edited_time
    incremental: true
  - name: blocks
    request: {path: "/blocks/{{ slice.parent_id }}/children"}
    decoder: {type: json, records_path: results}
    pagination:
      type: cursor
      cursor_param: start_cursor
      cursor_path: next_cursor
      has_more_path: has_more
    parent: {stream: pages, cursor_field: last_edited_time}
    expand: {order: post_order}
    non_content: {values: [child_page]}
    cursor_field: last_edited_time
    incremental: true
  - name: comments
    request:
      path: /comments
      params: {block_id: "{{ slice.parent_id }}"}
    decoder: {type: json, records_path: results}
    parent: {stream: pages, cursor_field: last_edited_time, inject_as: page_last_edited_time}
    cursor_field: page_last_edited_time
    incremental: true
"#;

fn source(server: &MockServer) -> SourceConfig {
    let mut config = SourceConfig::new("secret_token").with_base_url(server.uri());
    config.requests_per_second = 0;
    config.backoff_base_seconds = 0;
    config.invalid_cursor_backoff_seconds = 0;
    config.rate_limit_floor_seconds = 0;
    config
}

fn engine(server: &MockServer, state: StateManager) -> SyncEngine {
    let def = load_connector_from_str(CATALOG).unwrap();
    SyncEngine::new(def, source(server), state).unwrap()
}

fn page(results: Value, next_cursor: Option<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "object": "list",
        "results": results,
        "next_cursor": next_cursor,
        "has_more": next_cursor.is_some(),
    }))
}

fn ids(messages: &[Message], stream_name: &str) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { stream, data } if stream == stream_name => {
                data.get("id").and_then(Value::as_str).map(str::to_string)
            }
            _ => None,
        })
        .collect()
}

fn state_of(messages: &[Message], stream_name: &str) -> Option<Option<CursorValue>> {
    messages.iter().find_map(|m| match m {
        Message::State {
            stream,
            cursor_value,
            ..
        } if stream == stream_name => Some(cursor_value.clone()),
        _ => None,
    })
}

fn ts(raw: &str) -> CursorValue {
    CursorValue::parse(raw)
}

async fn seeded(stream: &str, cursor_field: &str, value: &str) -> StateManager {
    let state = StateManager::in_memory();
    state
        .set_stream_state(
            stream,
            StreamCheckpoint::new(Some(cursor_field.to_string()), Some(ts(value))),
        )
        .await
        .unwrap();
    state
}

async fn mount_pages(server: &MockServer, results: Value) {
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(page(results, None))
        .mount(server)
        .await;
}

// ============================================================================
// Message Tests
// ============================================================================

#[test]
fn test_message_json_lines() {
    let mut data = crate::types::Record::new();
    data.insert("id".to_string(), json!("u1"));
    let line = Message::record("users", data).to_json_line().unwrap();
    assert_eq!(line, r#"{"type":"RECORD","stream":"users","data":{"id":"u1"}}"#);

    let line = Message::state(
        "pages",
        Some("last_edited_time".to_string()),
        Some(ts("2024-05-01T00:00:00Z")),
    )
    .to_json_line()
    .unwrap();
    assert_eq!(
        line,
        r#"{"type":"STATE","stream":"pages","cursor_field":"last_edited_time","cursor_value":"2024-05-01T00:00:00Z"}"#
    );

    let warning = Message::warn("Skipping stream users");
    assert!(warning.is_log());
    assert_eq!(warning.stream(), None);
    let line = warning.to_json_line().unwrap();
    assert_eq!(
        line,
        r#"{"type":"LOG","level":"WARN","message":"Skipping stream users"}"#
    );
}

#[test]
fn test_message_error_carries_kind() {
    let e = Error::AuthFailed {
        status: 401,
        body: "unauthorized".to_string(),
    };
    let msg = Message::error("users", &e);
    assert!(msg.is_error());
    assert_eq!(msg.stream(), Some("users"));
    match msg {
        Message::Error { kind, .. } => assert_eq!(kind, ErrorKind::AuthFailed),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn test_sync_config_builder() {
    let config = SyncConfig::new()
        .with_primary_key_validation(true)
        .with_full_refresh(true);
    assert!(config.validate_primary_keys);
    assert!(config.full_refresh);
    assert!(!SyncConfig::default().full_refresh);
}

#[test]
fn test_sync_stats() {
    let mut stats = SyncStats::new();
    stats.add_record();
    stats.add_record();
    stats.add_pages(3);
    stats.add_stream();
    stats.add_skipped();
    stats.add_error();
    stats.set_duration(42);
    assert_eq!(
        stats,
        SyncStats {
            records_synced: 2,
            pages_fetched: 3,
            streams_synced: 1,
            streams_skipped: 1,
            errors: 1,
            duration_ms: 42,
        }
    );
}

// ============================================================================
// Engine Setup
// ============================================================================

#[tokio::test]
async fn test_engine_requires_base_url() {
    let def = load_connector_from_str(CATALOG).unwrap();
    let err = SyncEngine::new(def, SourceConfig::new("t"), StateManager::in_memory()).unwrap_err();
    assert!(matches!(err, Error::MissingConfigField { ref field } if field == "base_url"));
}

#[tokio::test]
async fn test_discover() {
    let server = MockServer::start().await;
    let streams = engine(&server, StateManager::in_memory()).discover();
    let blocks = streams.iter().find(|s| s.name == "blocks").unwrap();
    assert!(blocks.supports_incremental);
    assert_eq!(blocks.parent.as_deref(), Some("pages"));
    assert!(!streams[0].supports_incremental);
    assert_eq!(streams[0].supported_sync_modes, vec![SyncMode::FullRefresh]);
    assert_eq!(
        blocks.supported_sync_modes,
        vec![SyncMode::FullRefresh, SyncMode::Incremental]
    );
}

#[tokio::test]
async fn test_read_unknown_stream() {
    let server = MockServer::start().await;
    let err = engine(&server, StateManager::in_memory())
        .read(&["nope"])
        .unwrap_err();
    assert!(matches!(err, Error::StreamNotFound { .. }));
}

#[tokio::test]
async fn test_check_sends_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("Authorization", "secret_token"))
        .and(header("Notion-Version", "2022-06-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "me"})))
        .expect(1)
        .mount(&server)
        .await;

    engine(&server, StateManager::in_memory()).check().await.unwrap();
}

#[tokio::test]
async fn test_check_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(path("/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"code": "unauthorized"})))
        .mount(&server)
        .await;

    let err = engine(&server, StateManager::in_memory()).check().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthFailed);
}

// ============================================================================
// Sync Scenarios
// ============================================================================

#[tokio::test]
async fn test_full_refresh_paginates_and_reports() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("start_cursor", "c2"))
        .respond_with(page(json!([{"id": "u3"}]), None))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param_is_missing("start_cursor"))
        .and(query_param("page_size", "100"))
        .respond_with(page(json!([{"id": "u1"}, {"id": "u2"}]), Some("c2")))
        .expect(1)
        .mount(&server)
        .await;

    let run = engine(&server, StateManager::in_memory()).read(&["users"]).unwrap();
    let (messages, stats) = run.collect().await;

    assert_eq!(ids(&messages, "users"), vec!["u1", "u2", "u3"]);
    assert_eq!(state_of(&messages, "users"), Some(None));
    assert_eq!(
        messages.last(),
        Some(&Message::info("Stream users completed: 3 records, 2 pages"))
    );
    assert_eq!(stats.records_synced, 3);
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.streams_synced, 1);
}

#[tokio::test]
async fn test_incremental_drops_stale_and_advances() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({"start_cursor": "c2"})))
        .respond_with(page(
            json!([{"id": "p3", "last_edited_time": "2024-04-01T00:00:00.000Z"}]),
            None,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({"filter": {"value": "page"}})))
        .respond_with(page(
            json!([
                {"id": "p1", "last_edited_time": "2024-01-01T00:00:00.000Z"},
                {"id": "p2", "last_edited_time": "2024-05-01T00:00:00.000Z"}
            ]),
            Some("c2"),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let state = seeded("pages", "last_edited_time", "2024-03-01T00:00:00Z").await;
    let run = engine(&server, state.clone()).read(&["pages"]).unwrap();
    let (messages, _) = run.collect().await;

    assert_eq!(ids(&messages, "pages"), vec!["p2", "p3"]);
    assert_eq!(
        state_of(&messages, "pages"),
        Some(Some(ts("2024-05-01T00:00:00Z")))
    );
    assert_eq!(
        state.get_cursor("pages").await,
        Some(ts("2024-05-01T00:00:00Z"))
    );
}

#[tokio::test]
async fn test_full_refresh_flag_ignores_state() {
    let server = MockServer::start().await;
    mount_pages(
        &server,
        json!([{"id": "p1", "last_edited_time": "2024-01-01T00:00:00.000Z"}]),
    )
    .await;

    let state = seeded("pages", "last_edited_time", "2024-03-01T00:00:00Z").await;
    let run = engine(&server, state)
        .with_config(SyncConfig::new().with_full_refresh(true))
        .read(&["pages"])
        .unwrap();
    let (messages, _) = run.collect().await;
    assert_eq!(ids(&messages, "pages"), vec!["p1"]);
}

#[tokio::test]
async fn test_invalid_cursor_skips_stream_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("start_cursor", "stale"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "object": "error",
            "code": "validation_error",
            "message": "start_cursor provided is invalid: stale"
        })))
        .expect(8)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param_is_missing("start_cursor"))
        .respond_with(page(json!([{"id": "u1"}]), Some("stale")))
        .expect(1)
        .mount(&server)
        .await;
    mount_pages(
        &server,
        json!([{"id": "p1", "last_edited_time": "2024-05-01T00:00:00.000Z"}]),
    )
    .await;

    let state = seeded("users", "id", "keep-me").await;
    let run = engine(&server, state.clone())
        .read(&["users", "pages"])
        .unwrap();
    let (messages, stats) = run.collect().await;

    assert_eq!(ids(&messages, "users"), vec!["u1"]);
    assert_eq!(state_of(&messages, "users"), None);
    assert!(messages.iter().any(|m| matches!(
        m,
        Message::Log { level: LogLevel::Warn, message } if message.starts_with("Skipping stream users")
    )));
    assert!(!messages.iter().any(Message::is_error));

    assert_eq!(ids(&messages, "pages"), vec!["p1"]);
    assert!(state_of(&messages, "pages").is_some());
    assert_eq!(state.get_cursor("users").await, Some(ts("keep-me")));
    assert_eq!(stats.streams_skipped, 1);
    assert_eq!(stats.streams_synced, 1);
}

#[tokio::test]
async fn test_auth_failure_aborts_sync() {
    let server = MockServer::start().await;
    Mock::given(path("/users"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"code": "unauthorized"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/search"))
        .respond_with(page(json!([]), None))
        .expect(0)
        .mount(&server)
        .await;

    let run = engine(&server, StateManager::in_memory())
        .read(&["users", "pages"])
        .unwrap();
    let (messages, stats) = run.collect().await;

    assert_eq!(messages.len(), 1);
    match &messages[0] {
        Message::Error { stream, kind, .. } => {
            assert_eq!(stream, "users");
            assert_eq!(*kind, ErrorKind::AuthFailed);
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert_eq!(stats.errors, 1);
}

#[tokio::test]
async fn test_fatal_error_continues_with_next_stream() {
    let server = MockServer::start().await;
    Mock::given(path("/users"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"code": "object_not_found"})))
        .mount(&server)
        .await;
    mount_pages(
        &server,
        json!([{"id": "p1", "last_edited_time": "2024-05-01T00:00:00.000Z"}]),
    )
    .await;

    let run = engine(&server, StateManager::in_memory())
        .read(&["users", "pages"])
        .unwrap();
    let (messages, stats) = run.collect().await;

    assert!(matches!(
        messages[0],
        Message::Error { kind: ErrorKind::FatalHttp, .. }
    ));
    assert_eq!(ids(&messages, "pages"), vec!["p1"]);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.streams_synced, 1);
}

#[tokio::test]
async fn test_primary_key_violation_fails_stream() {
    let server = MockServer::start().await;
    Mock::given(path("/users"))
        .respond_with(page(json!([{"id": "u1"}, {"name": "no id"}]), None))
        .mount(&server)
        .await;
    mount_pages(
        &server,
        json!([{"id": "p1", "last_edited_time": "2024-05-01T00:00:00.000Z"}]),
    )
    .await;

    let run = engine(&server, StateManager::in_memory())
        .with_config(SyncConfig::new().with_primary_key_validation(true))
        .read(&["users", "pages"])
        .unwrap();
    let (messages, _) = run.collect().await;

    assert_eq!(ids(&messages, "users"), vec!["u1"]);
    assert!(messages.iter().any(|m| matches!(
        m,
        Message::Error { stream, kind: ErrorKind::SchemaViolation, .. } if stream == "users"
    )));
    assert_eq!(state_of(&messages, "users"), None);
    assert_eq!(ids(&messages, "pages"), vec!["p1"]);
}

#[tokio::test]
async fn test_child_slices_skip_unchanged_parents() {
    let server = MockServer::start().await;
    mount_pages(
        &server,
        json!([
            {"id": "p1", "last_edited_time": "2024-01-01T00:00:00.000Z"},
            {"id": "p2", "last_edited_time": "2024-05-01T00:00:00.000Z"}
        ]),
    )
    .await;
    Mock::given(path("/blocks/p1/children"))
        .respond_with(page(json!([]), None))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(path("/blocks/p2/children"))
        .respond_with(page(
            json!([
                {"id": "b1", "type": "toggle", "has_children": true},
                {"id": "b2", "type": "child_page", "has_children": true},
                {"id": "b3", "type": "paragraph", "has_children": false}
            ]),
            None,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/blocks/b1/children"))
        .respond_with(page(
            json!([{"id": "b1a", "type": "paragraph", "has_children": false}]),
            None,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/blocks/b2/children"))
        .respond_with(page(json!([]), None))
        .expect(0)
        .mount(&server)
        .await;

    let state = seeded("blocks", "last_edited_time", "2024-03-01T00:00:00Z").await;
    let run = engine(&server, state.clone()).read(&["blocks"]).unwrap();
    let (messages, _) = run.collect().await;

    assert_eq!(ids(&messages, "blocks"), vec!["b1a", "b1", "b3"]);
    assert_eq!(
        state_of(&messages, "blocks"),
        Some(Some(ts("2024-05-01T00:00:00Z")))
    );
    // parent is read, not emitted
    assert!(ids(&messages, "pages").is_empty());
}

#[tokio::test]
async fn test_child_records_carry_parent_cursor() {
    let server = MockServer::start().await;
    mount_pages(
        &server,
        json!([{"id": "p1", "last_edited_time": "2024-05-01T00:00:00.000Z"}]),
    )
    .await;
    Mock::given(path("/comments"))
        .and(query_param("block_id", "p1"))
        .respond_with(page(json!([{"id": "c1", "rich_text": []}]), None))
        .expect(1)
        .mount(&server)
        .await;

    let run = engine(&server, StateManager::in_memory())
        .read(&["comments"])
        .unwrap();
    let (messages, _) = run.collect().await;

    let comment = messages
        .iter()
        .find_map(|m| match m {
            Message::Record { stream, data } if stream == "comments" => Some(data.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(comment["page_last_edited_time"], json!("2024-05-01T00:00:00Z"));
    assert_eq!(
        state_of(&messages, "comments"),
        Some(Some(ts("2024-05-01T00:00:00Z")))
    );
}

#[tokio::test]
async fn test_state_persisted_to_file() {
    let server = MockServer::start().await;
    mount_pages(
        &server,
        json!([
            {"id": "p1", "last_edited_time": "2024-02-01T00:00:00.000Z"},
            {"id": "p2", "last_edited_time": "2024-06-01T12:30:00.000Z"}
        ]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let run = engine(&server, StateManager::new(&path))
        .read(&["pages"])
        .unwrap();
    run.collect().await;

    let reloaded = StateManager::from_file(&path).unwrap();
    assert_eq!(
        reloaded.get_cursor("pages").await,
        Some(ts("2024-06-01T12:30:00Z"))
    );
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = MockServer::start().await;
    let engine = engine(&server, StateManager::in_memory());
    engine.cancellation_token().cancel();

    let mut run = engine.read(&["users"]).unwrap();
    assert_eq!(run.next_message().await, Some(Message::info("Sync cancelled")));
    assert_eq!(run.next_message().await, None);
}

#[tokio::test]
async fn test_cancel_interrupts_request() {
    let server = MockServer::start().await;
    Mock::given(path("/users"))
        .respond_with(page(json!([{"id": "u1"}]), None).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let engine = engine(&server, StateManager::in_memory());
    let token = engine.cancellation_token();
    let run = engine.read(&["users", "pages"]).unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });
    let started = Instant::now();
    let (messages, _) = run.collect().await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        messages,
        vec![Message::info("Sync cancelled during stream users")]
    );
}

#[tokio::test]
async fn test_into_stream() {
    use futures::StreamExt;

    let server = MockServer::start().await;
    Mock::given(path("/users"))
        .respond_with(page(json!([{"id": "u1"}, {"id": "u2"}]), None))
        .mount(&server)
        .await;

    let run = engine(&server, StateManager::in_memory()).read(&["users"]).unwrap();
    let records: Vec<Message> = run
        .into_stream()
        .filter(|m| futures::future::ready(m.is_record()))
        .collect()
        .await;
    assert_eq!(records.len(), 2);
}
