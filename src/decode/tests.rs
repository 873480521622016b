//! Tests for decoder module

use super::*;
use crate::error::Error;
use crate::http::Response;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde_json::json;

fn raw(body: &str) -> Response {
    Response::from_parts(200, HeaderMap::new(), Bytes::from(body.to_string()))
}

#[test]
fn test_json_decoder_with_path() {
    let decoder = JsonDecoder::with_path("results");
    let response = Response::json(
        200,
        json!({"object": "list", "results": [{"id": "a"}, {"id": "b"}], "next_cursor": null}),
    );

    let records = decoder.decode(&response).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], json!("a"));
    assert_eq!(records[1]["id"], json!("b"));
}

#[test]
fn test_json_decoder_keeps_field_order() {
    let decoder = JsonDecoder::with_path("results");
    let response = raw(r#"{"results": [{"zeta": 1, "alpha": 2, "mid": 3}]}"#);

    let records = decoder.decode(&response).unwrap();
    let keys: Vec<_> = records[0].keys().cloned().collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_json_decoder_nested_path() {
    let decoder = JsonDecoder::with_path("$.data.items");
    let response = Response::json(200, json!({"data": {"items": [{"id": 1}]}}));
    assert_eq!(decoder.decode(&response).unwrap().len(), 1);
}

#[test]
fn test_json_decoder_missing_or_null_path_is_empty() {
    let decoder = JsonDecoder::with_path("results");
    assert!(decoder
        .decode(&Response::json(200, json!({"other": []})))
        .unwrap()
        .is_empty());
    assert!(decoder
        .decode(&Response::json(200, json!({"results": null})))
        .unwrap()
        .is_empty());
}

#[test]
fn test_json_decoder_single_object() {
    let decoder = JsonDecoder::new();
    let records = decoder
        .decode(&Response::json(200, json!({"object": "user", "id": "me"})))
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], json!("me"));
}

#[test]
fn test_json_decoder_rejects_scalars() {
    let decoder = JsonDecoder::with_path("results");
    let err = decoder
        .decode(&Response::json(200, json!({"results": [{"id": 1}, 7]})))
        .unwrap_err();
    assert!(matches!(err, Error::RecordExtraction { .. }));
}

#[test]
fn test_json_decoder_invalid_body() {
    let decoder = JsonDecoder::new();
    let err = decoder.decode(&raw("not json")).unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn test_jsonl_decoder() {
    let decoder = JsonlDecoder::new();
    let records = decoder
        .decode(&raw("{\"id\": 1}\n\n{\"id\": 2}\n"))
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["id"], json!(2));
}

#[test]
fn test_jsonl_decoder_reports_line() {
    let decoder = JsonlDecoder::new();
    let err = decoder.decode(&raw("{\"id\": 1}\n{oops")).unwrap_err();
    assert!(err.to_string().contains("line 2"));
}
