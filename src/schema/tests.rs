//! Tests for schema module

use super::*;
use crate::error::Error;
use crate::types::Record;
use serde_json::{json, Value};
use test_case::test_case;

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn validator(paths: &[&str]) -> PrimaryKeyValidator {
    let paths: Vec<KeyPath> = paths.iter().map(|p| KeyPath::from(*p)).collect();
    PrimaryKeyValidator::new("users", &paths)
}

#[test_case(json!({"id": "u1"}); "string")]
#[test_case(json!({"id": 42}); "number")]
#[test_case(json!({"id": true}); "boolean")]
fn test_scalar_keys_pass(rec: Value) {
    assert!(validator(&["id"]).validate(&record(rec)).is_ok());
}

#[test_case(json!({"id": {"a": 1}}), "object"; "object")]
#[test_case(json!({"id": [1, 2]}), "array"; "array")]
fn test_container_keys_fail(rec: Value, kind: &str) {
    let err = validator(&["id"]).validate(&record(rec)).unwrap_err();
    assert!(matches!(err, Error::SchemaViolation { .. }));
    assert!(err.to_string().contains(kind));
}

#[test]
fn test_all_null_key_fails() {
    let v = validator(&["id", "parent.page_id"]);
    let err = v
        .validate(&record(json!({"id": null, "parent": {"type": "workspace"}})))
        .unwrap_err();
    assert!(err.to_string().contains("entirely null"));
}

#[test]
fn test_composite_key_needs_one_non_null() {
    let v = validator(&["id", "parent.page_id"]);
    assert!(v
        .validate(&record(json!({"id": null, "parent": {"page_id": "p1"}})))
        .is_ok());
    assert!(v.validate(&record(json!({"id": "b1"}))).is_ok());
}

#[test]
fn test_nested_path_through_scalar_is_absent() {
    let v = validator(&["id", "parent.page_id"]);
    assert!(v
        .validate(&record(json!({"id": "x", "parent": "workspace"})))
        .is_ok());
}

#[test]
fn test_container_component_fails_even_with_non_null_sibling() {
    let v = validator(&["id", "properties"]);
    assert!(v
        .validate(&record(json!({"id": "x", "properties": {}})))
        .is_err());
}

#[test]
fn test_no_key_declared() {
    let v = PrimaryKeyValidator::new("users", &[]);
    assert!(v.is_empty());
    assert!(v.validate(&record(json!({}))).is_ok());
}

#[test]
fn test_key_path_forms() {
    let dotted: KeyPath = serde_yaml::from_str("parent.page_id").unwrap();
    let segments: KeyPath = serde_yaml::from_str("[parent, page_id]").unwrap();
    assert_eq!(dotted.segments(), segments.segments());
}

#[test]
fn test_json_type_of() {
    assert_eq!(JsonType::of(&json!("x")), JsonType::String);
    assert_eq!(JsonType::of(&json!(null)), JsonType::Null);
    assert!(JsonType::Number.is_scalar());
    assert!(!JsonType::Array.is_scalar());
    assert_eq!(JsonType::Object.to_string(), "object");
}
