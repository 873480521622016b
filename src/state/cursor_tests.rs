//! Tests for cursor values, tracking and filtering

use super::*;
use crate::slice::Slice;
use crate::types::Record;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use test_case::test_case;

fn cv(s: &str) -> CursorValue {
    CursorValue::parse(s)
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

// ============================================================================
// CursorValue
// ============================================================================

#[test_case("2022-10-10", "2022-10-10T00:00:00Z"; "date only")]
#[test_case("2022-10-10T12:30:00", "2022-10-10T12:30:00Z"; "naive datetime")]
#[test_case("2022-10-10T12:30:00.000Z", "2022-10-10T12:30:00Z"; "zero millis")]
#[test_case("2022-10-10T12:30:00.250Z", "2022-10-10T12:30:00.250Z"; "millis")]
#[test_case("2022-10-10T14:30:00+02:00", "2022-10-10T12:30:00Z"; "offset")]
#[test_case("not-a-date", "not-a-date"; "opaque")]
fn test_cursor_value_renders(raw: &str, rendered: &str) {
    assert_eq!(cv(raw).to_string(), rendered);
}

#[test]
fn test_cursor_value_compares_chronologically() {
    assert_eq!(cv("2022-10-10"), cv("2022-10-10T00:00:00.000Z"));
    assert!(cv("2022-10-10T00:00:00.500Z") > cv("2022-10-10T00:00:00Z"));
    assert!(cv("2021-01-01T00:00:00Z") < cv("2022-10-10"));
    assert!(cv("2022-10-10T14:30:00+02:00") < cv("2022-10-10T13:00:00Z"));
}

#[test]
fn test_cursor_value_text_ordering() {
    assert!(cv("abc") < cv("abd"));
    assert!(cv("2022-10-10") < cv("zzz"));
}

#[test]
fn test_cursor_value_from_json() {
    assert_eq!(
        CursorValue::from_json(&json!("2022-10-10")),
        Some(cv("2022-10-10"))
    );
    assert_eq!(CursorValue::from_json(&json!(null)), None);
    assert_eq!(CursorValue::from_json(&json!("")), None);
    assert_eq!(CursorValue::from_json(&json!({"a": 1})), None);
}

#[test]
fn test_cursor_value_serde() {
    let json = serde_json::to_string(&cv("2022-10-10")).unwrap();
    assert_eq!(json, "\"2022-10-10T00:00:00Z\"");
    let back: CursorValue = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cv("2022-10-10"));
}

#[test]
fn test_epoch() {
    assert_eq!(CursorValue::epoch().to_string(), "1970-01-01T00:00:00Z");
}

// ============================================================================
// CursorTracker
// ============================================================================

#[test]
fn test_cold_start_advances_to_max_observed() {
    let mut tracker = CursorTracker::new(Some("last_edited_time".to_string()));
    tracker.load(Some(cv("2021-01-01T00:00:00Z")));

    let filter = RecordFilter::incremental(
        Some("last_edited_time".to_string()),
        Some(cv("2021-01-01T00:00:00Z")),
    );
    let slice = Slice::root(tracker.checkpoint().cloned());
    let mut emitted = 0;
    for r in [
        record(json!({"id": "a", "last_edited_time": "2022-10-10"})),
        record(json!({"id": "b", "last_edited_time": "2022-10-10"})),
    ] {
        if let FilterDecision::Emit(value) = filter.decide(&r, &slice) {
            emitted += 1;
            tracker.observe(&value.unwrap());
        }
    }

    assert_eq!(emitted, 2);
    assert_eq!(tracker.finish().unwrap().to_string(), "2022-10-10T00:00:00Z");
}

#[test]
fn test_state_stays_at_input_while_active() {
    let mut tracker = CursorTracker::new(Some("last_edited_time".to_string()));
    tracker.load(Some(cv("2021-10-10")));

    for edited in ["2021-10-12", "2021-10-20", "2021-10-25"] {
        tracker.observe(&cv(edited));
    }

    let state = tracker.get_updated_state(Some(&cv("2021-10-10")), Some(&cv("2021-10-30")));
    assert_eq!(state, Some(cv("2021-10-10")));
    assert!(!tracker.snapshot().is_finished);
    assert_eq!(tracker.snapshot().cursor_value, Some(cv("2021-10-10")));
    assert_eq!(tracker.high_watermark(), Some(&cv("2021-10-30")));

    assert_eq!(tracker.finish(), Some(cv("2021-10-30")));
    let snapshot = tracker.snapshot();
    assert!(snapshot.is_finished);
    assert_eq!(snapshot.cursor_value, Some(cv("2021-10-30")));
    assert_eq!(
        tracker.get_updated_state(Some(&cv("2021-10-10")), None),
        Some(cv("2021-10-30"))
    );
}

#[test]
fn test_finish_without_records_keeps_checkpoint() {
    let mut tracker = CursorTracker::new(Some("last_edited_time".to_string()));
    tracker.load(Some(cv("2022-01-01")));
    assert_eq!(tracker.finish(), Some(cv("2022-01-01")));

    let mut empty = CursorTracker::new(None);
    empty.load(None);
    assert_eq!(empty.finish(), None);
}

#[test]
fn test_finish_never_regresses() {
    let mut tracker = CursorTracker::new(Some("last_edited_time".to_string()));
    tracker.load(Some(cv("2023-01-01")));
    tracker.observe(&cv("2022-06-01"));
    assert_eq!(tracker.finish(), Some(cv("2023-01-01")));
}

#[test]
fn test_fail_returns_input_checkpoint() {
    let mut tracker = CursorTracker::new(Some("last_edited_time".to_string()));
    tracker.load(Some(cv("2021-10-10")));
    tracker.observe(&cv("2022-01-01"));

    assert_eq!(tracker.fail(), Some(cv("2021-10-10")));
    assert_eq!(tracker.phase(), CursorPhase::Failed);

    tracker.observe(&cv("2030-01-01"));
    assert_eq!(tracker.high_watermark(), Some(&cv("2022-01-01")));
}

#[test]
fn test_observe_before_load_is_ignored() {
    let mut tracker = CursorTracker::new(Some("last_edited_time".to_string()));
    assert_eq!(tracker.phase(), CursorPhase::Init);
    tracker.observe(&cv("2022-01-01"));
    assert!(tracker.high_watermark().is_none());
}

// ============================================================================
// RecordFilter
// ============================================================================

#[test]
fn test_filter_drops_strictly_older_records() {
    let filter = RecordFilter::incremental(
        Some("last_edited_time".to_string()),
        Some(cv("2022-01-01")),
    );
    let slice = Slice::root(Some(cv("2022-01-01")));

    let older = record(json!({"last_edited_time": "2021-12-31T23:59:59Z"}));
    let equal = record(json!({"last_edited_time": "2022-01-01T00:00:00.000Z"}));
    let newer = record(json!({"last_edited_time": "2022-01-02"}));
    let missing = record(json!({"id": "x"}));

    assert_eq!(filter.decide(&older, &slice), FilterDecision::Stale);
    assert_eq!(
        filter.decide(&equal, &slice),
        FilterDecision::Emit(Some(cv("2022-01-01")))
    );
    assert_eq!(
        filter.decide(&newer, &slice),
        FilterDecision::Emit(Some(cv("2022-01-02")))
    );
    assert_eq!(filter.decide(&missing, &slice), FilterDecision::Emit(None));
}

#[test]
fn test_full_refresh_filter_keeps_everything_but_structure() {
    let predicate: Arc<dyn NonContentPredicate> =
        Arc::new(TypeFieldPredicate::new("type", ["child_page"]));
    let filter = RecordFilter::full_refresh().with_non_content(Some(predicate));
    let slice = Slice::root(None);

    let old = record(json!({"type": "paragraph", "last_edited_time": "1999-01-01"}));
    let marker = record(json!({"type": "child_page"}));
    assert!(matches!(filter.decide(&old, &slice), FilterDecision::Emit(_)));
    assert_eq!(filter.decide(&marker, &slice), FilterDecision::NonContent);
}

#[test]
fn test_type_field_predicate() {
    let predicate = TypeFieldPredicate::new("type", ["child_page", "child_database"]);
    assert!(predicate.is_non_content(&record(json!({"type": "child_page"}))));
    assert!(predicate.is_non_content(&record(json!({"type": "child_database"}))));
    assert!(!predicate.is_non_content(&record(json!({"type": "paragraph"}))));
    assert!(!predicate.is_non_content(&record(json!({"id": "x"}))));
}

#[test]
fn test_child_inherits_parent_cursor() {
    let comments = [
        record(json!({"id": "c1", "created_time": "2021-01-01T00:00:00.000Z"})),
        record(json!({"id": "c2", "created_time": "2022-12-31T00:00:00.000Z"})),
    ];
    let parent_slice = Slice::child("P", Some(cv("2023-10-10")), None);

    let recent = RecordFilter::incremental(
        Some("page_last_edited_time".to_string()),
        Some(cv("2021-10-10")),
    )
    .inheriting_parent_cursor(true);
    assert!(!recent.should_skip_slice(&parent_slice));
    for comment in &comments {
        assert_eq!(
            recent.decide(comment, &parent_slice),
            FilterDecision::Emit(Some(cv("2023-10-10")))
        );
    }

    let later = RecordFilter::incremental(
        Some("page_last_edited_time".to_string()),
        Some(cv("2023-12-31")),
    )
    .inheriting_parent_cursor(true);
    assert!(later.should_skip_slice(&parent_slice));
    for comment in &comments {
        assert_eq!(later.decide(comment, &parent_slice), FilterDecision::Stale);
    }
}

#[test]
fn test_child_without_parent_cursor_is_kept() {
    let filter = RecordFilter::incremental(
        Some("last_edited_time".to_string()),
        Some(cv("2023-12-31")),
    )
    .inheriting_parent_cursor(true);
    let slice = Slice::child("P", None, None);

    assert!(!filter.should_skip_slice(&slice));
    assert_eq!(
        filter.decide(&record(json!({"id": "b"})), &slice),
        FilterDecision::Emit(None)
    );
}

#[test]
fn test_root_filter_never_skips_slices() {
    let filter = RecordFilter::incremental(
        Some("last_edited_time".to_string()),
        Some(cv("2023-12-31")),
    );
    assert!(!filter.should_skip_slice(&Slice::child("P", Some(cv("2020-01-01")), None)));
}
