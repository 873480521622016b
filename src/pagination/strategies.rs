//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{NextPage, PaginationState, Paginator, TokenLocation};
use crate::types::{lookup_path, OptionStringExt};
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::warn;

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor-based pagination (e.g., Notion, Slack)
///
/// Uses an opaque token from the response body to fetch the next page.
/// Common patterns:
/// - `{"next_cursor": "abc", "has_more": true}` with `start_cursor` in the body
/// - `?cursor=abc123`
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Parameter name carrying the token on the next request
    pub cursor_param: String,
    /// Path to the token in the response body
    pub cursor_path: String,
    /// Optional path to a boolean "more pages" flag
    pub has_more_path: Option<String>,
    /// Where the token goes on the next request
    pub location: TokenLocation,
}

impl CursorPaginator {
    /// Create a new cursor paginator placing the token in the query string
    pub fn new(cursor_param: impl Into<String>, cursor_path: impl Into<String>) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
            has_more_path: None,
            location: TokenLocation::Query,
        }
    }

    /// Stop as soon as this flag is `false`, whatever the token says
    #[must_use]
    pub fn with_has_more(mut self, path: impl Into<String>) -> Self {
        self.has_more_path = Some(path.into());
        self
    }

    /// Set token location
    #[must_use]
    pub fn with_location(mut self, location: TokenLocation) -> Self {
        self.location = location;
        self
    }
}

impl Paginator for CursorPaginator {
    fn process_response(
        &self,
        body: &Value,
        _headers: &HeaderMap,
        state: &mut PaginationState,
    ) -> NextPage {
        if let Some(path) = &self.has_more_path {
            if lookup_path(body, path).and_then(Value::as_bool) == Some(false) {
                state.mark_done();
                return NextPage::Done;
            }
        }

        let token = lookup_path(body, &self.cursor_path)
            .and_then(Value::as_str)
            .map(str::to_string)
            .none_if_empty();
        let Some(cursor) = token else {
            state.mark_done();
            return NextPage::Done;
        };

        if state.cursor.as_deref() == Some(cursor.as_str()) {
            warn!("Server returned the same cursor twice, stopping pagination");
            state.mark_done();
            return NextPage::Done;
        }

        state.set_cursor(cursor.clone());
        NextPage::with_param(self.location, &self.cursor_param, cursor)
    }
}

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Link header pagination (RFC 5988)
///
/// Extracts next page URL from the Link header.
/// Format: `Link: <https://api.example.com/...?page=2>; rel="next", ...`
#[derive(Debug, Clone)]
pub struct LinkHeaderPaginator {
    /// Rel value to follow (default: "next")
    pub rel: String,
}

impl Default for LinkHeaderPaginator {
    fn default() -> Self {
        Self {
            rel: "next".to_string(),
        }
    }
}

impl LinkHeaderPaginator {
    /// Create a new link header paginator
    pub fn new(rel: impl Into<String>) -> Self {
        Self { rel: rel.into() }
    }
}

impl Paginator for LinkHeaderPaginator {
    fn process_response(
        &self,
        _body: &Value,
        headers: &HeaderMap,
        state: &mut PaginationState,
    ) -> NextPage {
        if let Some(link_header) = headers.get("link").and_then(|v| v.to_str().ok()) {
            if let Some(next_url) = parse_link_header(link_header, &self.rel) {
                state.set_cursor(next_url.clone());
                return NextPage::with_url(next_url);
            }
        }

        state.mark_done();
        NextPage::Done
    }
}

/// Parse a Link header and extract the URL for the given rel
pub(crate) fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // Link header format: <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                rel = Some(stripped.trim_matches('"').trim_matches('\''));
            }
        }

        if let (Some(u), Some(r)) = (url, rel) {
            if r.split_whitespace().any(|r| r == target_rel) {
                return Some(u.to_string());
            }
        }
    }

    None
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn process_response(
        &self,
        _body: &Value,
        _headers: &HeaderMap,
        state: &mut PaginationState,
    ) -> NextPage {
        state.mark_done();
        NextPage::Done
    }
}
