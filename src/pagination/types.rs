//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::http::Request;
use crate::types::JsonObject;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a continuation token (and the page size) goes on the next request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenLocation {
    /// Query string parameter
    #[default]
    Query,
    /// Top-level field of the JSON body
    Body,
}

impl TokenLocation {
    /// Place `key = value` on the request at this location
    pub fn apply(self, request: Request, key: &str, value: impl Into<String>) -> Request {
        match self {
            Self::Query => request.query(key, value),
            Self::Body => request.body_field(key, Value::String(value.into())),
        }
    }

    /// Place a numeric `key = value` on the request at this location
    ///
    /// Body fields stay numbers so servers with strict schemas accept them.
    pub fn apply_number(self, request: Request, key: &str, value: u32) -> Request {
        match self {
            Self::Query => request.query(key, value.to_string()),
            Self::Body => request.body_field(key, value),
        }
    }
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq)]
pub enum NextPage {
    /// More pages available with these parameters
    Continue {
        /// Query parameters to add/replace
        query_params: Vec<(String, String)>,
        /// Body fields to add/replace
        body_params: JsonObject,
        /// Optional new URL (already carrying its own query string)
        url: Option<String>,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation with a single parameter at the given location
    pub fn with_param(
        location: TokenLocation,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let value = value.into();
        match location {
            TokenLocation::Query => Self::Continue {
                query_params: vec![(key, value)],
                body_params: JsonObject::new(),
                url: None,
            },
            TokenLocation::Body => {
                let mut body_params = JsonObject::new();
                body_params.insert(key, Value::String(value));
                Self::Continue {
                    query_params: Vec::new(),
                    body_params,
                    url: None,
                }
            }
        }
    }

    /// Create a continuation with a new URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::Continue {
            query_params: Vec::new(),
            body_params: JsonObject::new(),
            url: Some(url.into()),
        }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }

    /// Build the follow-up request from the one that produced this page
    ///
    /// A replacement URL drops the previous query string, since the server
    /// already encoded everything it needs into the link.
    pub fn apply(self, request: Request) -> Option<Request> {
        match self {
            Self::Done => None,
            Self::Continue {
                query_params,
                body_params,
                url,
            } => {
                let mut next = match url {
                    Some(url) => {
                        let mut next = request.with_url(url);
                        next.query.clear();
                        next
                    }
                    None => request,
                };
                for (key, value) in query_params {
                    next = next.query(key, value);
                }
                for (key, value) in body_params {
                    next = next.body_field(key, value);
                }
                Some(next)
            }
        }
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages received so far
    pub page: u32,
    /// Last continuation token handed out
    pub cursor: Option<String>,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Increment page number
    pub fn next_page(&mut self) {
        self.page += 1;
    }

    /// Set cursor
    pub fn set_cursor(&mut self, cursor: String) {
        self.cursor = Some(cursor);
    }
}

/// Core trait for pagination strategies
///
/// Strategies only inspect a page and say where the next one is. They never
/// issue requests themselves.
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Process a response and determine if there's a next page
    fn process_response(
        &self,
        body: &Value,
        headers: &HeaderMap,
        state: &mut PaginationState,
    ) -> NextPage;
}
