//! Request and response values exchanged with the transport
//!
//! Both are plain data. A [`Request`] is never mutated in place: every
//! builder method consumes it and returns a new value, so a request that
//! has been handed to the retry policy can be replayed verbatim.

use crate::types::{JsonValue, Method};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

/// A single HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Absolute URL or path relative to the client's base URL
    pub url: String,
    /// Query parameters, in insertion order
    pub query: Vec<(String, String)>,
    /// Request headers, in insertion order
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
}

impl Request {
    /// Create a request
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set a query parameter, replacing any previous value for the key
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.query.push((key, value)),
        }
        self
    }

    /// Add a header, replacing any previous value (case-insensitive)
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((key, value)),
        }
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a top-level field of the JSON body, creating an object body if needed
    #[must_use]
    pub fn body_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut body = match self.body.take() {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        body.insert(key.into(), value.into());
        self.body = Some(Value::Object(body));
        self
    }

    /// Replace the URL, keeping everything else
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Get a query parameter
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header value (case-insensitive)
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// A received HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Bytes,
    /// Decoded body, present when the content type is JSON and it parsed
    pub json: Option<JsonValue>,
}

impl Response {
    /// Build a response from raw parts, decoding JSON when the content type says so
    pub fn from_parts(status: u16, headers: HeaderMap, body: Bytes) -> Self {
        let json = if is_json_content_type(&headers) && !body.is_empty() {
            match serde_json::from_slice(&body) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!("Response declared JSON but did not parse: {e}");
                    None
                }
            }
        } else {
            None
        };
        Self {
            status,
            headers,
            body,
            json,
        }
    }

    /// Build a JSON response (mostly useful for scripted transports)
    pub fn json(status: u16, value: JsonValue) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(value.to_string()),
            json: Some(value),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The server's `retry-after` hint (integer seconds)
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Body as lossy UTF-8 text, for error messages
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Get a string field of the JSON body
    pub fn json_str(&self, field: &str) -> Option<&str> {
        self.json.as_ref()?.get(field)?.as_str()
    }
}

/// Check whether headers declare a JSON body
fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
}
