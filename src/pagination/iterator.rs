//! Lazy page and record iteration
//!
//! [`PageIterator`] drives one endpoint forward a page at a time through the
//! retry policy. [`RecordPager`] sits on top and hands out decoded records
//! one by one, fetching the next page only when the buffer runs dry.
//!
//! Both are single-pass. After exhaustion or the first error they return
//! `None` forever; a restart means building a new iterator from the persisted
//! checkpoint.

use super::types::{PaginationState, Paginator};
use crate::decode::RecordDecoder;
use crate::error::Result;
use crate::http::{Request, Response, RetryPolicy};
use crate::slice::RecordSource;
use crate::types::Record;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Pages of one endpoint, fetched on demand
#[derive(Debug)]
pub struct PageIterator {
    policy: Arc<RetryPolicy>,
    paginator: Arc<dyn Paginator>,
    next_request: Option<Request>,
    state: PaginationState,
}

impl PageIterator {
    /// Create an iterator whose first page is fetched with `request`
    pub fn new(policy: Arc<RetryPolicy>, paginator: Arc<dyn Paginator>, request: Request) -> Self {
        Self {
            policy,
            paginator,
            next_request: Some(request),
            state: PaginationState::new(),
        }
    }

    /// Fetch the next page, or `None` once the endpoint is exhausted
    pub async fn next_page(&mut self) -> Option<Result<Response>> {
        let request = self.next_request.take()?;

        match self.policy.call(&request).await {
            Ok(response) => {
                self.state.next_page();
                let body = response.json.as_ref().unwrap_or(&Value::Null);
                let next = self
                    .paginator
                    .process_response(body, &response.headers, &mut self.state);
                debug!(
                    "Page {} from {} ({})",
                    self.pages_fetched(),
                    request.url,
                    if next.is_continue() { "more" } else { "last" }
                );
                self.next_request = next.apply(request);
                Some(Ok(response))
            }
            Err(e) => {
                self.stop();
                Some(Err(e))
            }
        }
    }

    /// Stop without fetching anything else
    pub fn stop(&mut self) {
        self.next_request = None;
        self.state.mark_done();
    }

    /// Whether no further page will be fetched
    pub fn is_done(&self) -> bool {
        self.next_request.is_none()
    }

    /// Pages received so far
    pub fn pages_fetched(&self) -> u32 {
        self.state.page
    }
}

/// Records of one endpoint, decoded page by page
#[derive(Debug)]
pub struct RecordPager {
    pages: PageIterator,
    decoder: Arc<dyn RecordDecoder>,
    buffer: VecDeque<Record>,
}

impl RecordPager {
    /// Wrap a page iterator with a decoder
    pub fn new(pages: PageIterator, decoder: Arc<dyn RecordDecoder>) -> Self {
        Self {
            pages,
            decoder,
            buffer: VecDeque::new(),
        }
    }

    /// Next record in server order, or `None` once every page is consumed
    pub async fn next_record(&mut self) -> Option<Result<Record>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }

            let response = match self.pages.next_page().await? {
                Ok(response) => response,
                Err(e) => return Some(Err(e)),
            };

            match self.decoder.decode(&response) {
                Ok(records) => self.buffer.extend(records),
                Err(e) => {
                    debug!("Page {} could not be decoded: {e}", self.pages_fetched());
                    self.pages.stop();
                    return Some(Err(e));
                }
            }
        }
    }

    /// Pages received so far
    pub fn pages_fetched(&self) -> u32 {
        self.pages.pages_fetched()
    }
}

#[async_trait]
impl RecordSource for RecordPager {
    async fn next_record(&mut self) -> Option<Result<Record>> {
        RecordPager::next_record(self).await
    }
}
