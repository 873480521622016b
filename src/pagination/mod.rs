//! Pagination module
//!
//! Supports: Cursor (query or body token), Link Header, none
//!
//! # Overview
//!
//! Strategies inspect a page and say where the next one lives.
//! [`PageIterator`] drives an endpoint with a strategy through the retry
//! policy, and [`RecordPager`] decodes the pages into records lazily.

mod iterator;
mod strategies;
mod types;

pub use iterator::{PageIterator, RecordPager};
pub use strategies::{CursorPaginator, LinkHeaderPaginator, NoPaginator};
pub use types::{NextPage, PaginationState, Paginator, TokenLocation};
