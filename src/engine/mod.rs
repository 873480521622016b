//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Wires a catalog, source config and state into a sync
//! - `SyncRun` - Pull-based message loop over the selected streams
//! - `StreamReader` - Filtered, validated records of one stream
//! - Message types for output (Record, State, Log, Error)
//!
//! Streams are read one after another in parent-first order. A failure ends
//! its own stream only, except for rejected credentials and cancellation,
//! which end the whole sync. A stream's checkpoint is persisted and reported
//! only when the stream completes.

mod catalog;
mod reader;
mod types;

pub use catalog::{
    build_decoder, build_paginator, discover, Endpoint, EndpointChildren, SourceContext,
    StreamDescriptor,
};
pub use reader::{ReadOptions, StreamReader};
pub use types::{Message, ReaderStats, SyncConfig, SyncStats};

use crate::config::SourceConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::http::{HttpClient, HttpClientConfig, Request, RetryPolicy, Transport};
use crate::loader::{dependency_order, ConnectorDefinition};
use crate::state::{StateManager, StreamCheckpoint, StreamState};
use crate::template::{render, TemplateContext};
use futures::Stream;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// ============================================================================
// Sync Engine
// ============================================================================

/// Sync engine for orchestrating data extraction
#[derive(Debug)]
pub struct SyncEngine {
    definition: Arc<ConnectorDefinition>,
    context: Arc<SourceContext>,
    state: StateManager,
    config: SyncConfig,
}

impl SyncEngine {
    /// Create an engine talking HTTP to the configured base URL
    ///
    /// The source config's base URL wins over the catalog's.
    pub fn new(
        definition: ConnectorDefinition,
        source: SourceConfig,
        state: StateManager,
    ) -> Result<Self> {
        source.validate()?;
        let base_url = source
            .base_url
            .clone()
            .or_else(|| definition.base_url.clone())
            .ok_or_else(|| Error::missing_field("base_url"))?;

        let mut builder = HttpClientConfig::builder()
            .base_url(base_url)
            .timeout(Duration::from_secs(source.request_timeout_seconds));
        builder = match source.rate_limiter_config() {
            Some(limit) => builder.rate_limit(limit),
            None => builder.no_rate_limit(),
        };
        let client = HttpClient::with_config(builder.build())?;

        Self::with_transport(definition, source, state, Arc::new(client))
    }

    /// Create an engine over an arbitrary transport
    pub fn with_transport(
        definition: ConnectorDefinition,
        source: SourceConfig,
        state: StateManager,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let policy = Arc::new(RetryPolicy::new(transport, source.retry_config()));
        let context = Arc::new(SourceContext::new(&definition, source, policy)?);

        Ok(Self {
            definition: Arc::new(definition),
            context,
            state,
            config: SyncConfig::default(),
        })
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the connector definition
    pub fn definition(&self) -> &ConnectorDefinition {
        &self.definition
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Token that stops every in-flight request and pending sleep
    pub fn cancellation_token(&self) -> CancellationToken {
        self.context.policy.cancellation_token().clone()
    }

    /// Describe every stream of the catalog
    pub fn discover(&self) -> Vec<StreamDescriptor> {
        discover(&self.definition)
    }

    /// Verify connectivity and credentials against the check endpoint
    pub async fn check(&self) -> Result<()> {
        let check = self
            .definition
            .check
            .as_ref()
            .ok_or_else(|| Error::config("Connector defines no check endpoint"))?;

        let ctx = TemplateContext::with_config(self.context.config.to_template_value());
        let mut request = Request::new(
            catalog::parse_method(&check.method),
            render(&check.path, &ctx)?,
        );
        for (key, value) in &check.params {
            request = request.query(key, render(value, &ctx)?);
        }

        let response = self.context.policy.call(&self.context.prepare(request)).await?;
        info!("Connection check passed ({})", response.status);
        Ok(())
    }

    /// Start reading the selected streams, every stream when empty
    pub fn read(&self, selection: &[&str]) -> Result<SyncRun> {
        let all = self.definition.stream_names();
        let selected = if selection.is_empty() {
            all.as_slice()
        } else {
            selection
        };
        let pending = dependency_order(&self.definition, selected)?
            .into_iter()
            .map(|s| s.name.clone())
            .collect();

        Ok(SyncRun {
            definition: self.definition.clone(),
            context: self.context.clone(),
            state: self.state.clone(),
            config: self.config.clone(),
            pending,
            current: None,
            outbox: VecDeque::new(),
            stats: SyncStats::default(),
            started: Instant::now(),
            finished: false,
        })
    }
}

// ============================================================================
// Sync Run
// ============================================================================

struct ActiveStream {
    reader: StreamReader,
    responses_at_start: u64,
}

/// One pass over the selected streams
///
/// Call [`next_message`](Self::next_message) until it returns `None`.
pub struct SyncRun {
    definition: Arc<ConnectorDefinition>,
    context: Arc<SourceContext>,
    state: StateManager,
    config: SyncConfig,
    pending: VecDeque<String>,
    current: Option<ActiveStream>,
    outbox: VecDeque<Message>,
    stats: SyncStats,
    started: Instant,
    finished: bool,
}

impl SyncRun {
    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Next message of the sync, or `None` once it is over
    pub async fn next_message(&mut self) -> Option<Message> {
        loop {
            if let Some(message) = self.outbox.pop_front() {
                return Some(message);
            }
            if self.finished {
                return None;
            }
            if self.context.policy.cancellation_token().is_cancelled() {
                let stream = self.current.take().map(|active| active.reader.name().to_string());
                self.cancel(stream.as_deref());
                continue;
            }

            let Some(active) = self.current.as_mut() else {
                match self.pending.pop_front() {
                    Some(name) => self.start_stream(&name).await,
                    None => self.finish(),
                }
                continue;
            };

            match active.reader.next_record().await {
                Some(Ok(record)) => {
                    self.stats.add_record();
                    return Some(Message::record(active.reader.name(), record));
                }
                Some(Err(e)) => {
                    if let Some(active) = self.current.take() {
                        self.fail_stream(active, e);
                    }
                }
                None => {
                    if let Some(active) = self.current.take() {
                        self.complete_stream(active).await;
                    }
                }
            }
        }
    }

    /// Adapt the run into a message stream
    pub fn into_stream(self) -> impl Stream<Item = Message> {
        futures::stream::unfold(self, |mut run| async move {
            run.next_message().await.map(|message| (message, run))
        })
    }

    /// Drain the run into a vector
    pub async fn collect(mut self) -> (Vec<Message>, SyncStats) {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message().await {
            messages.push(message);
        }
        (messages, self.stats)
    }

    async fn start_stream(&mut self, name: &str) {
        let Some(stream) = self.definition.get_stream(name) else {
            let e = Error::StreamNotFound {
                stream: name.to_string(),
            };
            self.outbox.push_back(Message::error(name, &e));
            self.stats.add_error();
            return;
        };

        let checkpoint = if self.config.full_refresh || !stream.supports_incremental() {
            None
        } else {
            Some(
                self.state
                    .get_cursor(name)
                    .await
                    .unwrap_or_else(|| self.context.config.start_checkpoint()),
            )
        };
        info!(
            "Reading stream {name} ({})",
            checkpoint
                .as_ref()
                .map_or_else(|| "full refresh".to_string(), |c| format!("since {c}"))
        );

        let options = ReadOptions {
            checkpoint,
            validate_primary_keys: self.config.validate_primary_keys,
        };
        self.context.policy.begin_stream();
        match StreamReader::new(&self.definition, stream, self.context.clone(), options) {
            Ok(reader) => {
                self.current = Some(ActiveStream {
                    reader,
                    responses_at_start: self.context.policy.responses(),
                });
            }
            Err(e) => {
                error!("Stream {name} could not start: {e}");
                self.outbox.push_back(Message::error(name, &e));
                self.stats.add_error();
            }
        }
    }

    async fn complete_stream(&mut self, mut active: ActiveStream) {
        let name = active.reader.name().to_string();
        let cursor_field = active.reader.tracker().cursor_field().map(str::to_string);
        active.reader.tracker_mut().finish();
        let StreamState {
            cursor_value,
            high_watermark,
            ..
        } = active.reader.tracker().snapshot();
        let pages = self.context.policy.responses() - active.responses_at_start;
        let reader_stats = active.reader.stats();

        let incremental = self
            .definition
            .get_stream(&name)
            .is_some_and(|s| s.supports_incremental());
        if incremental && cursor_value.is_some() {
            let checkpoint = StreamCheckpoint::new(cursor_field.clone(), cursor_value.clone());
            if let Err(e) = self.state.set_stream_state(&name, checkpoint).await {
                error!("Failed to persist state of stream {name}: {e}");
                self.outbox.push_back(Message::error(name.as_str(), &e));
                self.stats.add_error();
                return;
            }
        }

        debug!(
            "Stream {name}: {} slices, {} skipped, {} non-content, {} stale, high-watermark {}",
            reader_stats.slices,
            reader_stats.slices_skipped,
            reader_stats.non_content,
            reader_stats.stale,
            high_watermark.map_or_else(|| "none".to_string(), |hw| hw.to_string())
        );
        self.stats.add_pages(pages);
        self.stats.add_stream();
        self.outbox
            .push_back(Message::state(name.as_str(), cursor_field, cursor_value));
        self.outbox.push_back(Message::info(format!(
            "Stream {name} completed: {} records, {pages} pages",
            reader_stats.records
        )));
    }

    fn fail_stream(&mut self, mut active: ActiveStream, e: Error) {
        let name = active.reader.name().to_string();
        active.reader.tracker_mut().fail();
        debug!(
            "Stream {name} keeps checkpoint {:?}",
            active.reader.tracker().snapshot().cursor_value
        );
        self.stats
            .add_pages(self.context.policy.responses() - active.responses_at_start);

        match e.kind() {
            ErrorKind::InvalidCursor => {
                warn!("Skipping stream {name}: {e}");
                self.outbox
                    .push_back(Message::warn(format!("Skipping stream {name}: {e}")));
                self.stats.add_skipped();
            }
            ErrorKind::Cancelled => self.cancel(Some(&name)),
            kind if kind.aborts_sync() => {
                error!("Aborting sync on stream {name}: {e}");
                self.outbox.push_back(Message::error(name.as_str(), &e));
                self.stats.add_error();
                self.pending.clear();
                self.finished = true;
            }
            _ => {
                error!("Stream {name} failed: {e}");
                self.outbox.push_back(Message::error(name.as_str(), &e));
                self.stats.add_error();
            }
        }
    }

    fn cancel(&mut self, stream: Option<&str>) {
        let message = match stream {
            Some(name) => format!("Sync cancelled during stream {name}"),
            None => "Sync cancelled".to_string(),
        };
        info!("{message}");
        self.outbox.push_back(Message::info(message));
        self.pending.clear();
        self.finished = true;
    }

    fn finish(&mut self) {
        self.stats
            .set_duration(self.started.elapsed().as_millis() as u64);
        info!(
            "Sync complete: {} records from {} streams, {} skipped, {} failed",
            self.stats.records_synced,
            self.stats.streams_synced,
            self.stats.streams_skipped,
            self.stats.errors
        );
        self.finished = true;
    }
}

impl std::fmt::Debug for SyncRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRun")
            .field("pending", &self.pending)
            .field(
                "current",
                &self.current.as_ref().map(|active| active.reader.name()),
            )
            .field("stats", &self.stats)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
