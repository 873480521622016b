//! Per-stream record reader
//!
//! A [`StreamReader`] pulls slices from its slicer and, for each slice that
//! can change anything, reads the slice's records (expanded depth-first when
//! the stream is a tree), filters them against the checkpoint and validates
//! primary keys. Records come out one at a time; nothing is buffered beyond
//! the current page.

use super::catalog::{Endpoint, EndpointChildren, SourceContext};
use super::types::ReaderStats;
use crate::error::{Error, Result};
use crate::expand::{ExpandConfig, RecordExpander};
use crate::loader::{ConnectorDefinition, StreamDefinition};
use crate::schema::PrimaryKeyValidator;
use crate::slice::{ParentSlicer, RecordSource, SingleSlicer, Slice, StreamSlicer};
use crate::state::{
    CursorTracker, CursorValue, FilterDecision, NonContentPredicate, RecordFilter,
    TypeFieldPredicate,
};
use crate::types::{JsonValue, Record};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// How a stream is read
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Checkpoint for an incremental read; `None` reads in full refresh
    pub checkpoint: Option<CursorValue>,
    /// Validate primary keys of emitted records
    pub validate_primary_keys: bool,
}

impl ReadOptions {
    /// Full refresh without validation
    pub fn full_refresh() -> Self {
        Self::default()
    }

    /// Incremental read from a checkpoint
    pub fn incremental(checkpoint: CursorValue) -> Self {
        Self {
            checkpoint: Some(checkpoint),
            ..Self::default()
        }
    }

    /// Enable primary key validation
    #[must_use]
    pub fn with_primary_key_validation(mut self, enabled: bool) -> Self {
        self.validate_primary_keys = enabled;
        self
    }
}

/// Expansion settings resolved for one stream
struct Expansion {
    config: ExpandConfig,
    non_content: Option<Arc<dyn NonContentPredicate>>,
}

/// Filtered, validated records of one stream
pub struct StreamReader {
    name: String,
    endpoint: Arc<Endpoint>,
    slicer: Box<dyn StreamSlicer>,
    filter: RecordFilter,
    tracker: CursorTracker,
    validator: Option<PrimaryKeyValidator>,
    expansion: Option<Expansion>,
    inject_as: Option<String>,
    current: Option<(Slice, Box<dyn RecordSource>)>,
    done: bool,
    stats: ReaderStats,
}

impl StreamReader {
    /// Build the reader of `stream`
    ///
    /// Child streams read their parent in full refresh mode, recursively.
    pub fn new(
        def: &ConnectorDefinition,
        stream: &StreamDefinition,
        context: Arc<SourceContext>,
        options: ReadOptions,
    ) -> Result<Self> {
        let endpoint = Arc::new(Endpoint::new(stream, context.clone()));
        let incremental = stream.supports_incremental() && options.checkpoint.is_some();
        let checkpoint = if incremental { options.checkpoint } else { None };

        let slicer: Box<dyn StreamSlicer> = match stream.parent {
            Some(ref parent) => {
                let parent_def = def.get_stream(&parent.stream).ok_or_else(|| {
                    Error::StreamNotFound {
                        stream: parent.stream.clone(),
                    }
                })?;
                let parent_reader =
                    StreamReader::new(def, parent_def, context, ReadOptions::full_refresh())?;
                Box::new(ParentSlicer::new(
                    stream.name.clone(),
                    Box::new(parent_reader),
                    parent.id_field.clone(),
                    parent.cursor_field.clone(),
                    checkpoint.clone(),
                ))
            }
            None => Box::new(SingleSlicer::new(checkpoint.clone())),
        };

        let non_content: Option<Arc<dyn NonContentPredicate>> =
            stream.non_content.as_ref().map(|nc| {
                Arc::new(TypeFieldPredicate::new(nc.field.clone(), nc.values.clone()))
                    as Arc<dyn NonContentPredicate>
            });

        let inherits_parent_cursor = stream
            .parent
            .as_ref()
            .is_some_and(|p| p.cursor_field.is_some());
        let filter = if incremental {
            RecordFilter::incremental(stream.cursor_field.clone(), checkpoint.clone())
        } else {
            RecordFilter::full_refresh()
        }
        .inheriting_parent_cursor(inherits_parent_cursor)
        .with_non_content(non_content.clone());

        let mut tracker = CursorTracker::new(stream.cursor_field.clone());
        tracker.load(checkpoint);

        let validator = (options.validate_primary_keys && !stream.primary_key.is_empty())
            .then(|| PrimaryKeyValidator::new(stream.name.clone(), &stream.primary_key));

        let expansion = stream.expand.as_ref().map(|ex| Expansion {
            config: ExpandConfig::default()
                .with_order(ex.order)
                .with_fields(ex.id_field.clone(), ex.has_children_field.clone()),
            non_content,
        });

        Ok(Self {
            name: stream.name.clone(),
            endpoint,
            slicer,
            filter,
            tracker,
            validator,
            expansion,
            inject_as: stream.parent.as_ref().and_then(|p| p.inject_as.clone()),
            current: None,
            done: false,
            stats: ReaderStats::default(),
        })
    }

    /// Stream name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counters so far
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// The cursor state machine of this read
    pub fn tracker(&self) -> &CursorTracker {
        &self.tracker
    }

    /// Mutable access for completing or failing the read
    pub fn tracker_mut(&mut self) -> &mut CursorTracker {
        &mut self.tracker
    }

    /// Next emitted record, or `None` once every slice is read
    ///
    /// The first error ends the read.
    pub async fn next_record(&mut self) -> Option<Result<Record>> {
        loop {
            if let Some((slice, source)) = self.current.as_mut() {
                match source.next_record().await {
                    Some(Ok(mut record)) => match self.filter.decide(&record, slice) {
                        FilterDecision::NonContent => self.stats.non_content += 1,
                        FilterDecision::Stale => self.stats.stale += 1,
                        FilterDecision::Emit(value) => {
                            if let Some(ref field) = self.inject_as {
                                let parent_cursor = slice
                                    .parent_cursor_value
                                    .as_ref()
                                    .map_or(JsonValue::Null, CursorValue::to_json);
                                record.insert(field.clone(), parent_cursor);
                            }
                            if let Some(ref validator) = self.validator {
                                if let Err(e) = validator.validate(&record) {
                                    return Some(Err(self.stop(e)));
                                }
                            }
                            // reported state holds at the checkpoint until the stream finishes
                            self.tracker
                                .get_updated_state(self.filter.checkpoint(), value.as_ref());
                            self.stats.records += 1;
                            return Some(Ok(record));
                        }
                    },
                    Some(Err(e)) => return Some(Err(self.stop(e))),
                    None => self.current = None,
                }
                continue;
            }

            if self.done {
                return None;
            }

            let slice = match self.slicer.next_slice().await {
                Some(Ok(slice)) => slice,
                Some(Err(e)) => return Some(Err(self.stop(e))),
                None => {
                    self.done = true;
                    return None;
                }
            };

            if self.filter.should_skip_slice(&slice) {
                self.stats.slices_skipped += 1;
                debug!(
                    "Skipping unchanged parent {} of stream {}",
                    slice.parent_id.as_deref().unwrap_or("-"),
                    self.name
                );
                continue;
            }

            match self.open(&slice) {
                Ok(source) => {
                    self.stats.slices += 1;
                    self.current = Some((slice, source));
                }
                Err(e) => return Some(Err(self.stop(e))),
            }
        }
    }

    /// Records of one slice, expanded when the stream is a tree
    fn open(&self, slice: &Slice) -> Result<Box<dyn RecordSource>> {
        let pager = self.endpoint.pager(slice)?;
        let Some(ref expansion) = self.expansion else {
            return Ok(Box::new(pager));
        };

        let children = Arc::new(EndpointChildren::new(self.endpoint.clone(), slice.clone()));
        let mut expander = RecordExpander::new(children, expansion.config.clone())
            .with_non_content(expansion.non_content.clone());
        expander.start_with(Box::new(pager));
        Ok(Box::new(expander))
    }

    fn stop(&mut self, error: Error) -> Error {
        self.current = None;
        self.done = true;
        error
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("tracker", &self.tracker)
            .field("stats", &self.stats)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RecordSource for StreamReader {
    async fn next_record(&mut self) -> Option<Result<Record>> {
        StreamReader::next_record(self).await
    }
}
