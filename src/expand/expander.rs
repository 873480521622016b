use crate::error::Result;
use crate::slice::RecordSource;
use crate::state::NonContentPredicate;
use crate::types::{record_field, scalar_to_string, Record, TraversalOrder};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens a lazy record source over the children of one node
pub trait ChildSource: Send + Sync {
    /// Children of the node with identifier `parent_id`, in server order
    fn children(&self, parent_id: &str) -> Result<Box<dyn RecordSource>>;
}

/// Expansion settings for one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandConfig {
    /// Field holding a node's identifier
    pub id_field: String,
    /// Boolean field telling whether a node has children
    pub has_children_field: String,
    /// Where a node is emitted relative to its subtree
    pub order: TraversalOrder,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            has_children_field: "has_children".to_string(),
            order: TraversalOrder::PreOrder,
        }
    }
}

impl ExpandConfig {
    /// Set the traversal order
    #[must_use]
    pub fn with_order(mut self, order: TraversalOrder) -> Self {
        self.order = order;
        self
    }

    /// Set the identifier and has-children fields
    #[must_use]
    pub fn with_fields(
        mut self,
        id_field: impl Into<String>,
        has_children_field: impl Into<String>,
    ) -> Self {
        self.id_field = id_field.into();
        self.has_children_field = has_children_field.into();
        self
    }
}

/// One level of the traversal
struct Frame {
    children: Box<dyn RecordSource>,
    /// Node waiting for its subtree to finish (post-order only)
    pending: Option<Record>,
}

/// Explicit-stack depth-first walk over a record tree
pub struct RecordExpander {
    source: Arc<dyn ChildSource>,
    config: ExpandConfig,
    non_content: Option<Arc<dyn NonContentPredicate>>,
    stack: Vec<Frame>,
    max_depth: usize,
}

impl RecordExpander {
    /// Create an expander; nothing is fetched until [`start`](Self::start)
    pub fn new(source: Arc<dyn ChildSource>, config: ExpandConfig) -> Self {
        Self {
            source,
            config,
            non_content: None,
            stack: Vec::new(),
            max_depth: 0,
        }
    }

    /// Records matching the predicate are yielded but never descended into
    #[must_use]
    pub fn with_non_content(mut self, predicate: Option<Arc<dyn NonContentPredicate>>) -> Self {
        self.non_content = predicate;
        self
    }

    /// Begin the walk below `root_id`. The root itself is not emitted.
    #[cfg(test)]
    pub(crate) fn start(&mut self, root_id: &str) -> Result<()> {
        let children = self.source.children(root_id)?;
        self.start_with(children);
        Ok(())
    }

    /// Begin the walk from an already opened list of top-level nodes
    pub fn start_with(&mut self, top_level: Box<dyn RecordSource>) {
        self.stack.clear();
        self.max_depth = 0;
        self.push(top_level, None);
    }

    /// Current stack depth
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Deepest stack seen since the last [`start`](Self::start)
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Next record of the tree, or `None` once every subtree is exhausted
    ///
    /// The first error ends the walk.
    pub async fn next_record(&mut self) -> Option<Result<Record>> {
        loop {
            let frame = self.stack.last_mut()?;

            let record = match frame.children.next_record().await {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
                None => {
                    let finished = self.stack.pop()?;
                    match finished.pending {
                        Some(node) => return Some(Ok(node)),
                        None => continue,
                    }
                }
            };

            let Some(id) = self.descend_into(&record) else {
                return Some(Ok(record));
            };

            let children = match self.source.children(&id) {
                Ok(children) => children,
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            };

            match self.config.order {
                TraversalOrder::PreOrder => {
                    self.push(children, None);
                    return Some(Ok(record));
                }
                TraversalOrder::PostOrder => self.push(children, Some(record)),
            }
        }
    }

    fn push(&mut self, children: Box<dyn RecordSource>, pending: Option<Record>) {
        self.stack.push(Frame { children, pending });
        self.max_depth = self.max_depth.max(self.stack.len());
        debug!("Expanding at depth {}", self.stack.len());
    }

    /// Identifier to descend into, if the record has expandable children
    fn descend_into(&self, record: &Record) -> Option<String> {
        let has_children = matches!(
            record_field(record, &self.config.has_children_field),
            Some(Value::Bool(true))
        );
        if !has_children {
            return None;
        }
        if self
            .non_content
            .as_ref()
            .is_some_and(|p| p.is_non_content(record))
        {
            return None;
        }
        match record_field(record, &self.config.id_field).and_then(scalar_to_string) {
            Some(id) if !id.is_empty() => Some(id),
            _ => {
                warn!(
                    "Record has children but no '{}', treating it as a leaf",
                    self.config.id_field
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for RecordExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordExpander")
            .field("config", &self.config)
            .field("depth", &self.stack.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

#[async_trait]
impl RecordSource for RecordExpander {
    async fn next_record(&mut self) -> Option<Result<Record>> {
        RecordExpander::next_record(self).await
    }
}
