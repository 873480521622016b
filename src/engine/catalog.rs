//! Catalog wiring
//!
//! Turns loaded stream definitions into the runtime pieces the orchestrator
//! composes: paginators, decoders, request templates and the shared
//! transport/auth context.

use crate::auth::Authenticator;
use crate::config::SourceConfig;
use crate::decode::{JsonDecoder, JsonlDecoder, RecordDecoder};
use crate::error::Result;
use crate::expand::ChildSource;
use crate::http::{Request, RetryPolicy};
use crate::loader::{
    ConnectorDefinition, DecoderDefinition, PaginationDefinition, ParentDefinition,
    StreamDefinition,
};
use crate::pagination::{
    CursorPaginator, LinkHeaderPaginator, NoPaginator, PageIterator, Paginator, RecordPager,
    TokenLocation,
};
use crate::schema::KeyPath;
use crate::slice::{RecordSource, Slice};
use crate::template::{render, render_value, TemplateContext};
use crate::types::{JsonValue, Method, SyncMode};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Stream Descriptor
// ============================================================================

/// Public description of one stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamDescriptor {
    /// Stream name
    pub name: String,
    /// Field carrying the incremental timestamp
    pub cursor_field: Option<String>,
    /// Whether incremental reads are possible
    pub supports_incremental: bool,
    /// Modes the stream can be read in
    pub supported_sync_modes: Vec<SyncMode>,
    /// Primary key paths
    pub primary_key: Vec<KeyPath>,
    /// Parent stream name
    pub parent: Option<String>,
}

impl From<&StreamDefinition> for StreamDescriptor {
    fn from(def: &StreamDefinition) -> Self {
        Self {
            name: def.name.clone(),
            cursor_field: def.cursor_field.clone(),
            supports_incremental: def.supports_incremental(),
            supported_sync_modes: if def.supports_incremental() {
                vec![SyncMode::FullRefresh, SyncMode::Incremental]
            } else {
                vec![SyncMode::FullRefresh]
            },
            primary_key: def.primary_key.clone(),
            parent: def.parent.as_ref().map(|p| p.stream.clone()),
        }
    }
}

/// Descriptors of every stream in a connector
pub fn discover(def: &ConnectorDefinition) -> Vec<StreamDescriptor> {
    def.streams.iter().map(StreamDescriptor::from).collect()
}

// ============================================================================
// Shared Context
// ============================================================================

/// Everything requests of one sync share
#[derive(Debug)]
pub struct SourceContext {
    /// Retrying transport
    pub policy: Arc<RetryPolicy>,
    /// Credentials
    pub auth: Authenticator,
    /// Connector-wide headers
    pub headers: BTreeMap<String, String>,
    /// Source configuration
    pub config: SourceConfig,
    config_value: JsonValue,
}

impl SourceContext {
    /// Resolve auth and headers for a connector
    pub fn new(
        def: &ConnectorDefinition,
        config: SourceConfig,
        policy: Arc<RetryPolicy>,
    ) -> Result<Self> {
        let config_value = config.to_template_value();
        let ctx = TemplateContext::with_config(config_value.clone());
        let auth = Authenticator::from_definition(&def.auth, &ctx)?;
        let headers = def
            .headers
            .iter()
            .map(|(k, v)| render(v, &ctx).map(|value| (k.clone(), value)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self {
            policy,
            auth,
            headers,
            config,
            config_value,
        })
    }

    /// Template context for one stream and slice
    pub fn template_context(&self, stream: &str, slice: &Slice) -> TemplateContext {
        let mut ctx = TemplateContext::with_config(self.config_value.clone());
        ctx.set_slice(slice.to_template_value());
        ctx.set_stream(json!({ "name": stream }));
        ctx
    }

    /// Stamp connector headers and credentials onto a request
    pub fn prepare(&self, mut request: Request) -> Request {
        for (key, value) in &self.headers {
            if request.header_value(key).is_none() {
                request = request.header(key, value);
            }
        }
        self.auth.apply(request)
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Request template plus pagination and decoding of one stream
#[derive(Debug)]
pub struct Endpoint {
    stream: String,
    definition: StreamDefinition,
    paginator: Arc<dyn Paginator>,
    decoder: Arc<dyn RecordDecoder>,
    page_size: Option<(String, TokenLocation, u32)>,
    context: Arc<SourceContext>,
}

impl Endpoint {
    /// Build the endpoint of a stream
    pub fn new(definition: &StreamDefinition, context: Arc<SourceContext>) -> Self {
        let page_size = match definition.pagination {
            PaginationDefinition::Cursor {
                page_size_param: Some(ref param),
                location,
                ..
            } => Some((
                param.clone(),
                location,
                context.config.page_size_for(&definition.name),
            )),
            _ => None,
        };

        Self {
            stream: definition.name.clone(),
            definition: definition.clone(),
            paginator: build_paginator(&definition.pagination),
            decoder: build_decoder(&definition.decoder),
            page_size,
            context,
        }
    }

    /// Stream name
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Parent relation, if any
    pub fn parent(&self) -> Option<&ParentDefinition> {
        self.definition.parent.as_ref()
    }

    /// The first request for a slice
    pub fn first_request(&self, slice: &Slice) -> Result<Request> {
        let ctx = self.context.template_context(&self.stream, slice);
        let def = &self.definition.request;

        let method = parse_method(&def.method);
        let mut request = Request::new(method, render(&def.path, &ctx)?);
        for (key, value) in &def.params {
            let rendered = render(value, &ctx)?;
            if !rendered.is_empty() {
                request = request.query(key, rendered);
            }
        }
        for (key, value) in &def.headers {
            request = request.header(key, render(value, &ctx)?);
        }
        if let Some(ref body) = def.body {
            request = request.json(render_value(body, &ctx)?);
        }
        if let Some((ref param, location, size)) = self.page_size {
            request = location.apply_number(request, param, size);
        }

        Ok(self.context.prepare(request))
    }

    /// Lazy records of one slice
    pub fn pager(&self, slice: &Slice) -> Result<RecordPager> {
        let request = self.first_request(slice)?;
        let pages = PageIterator::new(self.context.policy.clone(), self.paginator.clone(), request);
        Ok(RecordPager::new(pages, self.decoder.clone()))
    }
}

/// Children of a node are read from the same endpoint with the node as parent
#[derive(Debug)]
pub struct EndpointChildren {
    endpoint: Arc<Endpoint>,
    slice: Slice,
}

impl EndpointChildren {
    /// Expand nodes below `slice`, keeping its parent cursor value
    pub fn new(endpoint: Arc<Endpoint>, slice: Slice) -> Self {
        Self { endpoint, slice }
    }
}

impl ChildSource for EndpointChildren {
    fn children(&self, parent_id: &str) -> Result<Box<dyn RecordSource>> {
        let mut slice = self.slice.clone();
        slice.parent_id = Some(parent_id.to_string());
        Ok(Box::new(self.endpoint.pager(&slice)?))
    }
}

// ============================================================================
// Builders
// ============================================================================

pub(crate) fn parse_method(method: &str) -> Method {
    match method.to_uppercase().as_str() {
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "PATCH" => Method::PATCH,
        "DELETE" => Method::DELETE,
        _ => Method::GET,
    }
}

/// Build a paginator from its definition
pub fn build_paginator(def: &PaginationDefinition) -> Arc<dyn Paginator> {
    match def {
        PaginationDefinition::None => Arc::new(NoPaginator),
        PaginationDefinition::Cursor {
            cursor_param,
            cursor_path,
            has_more_path,
            location,
            ..
        } => {
            let mut paginator =
                CursorPaginator::new(cursor_param.clone(), cursor_path.clone()).with_location(*location);
            if let Some(path) = has_more_path {
                paginator = paginator.with_has_more(path.clone());
            }
            Arc::new(paginator)
        }
        PaginationDefinition::LinkHeader { rel } => Arc::new(LinkHeaderPaginator::new(rel.clone())),
    }
}

/// Build a decoder from its definition
pub fn build_decoder(def: &DecoderDefinition) -> Arc<dyn RecordDecoder> {
    match def {
        DecoderDefinition::Json {
            records_path: Some(path),
        } => Arc::new(JsonDecoder::with_path(path.clone())),
        DecoderDefinition::Json { records_path: None } => Arc::new(JsonDecoder::new()),
        DecoderDefinition::Jsonl => Arc::new(JsonlDecoder::new()),
    }
}
