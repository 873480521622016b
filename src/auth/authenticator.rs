//! Authenticator implementation
//!
//! Applies resolved credentials to requests.

use crate::error::{Error, Result};
use crate::http::Request;
use crate::loader::{AuthDefinition, AuthLocation};
use crate::template::{render, TemplateContext};

/// Resolved authentication settings
#[derive(Clone, Default, PartialEq, Eq)]
pub enum AuthConfig {
    /// No authentication
    #[default]
    None,
    /// Verbatim value in a header or query parameter
    ApiKey {
        /// Header or query parameter name
        name: String,
        /// Value sent as-is
        value: String,
        /// Where the value goes
        location: AuthLocation,
    },
    /// `Authorization: Bearer <token>`
    Bearer {
        /// Token without the scheme
        token: String,
    },
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::ApiKey { name, location, .. } => f
                .debug_struct("ApiKey")
                .field("name", name)
                .field("value", &"<redacted>")
                .field("location", location)
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Authenticator handles applying authentication to requests
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Resolve a catalog auth definition against the template context
    pub fn from_definition(def: &AuthDefinition, ctx: &TemplateContext) -> Result<Self> {
        let config = match def {
            AuthDefinition::None => AuthConfig::None,
            AuthDefinition::ApiKey {
                key,
                value,
                location,
            } => AuthConfig::ApiKey {
                name: key.clone(),
                value: non_empty("api_key value", render(value, ctx)?)?,
                location: *location,
            },
            AuthDefinition::Bearer { token } => AuthConfig::Bearer {
                token: non_empty("bearer token", render(token, ctx)?)?,
            },
        };
        Ok(Self::new(config))
    }

    /// Stamp credentials onto a request
    pub fn apply(&self, request: Request) -> Request {
        match &self.config {
            AuthConfig::None => request,
            AuthConfig::ApiKey {
                name,
                value,
                location: AuthLocation::Header,
            } => request.header(name, value),
            AuthConfig::ApiKey {
                name,
                value,
                location: AuthLocation::Query,
            } => request.query(name, value),
            AuthConfig::Bearer { token } => request.header("Authorization", format!("Bearer {token}")),
        }
    }

    /// The resolved config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

fn non_empty(what: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        Err(Error::config(format!("Rendered {what} is empty")))
    } else {
        Ok(value)
    }
}
