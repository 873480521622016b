//! Authentication module
//!
//! Supports: API Key (header or query), Bearer, None
//!
//! Credentials are resolved once from the catalog's auth definition and the
//! source config, then stamped onto every request before it reaches the
//! retry policy.

mod authenticator;

pub use authenticator::{AuthConfig, Authenticator};
