//! Built-in catalog definitions embedded in the binary
//!
//! This module embeds the supported catalog YAML files directly into the binary,
//! allowing users to pass `--connector notion` instead of a file path.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Built-in catalog YAML definitions
pub static BUILTIN_CONNECTORS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        let mut m = HashMap::new();
        m.insert("notion", include_str!("../connectors/notion.yaml"));
        m
    });

/// Get a built-in connector by name
pub fn get_builtin(name: &str) -> Option<&'static str> {
    BUILTIN_CONNECTORS.get(name).copied()
}

/// Check if a connector name is a built-in connector
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_CONNECTORS.contains_key(name)
}

/// List all built-in connector names, sorted
pub fn list_builtin() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTIN_CONNECTORS.keys().copied().collect();
    names.sort_unstable();
    names
}
