//! YAML parser for catalog definitions
//!
//! Parses and validates catalog YAML files.
//! Supports both built-in connectors (by name) and custom YAML files (by path).

use crate::connectors;
use crate::error::{Error, Result};
use crate::loader::types::{ConnectorDefinition, PaginationDefinition, StreamDefinition};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

const VALID_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Load a connector definition from a name or file path
///
/// This function first checks if the input is a built-in connector name (e.g., "notion"),
/// then falls back to loading from a file path.
///
/// # Examples
///
/// ```ignore
/// let connector = load_connector("notion")?;
/// let connector = load_connector("./my-catalog.yaml")?;
/// ```
pub fn load_connector(path: impl AsRef<Path>) -> Result<ConnectorDefinition> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    if !path_str.contains('/')
        && !path_str.contains('\\')
        && !path_str.ends_with(".yaml")
        && !path_str.ends_with(".yml")
    {
        if let Some(yaml) = connectors::get_builtin(&path_str) {
            return load_connector_from_str(yaml);
        }
    }

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            let builtin_list = connectors::list_builtin().join(", ");
            Error::config(format!(
                "Connector '{}' not found. Built-in connectors: {}. Or provide a path to a YAML file.",
                path.display(),
                builtin_list
            ))
        } else {
            Error::config(format!(
                "Failed to read connector file '{}': {}",
                path.display(),
                e
            ))
        }
    })?;
    load_connector_from_str(&content)
}

/// Load a connector definition from a YAML string
pub fn load_connector_from_str(yaml: &str) -> Result<ConnectorDefinition> {
    let def: ConnectorDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse connector YAML: {e}")))?;

    validate_connector(&def)?;
    Ok(def)
}

/// Validate a connector definition
fn validate_connector(def: &ConnectorDefinition) -> Result<()> {
    if def.name.is_empty() {
        return Err(Error::config("Connector name cannot be empty"));
    }

    if def.streams.is_empty() {
        return Err(Error::config("Connector must have at least one stream"));
    }

    let stream_names: HashSet<_> = def.streams.iter().map(|s| s.name.as_str()).collect();
    if stream_names.len() != def.streams.len() {
        return Err(Error::config("Duplicate stream names found"));
    }

    for stream in &def.streams {
        validate_stream(stream, &stream_names)?;
    }

    if let Some(ref check) = def.check {
        if check.path.is_empty() {
            return Err(Error::config("Check path cannot be empty"));
        }
        validate_method("check", &check.method)?;
    }

    dependency_order(def, &def.stream_names()).map(|_| ())
}

/// Validate a stream definition
fn validate_stream(stream: &StreamDefinition, known: &HashSet<&str>) -> Result<()> {
    if stream.name.is_empty() {
        return Err(Error::config("Stream name cannot be empty"));
    }

    if stream.request.path.is_empty() {
        return Err(Error::config(format!(
            "Stream '{}' path cannot be empty",
            stream.name
        )));
    }

    validate_method(&stream.name, &stream.request.method)?;

    if let PaginationDefinition::Cursor {
        ref cursor_param,
        ref cursor_path,
        ..
    } = stream.pagination
    {
        if cursor_param.is_empty() || cursor_path.is_empty() {
            return Err(Error::config(format!(
                "Stream '{}' cursor pagination needs cursor_param and cursor_path",
                stream.name
            )));
        }
    }

    if let Some(ref parent) = stream.parent {
        if !known.contains(parent.stream.as_str()) {
            return Err(Error::config(format!(
                "Stream '{}' has unknown parent '{}'",
                stream.name, parent.stream
            )));
        }
        if parent.id_field.is_empty() {
            return Err(Error::config(format!(
                "Stream '{}' parent id_field cannot be empty",
                stream.name
            )));
        }
    }

    if stream.incremental && stream.cursor_field.is_none() {
        return Err(Error::config(format!(
            "Stream '{}' is incremental but has no cursor_field",
            stream.name
        )));
    }

    for key in &stream.primary_key {
        if key.segments().iter().any(String::is_empty) {
            return Err(Error::config(format!(
                "Stream '{}' has an empty primary key path",
                stream.name
            )));
        }
    }

    if let Some(ref non_content) = stream.non_content {
        if non_content.values.is_empty() {
            return Err(Error::config(format!(
                "Stream '{}' non_content needs at least one value",
                stream.name
            )));
        }
    }

    Ok(())
}

fn validate_method(owner: &str, method: &str) -> Result<()> {
    if VALID_METHODS.contains(&method.to_uppercase().as_str()) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "'{owner}' has invalid HTTP method: {method}"
        )))
    }
}

/// Order `selected` streams so every parent comes before its children
///
/// Parents that were not selected are not added: a child reads its parent
/// itself. Otherwise selection order is kept. Cycles are rejected.
pub fn dependency_order<'a>(
    def: &'a ConnectorDefinition,
    selected: &[&str],
) -> Result<Vec<&'a StreamDefinition>> {
    let by_name: HashMap<&str, &StreamDefinition> =
        def.streams.iter().map(|s| (s.name.as_str(), s)).collect();

    for name in selected {
        let mut seen = HashSet::new();
        let mut current = *name;
        loop {
            let stream = by_name
                .get(current)
                .ok_or_else(|| Error::StreamNotFound {
                    stream: current.to_string(),
                })?;
            if !seen.insert(current) {
                return Err(Error::config(format!(
                    "Parent cycle through stream '{current}'"
                )));
            }
            match stream.parent {
                Some(ref parent) => current = parent.stream.as_str(),
                None => break,
            }
        }
    }

    let selected_set: HashSet<&str> = selected.iter().copied().collect();
    let mut ordered: Vec<&StreamDefinition> = Vec::with_capacity(selected.len());
    let mut placed: HashSet<&str> = HashSet::new();

    for name in selected {
        if placed.contains(name) {
            continue;
        }
        // Selected ancestors first, root-most first
        let mut chain = Vec::new();
        let mut current = by_name[name];
        loop {
            chain.push(current);
            match current.parent {
                Some(ref parent) => current = by_name[parent.stream.as_str()],
                None => break,
            }
        }
        for stream in chain.into_iter().rev() {
            let stream_name = stream.name.as_str();
            if selected_set.contains(stream_name) && placed.insert(stream_name) {
                ordered.push(stream);
            }
        }
    }

    Ok(ordered)
}
