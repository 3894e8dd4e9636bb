//! Configuration data model and JSON loader.
//!
//! spec.md treats config loading as an external collaborator; this module
//! is the concrete implementation a runnable binary needs. [`RawTopLevel`]
//! and [`RawServer`] mirror the JSON wire shape (spec.md §6) exactly;
//! [`Configuration`] is the fully-resolved, immutable-per-listener record
//! the rest of the crate actually consults (spec.md §3).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

fn default_max_connections() -> usize {
    64
}

fn default_timeout() -> u64 {
    15
}

fn default_charset() -> String {
    "utf-8".to_string()
}

fn default_gzip() -> bool {
    true
}

fn default_index() -> Vec<String> {
    vec!["index.html".to_string(), "index.htm".to_string()]
}

fn default_type_fallback() -> String {
    "application/octet-stream".to_string()
}

/// A single `locations` entry: a URL prefix mapped to a filesystem root.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    pub root: PathBuf,
}

/// Top-level JSON keys, shallow-merged into each server entry as defaults
/// (spec.md §6: "Top-level keys are shallow-merged into each server record
/// as defaults.").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawTopLevel {
    pub max_connections: Option<usize>,
    pub timeout: Option<u64>,
    pub default_type: Option<String>,
    pub charset: Option<String>,
    pub gzip: Option<bool>,
    pub index: Option<Vec<String>>,
    pub servers: Vec<RawServer>,
}

/// A single `servers[]` entry. Any field also present at the top level may
/// be omitted here to inherit the top-level default.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawServer {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub max_connections: Option<usize>,
    pub timeout: Option<u64>,
    pub default_type: Option<String>,
    pub charset: Option<String>,
    pub gzip: Option<bool>,
    pub index: Option<Vec<String>>,
    pub locations: HashMap<String, LocationConfig>,
    pub error_pages: HashMap<String, PathBuf>,
}

/// The fully-resolved, immutable-per-listener configuration record
/// (spec.md §3).
#[derive(Debug, Clone)]
pub struct Configuration {
    pub port: u16,
    pub host: String,
    pub max_connections: usize,
    pub timeout_secs: u64,
    pub default_type: String,
    pub charset: String,
    pub gzip: bool,
    pub index: Vec<String>,
    pub locations: HashMap<String, LocationConfig>,
    pub error_pages: HashMap<u16, PathBuf>,
}

impl Configuration {
    /// Merge one `servers[]` entry with the top-level defaults it didn't
    /// override.
    fn merge(top: &RawTopLevel, server: RawServer, index: usize) -> Result<Self, ConfigError> {
        let port = server.port.ok_or(ConfigError::MissingField { index, field: "port" })?;

        let mut error_pages = HashMap::with_capacity(server.error_pages.len());
        for (code, path) in server.error_pages {
            let code: u16 = code
                .parse()
                .map_err(|_| ConfigError::MissingField { index, field: "error_pages key" })?;
            error_pages.insert(code, path);
        }

        Ok(Self {
            port,
            host: server.host.unwrap_or_default(),
            max_connections: server
                .max_connections
                .or(top.max_connections)
                .unwrap_or_else(default_max_connections),
            timeout_secs: server.timeout.or(top.timeout).unwrap_or_else(default_timeout),
            default_type: server
                .default_type
                .or_else(|| top.default_type.clone())
                .unwrap_or_else(default_type_fallback),
            charset: server.charset.or_else(|| top.charset.clone()).unwrap_or_else(default_charset),
            gzip: server.gzip.or(top.gzip).unwrap_or_else(default_gzip),
            index: server.index.or_else(|| top.index.clone()).unwrap_or_else(default_index),
            locations: server.locations,
            error_pages,
        })
    }
}

/// Load a JSON config file and resolve it into one [`Configuration`] per
/// `servers[]` entry.
pub fn load(path: &Path) -> Result<Vec<Configuration>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    parse(&text, path)
}

fn parse(text: &str, path: &Path) -> Result<Vec<Configuration>, ConfigError> {
    let top: RawTopLevel =
        serde_json::from_str(text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

    let mut seen_ports = std::collections::HashSet::new();
    let mut resolved = Vec::with_capacity(top.servers.len());
    for (index, server) in top.servers.clone().into_iter().enumerate() {
        let config = Configuration::merge(&top, server, index)?;
        if !seen_ports.insert(config.port) {
            return Err(ConfigError::DuplicatePort { port: config.port });
        }
        resolved.push(config);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn merges_top_level_defaults_into_server() {
        let json = r#"{
            "max_connections": 128,
            "gzip": false,
            "servers": [
                { "port": 8080, "locations": { "/": { "root": "./content" } } }
            ]
        }"#;
        let configs = parse(json, Path::new("test.json")).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].max_connections, 128);
        assert!(!configs[0].gzip);
        assert_eq!(configs[0].timeout_secs, 15);
        assert_eq!(configs[0].index, vec!["index.html", "index.htm"]);
    }

    #[test]
    fn server_level_fields_override_top_level() {
        let json = r#"{
            "gzip": true,
            "servers": [
                { "port": 8080, "gzip": false, "locations": {} }
            ]
        }"#;
        let configs = parse(json, Path::new("test.json")).unwrap();
        assert!(!configs[0].gzip);
    }

    #[test]
    fn missing_port_is_an_error() {
        let json = r#"{ "servers": [ { "locations": {} } ] }"#;
        let err = parse(json, Path::new("test.json")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "port", .. }));
    }

    #[test]
    fn duplicate_ports_rejected() {
        let json = r#"{
            "servers": [
                { "port": 8080, "locations": {} },
                { "port": 8080, "locations": {} }
            ]
        }"#;
        let err = parse(json, Path::new("test.json")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePort { port: 8080 }));
    }

    #[test]
    fn error_pages_keys_parsed_as_status_codes() {
        let json = r#"{
            "servers": [
                { "port": 8080, "locations": {}, "error_pages": { "404": "/errors/404.html" } }
            ]
        }"#;
        let configs = parse(json, Path::new("test.json")).unwrap();
        assert_eq!(configs[0].error_pages.get(&404), Some(&PathBuf::from("/errors/404.html")));
    }
}
