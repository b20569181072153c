use crate::engine::EngineError;
use crate::limits::*;
use crate::model::CatalogEntry;

/// Suffix marking a catalog entry as not reservable, e.g. `101:fixed`.
const FIXED_SUFFIX: &str = ":fixed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    /// Default catalog for requests that don't bring their own.
    pub catalog: Vec<CatalogEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 7878,
            max_connections: 256,
            metrics_port: None,
            catalog: Vec::new(),
        }
    }
}

impl Config {
    /// Read `PARKFIT_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let defaults = Self::default();
        let catalog = match lookup("PARKFIT_CATALOG") {
            Some(raw) => parse_catalog(&raw)?,
            None => defaults.catalog,
        };
        Ok(Self {
            bind: lookup("PARKFIT_BIND").unwrap_or(defaults.bind),
            port: lookup("PARKFIT_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            max_connections: lookup("PARKFIT_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            metrics_port: lookup("PARKFIT_METRICS_PORT").and_then(|s| s.parse().ok()),
            catalog,
        })
    }
}

/// Parse `101:fixed,102,103` into catalog entries, order kept.
pub fn parse_catalog(raw: &str) -> Result<Vec<CatalogEntry>, EngineError> {
    let mut catalog = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let entry = match item.strip_suffix(FIXED_SUFFIX) {
            Some(name) => CatalogEntry::fixed(name.trim()),
            None => CatalogEntry::reservable(item),
        };
        if entry.name.is_empty() || entry.name.contains(':') {
            return Err(EngineError::MalformedInput(format!("bad catalog entry {item:?}")));
        }
        if catalog.iter().any(|c: &CatalogEntry| c.name == entry.name) {
            return Err(EngineError::DuplicateResource(entry.name));
        }
        catalog.push(entry);
    }
    if catalog.len() > MAX_RESOURCES {
        return Err(EngineError::LimitExceeded("too many resources"));
    }
    Ok(catalog)
}
