use mirror_storage::DbConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variables prefixed with this override file settings, nested
/// keys separated by double underscores (`MIRROR_ROSETTA_DB__HOST`).
const ENV_PREFIX: &str = "MIRROR_ROSETTA_";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RosettaConfig {
    /// Online mode serves the full endpoint set; offline serves only
    /// network list/options, construction and health.
    pub online: bool,

    /// Listening port
    pub port: u16,

    /// Network name advertised in the network identifier
    pub network: String,

    /// Ledger node version reported at /network/options
    pub node_version: String,

    /// Deployment namespace, used to derive system entities
    pub shard: i64,
    pub realm: i64,

    /// PostgreSQL connectivity
    pub db: DbConfig,

    /// Static service-endpoint → node-account map; overrides the database
    /// address book when non-empty
    pub nodes: BTreeMap<String, String>,

    pub cache: CacheConfig,
    pub response: ResponseConfig,
    pub http: HttpConfig,

    /// Graceful shutdown budget in seconds
    pub shutdown_timeout: u64,

    pub feature: FeatureConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub entity: EntityCacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntityCacheConfig {
    /// Alias LRU capacity
    pub max_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Transactions beyond this count are returned as hash-only identifiers
    pub max_transactions_in_block: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// All values in seconds
    pub idle_timeout: u64,
    pub read_timeout: u64,
    pub read_header_timeout: u64,
    pub write_timeout: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FeatureConfig {
    /// Emit a "shard S realm R" sub-network identifier
    pub sub_network_identifier: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for RosettaConfig {
    fn default() -> Self {
        Self {
            online: true,
            port: 5700,
            network: "demo".to_string(),
            node_version: "unknown".to_string(),
            shard: 0,
            realm: 0,
            db: DbConfig::default(),
            nodes: BTreeMap::new(),
            cache: CacheConfig::default(),
            response: ResponseConfig::default(),
            http: HttpConfig::default(),
            shutdown_timeout: 10,
            feature: FeatureConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entity: EntityCacheConfig::default(),
        }
    }
}

impl Default for EntityCacheConfig {
    fn default() -> Self {
        Self { max_size: 524_288 }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            max_transactions_in_block: 100,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            idle_timeout: 10,
            read_timeout: 5,
            read_header_timeout: 3,
            write_timeout: 10,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RosettaConfig {
    /// Load the file (when present), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut value = match path {
            Some(path) => std::fs::read_to_string(path)?.parse::<toml::Value>()?,
            None => toml::Value::Table(toml::map::Map::new()),
        };

        apply_env_overrides(&mut value, std::env::vars());
        Ok(value.try_into()?)
    }
}

/// Merge `MIRROR_ROSETTA_*` variables into the config tree. Nested keys use
/// double underscores; values parse as TOML scalars, falling back to strings.
fn apply_env_overrides(value: &mut toml::Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, raw) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        let segments: Vec<String> = path.split("__").map(|s| s.to_lowercase()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            continue;
        }

        let mut node = &mut *value;
        for segment in &segments[..segments.len() - 1] {
            let table = match node {
                toml::Value::Table(table) => table,
                _ => continue,
            };
            node = table
                .entry(segment.clone())
                .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        }

        if let toml::Value::Table(table) = node {
            table.insert(segments[segments.len() - 1].clone(), parse_scalar(&raw));
        }
    }
}

/// Parse an environment value as a TOML scalar, falling back to a string.
fn parse_scalar(raw: &str) -> toml::Value {
    format!("v = {raw}")
        .parse::<toml::Value>()
        .ok()
        .and_then(|value| value.get("v").cloned())
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
