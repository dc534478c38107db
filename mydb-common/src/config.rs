//! # Configuration
//!
//! `Config` mirrors exactly the recognized wire-level options:
//! `port`, `cache_size`, `cache_policy`, `api_key`,
//! `password`, `cluster_nodes`, `cert_path`, `key_path`, plus the
//! ambient fields a runnable binary needs (AOF path, snapshot path, HLL
//! precision). `cert_path`/`key_path` are accepted and carried so the
//! shape matches what an external TLS-termination collaborator would
//! consume, but nothing in this crate reads them to start TLS.

use serde::Deserialize;

/// Eviction policy selector, matching the wire value of `cache_policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CachePolicyName {
    Lru,
    Lfu,
    Arc,
    /// Historical alias for `Lru` kept for compatibility with the original
    /// reference implementation's "enhanced" cache option.
    Enhanced,
}

impl Default for CachePolicyName {
    fn default() -> Self {
        CachePolicyName::Lru
    }
}

/// Top-level configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// TCP listen port for the accept loop.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum resident-set size for the selected cache policy.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Eviction policy: "LRU" | "LFU" | "ARC" | "ENHANCED".
    #[serde(default)]
    pub cache_policy: CachePolicyName,

    /// Opaque API key, exposed for external collaborators; never
    /// consumed by the core dispatch path itself.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Shared password. `None`/empty means AUTH is not required.
    #[serde(default)]
    pub password: Option<String>,

    /// Static cluster map of `host:port` peers, in the router's stable
    /// iteration order used for hash-modulo node selection.
    #[serde(default)]
    pub cluster_nodes: Vec<String>,

    /// This node's own `host:port`, used to decide local-vs-forward.
    #[serde(default)]
    pub local_node: Option<String>,

    /// Accepted but unused: an external collaborator's TLS certificate path.
    #[serde(default)]
    pub cert_path: Option<String>,

    /// Accepted but unused: an external collaborator's TLS key path.
    #[serde(default)]
    pub key_path: Option<String>,

    /// Append-only log path.
    #[serde(default = "default_aof_path")]
    pub aof_path: String,

    /// Primary snapshot file path.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// HyperLogLog register precision (`p`); `m = 2^p` registers.
    #[serde(default = "default_hll_precision")]
    pub hll_precision: u8,
}

fn default_port() -> u16 {
    6379
}

fn default_cache_size() -> usize {
    10_000
}

fn default_aof_path() -> String {
    "db.aof".to_string()
}

fn default_snapshot_path() -> String {
    "db.snapshot".to_string()
}

fn default_hll_precision() -> u8 {
    14
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: default_port(),
            cache_size: default_cache_size(),
            cache_policy: CachePolicyName::default(),
            api_key: None,
            password: None,
            cluster_nodes: Vec::new(),
            local_node: None,
            cert_path: None,
            key_path: None,
            aof_path: default_aof_path(),
            snapshot_path: default_snapshot_path(),
            hll_precision: default_hll_precision(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file on disk.
    pub fn load(path: &str) -> std::io::Result<Config> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    /// Returns whether AUTH is required for new connections.
    pub fn auth_required(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.port, 6379);
        assert_eq!(config.cache_size, 10_000);
        assert_eq!(config.cache_policy, CachePolicyName::Lru);
        assert!(!config.auth_required());
    }

    #[test]
    fn parses_minimal_toml() {
        let toml_text = r#"
            port = 7000
            cache_size = 128
            cache_policy = "ARC"
            password = "hunter2"
            cluster_nodes = ["127.0.0.1:7001", "127.0.0.1:7002"]
        "#;
        let config: Config = toml::from_str(toml_text).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.cache_policy, CachePolicyName::Arc);
        assert!(config.auth_required());
        assert_eq!(config.cluster_nodes.len(), 2);
    }
}
