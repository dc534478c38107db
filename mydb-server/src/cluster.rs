//! # Cluster router (C9)
//!
//! Deterministic hash-based node selection over a static peer list,
//! grounded on `examples/original_source/include/cluster.h`'s `nodes_`/
//! `std::hash<string>` design. Every node in the cluster must be
//! configured with the identical `cluster_nodes` list and in the same
//! order, since the modulo result depends on both.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

/// Routes keys to one of a static list of cluster peers.
pub struct ClusterRouter {
    nodes: Vec<String>,
    local_node: Option<String>,
}

impl ClusterRouter {
    pub fn new(nodes: Vec<String>, local_node: Option<String>) -> Self {
        ClusterRouter { nodes, local_node }
    }

    pub fn is_enabled(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Returns the peer address responsible for `key`, or `None` when this
    /// node itself owns it (including when clustering is disabled).
    pub fn route(&self, key: &[u8]) -> Option<&str> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.nodes.len();
        let owner = &self.nodes[index];
        if Some(owner.as_str()) == self.local_node.as_deref() {
            None
        } else {
            Some(owner)
        }
    }

    /// Forwards `line` to `peer`, re-authenticating with `password` first
    /// when one is configured, and returns the peer's reply verbatim
    /// (a full RESP reply, not just its first line, since array replies
    /// span several lines).
    pub fn forward(&self, peer: &str, password: Option<&str>, line: &str) -> std::io::Result<String> {
        let mut stream = TcpStream::connect(peer)?;
        if let Some(password) = password {
            writeln!(stream, "AUTH {}", password)?;
            let mut reader = BufReader::new(stream.try_clone()?);
            read_resp_reply(&mut reader)?;
        }
        writeln!(stream, "{}", line)?;
        let mut reader = BufReader::new(stream);
        read_resp_reply(&mut reader)
    }
}

/// Reads one complete RESP reply from `reader`: a single line for
/// `+`/`-`/`:`, the length-prefixed payload for `$`, and every element
/// for `*` (each of which is itself a `$`-prefixed bulk per C7's
/// `resp_array`).
fn read_resp_reply(reader: &mut BufReader<TcpStream>) -> std::io::Result<String> {
    let mut first = String::new();
    reader.read_line(&mut first)?;

    match first.as_bytes().first() {
        Some(b'$') => {
            let len: i64 = first[1..].trim_end().parse().unwrap_or(-1);
            if len < 0 {
                return Ok(first);
            }
            let mut payload = vec![0u8; len as usize + 2];
            std::io::Read::read_exact(reader, &mut payload)?;
            first.push_str(&String::from_utf8_lossy(&payload));
            Ok(first)
        }
        Some(b'*') => {
            let count: i64 = first[1..].trim_end().parse().unwrap_or(-1);
            for _ in 0..count.max(0) {
                first.push_str(&read_resp_reply(reader)?);
            }
            Ok(first)
        }
        _ => Ok(first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_when_no_peers_configured() {
        let router = ClusterRouter::new(Vec::new(), None);
        assert!(!router.is_enabled());
        assert_eq!(router.route(b"any"), None);
    }

    #[test]
    fn routing_is_deterministic_for_the_same_key() {
        let nodes = vec!["10.0.0.1:6379".to_string(), "10.0.0.2:6379".to_string()];
        let router = ClusterRouter::new(nodes, Some("10.0.0.1:6379".to_string()));
        let first = router.route(b"user:1");
        let second = router.route(b"user:1");
        assert_eq!(first, second);
    }

    #[test]
    fn local_node_routes_to_none() {
        let nodes = vec!["10.0.0.1:6379".to_string()];
        let router = ClusterRouter::new(nodes, Some("10.0.0.1:6379".to_string()));
        assert_eq!(router.route(b"whatever"), None);
    }
}
