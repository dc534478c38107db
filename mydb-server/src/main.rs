//! # mydb-server
//!
//! Binary entry point: loads configuration, opens the `Database` (cache
//! + typed store + TTL + HLL + AOF replay), and runs the blocking
//! accept loop.

use std::sync::Arc;

use mydb_common::Config;
use mydb_server::connection::Shared;
use mydb_server::server;
use mydb_store::Database;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "mydb.toml".to_string());
    let config = Config::load(&config_path).unwrap_or_else(|err| {
        tracing::warn!(path = %config_path, error = %err, "falling back to default configuration");
        Config::default()
    });

    let port = config.port;
    let db = Database::open(config.clone())?;
    let shared = Arc::new(Shared::new(&config, db));

    server::run(port, shared)?;
    Ok(())
}
