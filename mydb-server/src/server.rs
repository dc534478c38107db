//! # TCP server
//!
//! Blocking, thread-per-connection accept loop, matching `mydb-client`'s
//! own synchronous style. A single coarse mutex is held across each
//! command including its AOF append, so the server is a blocking model
//! rather than a cooperatively-scheduled one.

use std::net::TcpListener;
use std::sync::Arc;

use crate::connection::{handle_connection, Shared};

/// Binds `0.0.0.0:{port}`. Split out from `serve` so tests can bind
/// port 0 and discover the assigned ephemeral port before serving.
pub fn bind(port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", port))
}

/// Accepts connections from `listener` and spawns one thread per
/// connection until the listener itself errors out.
pub fn serve(listener: TcpListener, shared: Arc<Shared>) -> std::io::Result<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), "listening");

    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept connection");
                continue;
            }
        };
        let peer = stream.peer_addr().ok();
        let shared = Arc::clone(&shared);
        std::thread::spawn(move || {
            if let Err(err) = handle_connection(stream, shared) {
                tracing::debug!(?peer, error = %err, "connection closed with error");
            }
        });
    }

    Ok(())
}

/// Binds `0.0.0.0:{port}` and serves forever. The binary entry point's
/// top-level call.
pub fn run(port: u16, shared: Arc<Shared>) -> std::io::Result<()> {
    serve(bind(port)?, shared)
}
