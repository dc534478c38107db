//! # Connection handler (C8)
//!
//! Per-connection auth state machine, command dispatch into
//! `mydb_store::Database`, pub/sub bookkeeping, and cluster-forward
//! decisions. Grounded on `hkv-server/src/server.rs`'s
//! `handle_connection`/`dispatch_command` shape and
//! `examples/original_source/src/enhanced_server.cpp`'s AUTH/NOAUTH
//! gating.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::{Duration, Instant};

use subtle::ConstantTimeEq;

use mydb_common::{Config, MydbError};
use mydb_store::Database;

use crate::cluster::ClusterRouter;
use crate::metrics::Metrics;
use crate::protocol::{parse_line, resp_array, resp_bulk, resp_error, resp_integer, resp_noauth, resp_null, resp_simple};
use crate::pubsub::PubSub;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Shared state every connection thread dispatches against.
pub struct Shared {
    pub db: Database,
    pub pubsub: PubSub,
    pub cluster: ClusterRouter,
    pub metrics: Metrics,
    pub password: Option<String>,
    pub cache_policy: mydb_common::CachePolicyName,
}

impl Shared {
    pub fn new(config: &Config, db: Database) -> Self {
        Shared {
            db,
            pubsub: PubSub::new(),
            cluster: ClusterRouter::new(config.cluster_nodes.clone(), config.local_node.clone()),
            metrics: Metrics::new(),
            password: config.password.clone(),
            cache_policy: config.cache_policy,
        }
    }

    fn auth_required(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    fn check_password(&self, candidate: &[u8]) -> bool {
        match self.password.as_deref() {
            None => true,
            Some(expected) if expected.is_empty() => true,
            Some(expected) => {
                let expected = expected.as_bytes();
                expected.len() == candidate.len() && bool::from(expected.ct_eq(candidate))
            }
        }
    }
}

/// Handles one accepted TCP client end to end: reads inline command
/// lines until EOF or QUIT, dispatches each, and writes the reply.
pub fn handle_connection(stream: TcpStream, shared: Arc<Shared>) -> std::io::Result<()> {
    let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    let mut authenticated = !shared.auth_required();

    stream.set_nodelay(true).ok();
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    let (push_tx, push_rx) = channel::<Vec<u8>>();

    let mut line = String::new();
    loop {
        // Drain any pub/sub messages queued while we were blocked reading.
        // Already formatted as a `*PUBLISH channel message` record by the broker.
        while let Ok(message) = push_rx.try_recv() {
            writer.write_all(&message)?;
        }

        line.clear();
        let bytes_read = match read_line_or_push(&mut reader, &mut line, &push_rx, &mut writer) {
            Some(result) => result?,
            None => break,
        };
        if bytes_read == 0 {
            break;
        }

        let request = match parse_line(line.trim_end_matches(['\r', '\n'])) {
            Some(request) => request,
            None => continue,
        };

        let started_at = Instant::now();
        shared.metrics.record_request_start();
        let verb = request.verb.as_str();

        if verb == "QUIT" {
            writer.write_all(&resp_simple("OK"))?;
            break;
        }

        if !authenticated {
            if verb == "AUTH" {
                let reply = handle_auth(&shared, &request.args, &mut authenticated);
                writer.write_all(&reply)?;
            } else {
                shared.metrics.record_error();
                writer.write_all(&resp_noauth())?;
            }
            shared.metrics.record_request_end(started_at.elapsed());
            continue;
        }

        if verb == "SUBSCRIBE" || verb == "UNSUBSCRIBE" {
            let reply = handle_subscription(&shared, verb, &request.args, conn_id, &push_tx);
            writer.write_all(&reply)?;
            shared.metrics.record_request_end(started_at.elapsed());
            continue;
        }

        if let Some(peer) = forward_target(&shared, verb, &request.args) {
            match shared.cluster.forward(&peer, shared.password.as_deref(), line.trim_end_matches(['\r', '\n'])) {
                Ok(reply) => writer.write_all(reply.as_bytes())?,
                Err(err) => {
                    shared.metrics.record_error();
                    writer.write_all(&resp_error(&format!("cluster forward failed: {err}")))?;
                }
            }
            shared.metrics.record_request_end(started_at.elapsed());
            continue;
        }

        let reply = dispatch(&shared, verb, &request.args);
        if reply.starts_with(b"-") {
            shared.metrics.record_error();
        }
        writer.write_all(&reply)?;
        shared.metrics.record_request_end(started_at.elapsed());
    }

    shared.pubsub.unsubscribe_all(conn_id);
    Ok(())
}

/// Blocks on the next inline line, but wakes periodically to flush any
/// pub/sub pushes queued on `push_rx` so a subscribed connection still
/// sees messages while idle between its own commands.
fn read_line_or_push(
    reader: &mut BufReader<TcpStream>,
    line: &mut String,
    push_rx: &std::sync::mpsc::Receiver<Vec<u8>>,
    writer: &mut TcpStream,
) -> Option<std::io::Result<usize>> {
    reader.get_ref().set_read_timeout(Some(Duration::from_millis(200))).ok();
    loop {
        match reader.read_line(line) {
            Ok(n) => return Some(Ok(n)),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock || err.kind() == std::io::ErrorKind::TimedOut => {
                if let Ok(message) = push_rx.try_recv() {
                    if writer.write_all(&message).is_err() {
                        return Some(Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "write failed")));
                    }
                }
                line.clear();
                continue;
            }
            Err(err) => return Some(Err(err)),
        }
    }
}

fn handle_auth(shared: &Shared, args: &[Vec<u8>], authenticated: &mut bool) -> Vec<u8> {
    if args.len() != 1 {
        return resp_error("wrong number of arguments for AUTH");
    }
    if shared.check_password(&args[0]) {
        *authenticated = true;
        resp_simple("OK")
    } else {
        resp_error("invalid password")
    }
}

fn handle_subscription(
    shared: &Shared,
    verb: &str,
    args: &[Vec<u8>],
    conn_id: u64,
    push_tx: &std::sync::mpsc::Sender<Vec<u8>>,
) -> Vec<u8> {
    if args.len() != 1 {
        return resp_error("wrong number of arguments for SUBSCRIBE/UNSUBSCRIBE");
    }
    let channel = String::from_utf8_lossy(&args[0]).into_owned();
    if verb == "SUBSCRIBE" {
        shared.pubsub.subscribe(&channel, conn_id, push_tx.clone());
        resp_simple(&format!("SUBSCRIBED {channel}"))
    } else {
        shared.pubsub.unsubscribe(&channel, conn_id);
        resp_simple(&format!("UNSUBSCRIBED {channel}"))
    }
}

/// Returns the peer to forward to, or `None` if this node should serve
/// the command itself. Only key-bearing commands are eligible.
fn forward_target(shared: &Shared, verb: &str, args: &[Vec<u8>]) -> Option<String> {
    if !shared.cluster.is_enabled() || args.is_empty() {
        return None;
    }
    const KEY_BEARING: &[&str] = &[
        "GET", "SET", "DEL", "EXISTS", "TYPE", "INCR", "DECR", "EXPIRE", "LPUSH", "RPUSH", "LPOP", "RPOP", "LLEN",
        "LRANGE", "SADD", "SREM", "SMEMBERS", "SCARD", "SISMEMBER", "HSET", "HGET", "HDEL", "HGETALL", "HKEYS",
        "HVALS", "HLL.ADD", "HLL.COUNT",
    ];
    if !KEY_BEARING.contains(&verb) {
        return None;
    }
    shared.cluster.route(&args[0]).map(str::to_owned)
}

fn dispatch(shared: &Shared, verb: &str, args: &[Vec<u8>]) -> Vec<u8> {
    match verb {
        "PING" => match args.len() {
            0 => resp_simple("PONG"),
            1 => resp_bulk(&args[0]),
            _ => resp_error("wrong number of arguments for PING"),
        },
        "SET" => with_args(args, 2, |a| {
            shared.db.set(&a[0], &a[1]);
            resp_simple("OK")
        }),
        "GET" => with_args(args, 1, |a| match shared.db.get(&a[0]) {
            Some(value) => resp_bulk(&value),
            None => resp_null(),
        }),
        "DEL" => {
            if args.is_empty() {
                return resp_error("wrong number of arguments for DEL");
            }
            resp_integer(shared.db.del(args))
        }
        "EXISTS" => {
            if args.is_empty() {
                return resp_error("wrong number of arguments for EXISTS");
            }
            resp_integer(shared.db.exists(args))
        }
        "TYPE" => with_args(args, 1, |a| resp_simple(shared.db.type_of(&a[0]))),
        "KEYS" => with_args(args, 1, |a| {
            let keys = shared.db.keys(&a[0]);
            resp_array(&keys)
        }),
        "INCR" => with_args(args, 1, |a| from_result(shared.db.incr(&a[0]).map(resp_integer))),
        "DECR" => with_args(args, 1, |a| from_result(shared.db.decr(&a[0]).map(resp_integer))),
        "LPUSH" => with_min_args(args, 2, |a| from_result(shared.db.lpush(&a[0], &a[1..]).map(resp_integer))),
        "RPUSH" => with_min_args(args, 2, |a| from_result(shared.db.rpush(&a[0], &a[1..]).map(resp_integer))),
        "LPOP" => with_args(args, 1, |a| {
            from_result(shared.db.lpop(&a[0]).map(|popped| popped.map_or_else(resp_null, |v| resp_bulk(&v))))
        }),
        "RPOP" => with_args(args, 1, |a| {
            from_result(shared.db.rpop(&a[0]).map(|popped| popped.map_or_else(resp_null, |v| resp_bulk(&v))))
        }),
        "LLEN" => with_args(args, 1, |a| from_result(shared.db.llen(&a[0]).map(resp_integer))),
        "LRANGE" => with_args(args, 3, |a| {
            let (start, stop) = match (parse_i64(&a[1]), parse_i64(&a[2])) {
                (Some(start), Some(stop)) => (start, stop),
                _ => return resp_error("invalid integer"),
            };
            from_result(shared.db.lrange(&a[0], start, stop).map(|items| resp_array(&items)))
        }),
        "SADD" => with_min_args(args, 2, |a| from_result(shared.db.sadd(&a[0], &a[1..]).map(resp_integer))),
        "SREM" => with_min_args(args, 2, |a| from_result(shared.db.srem(&a[0], &a[1..]).map(resp_integer))),
        "SMEMBERS" => with_args(args, 1, |a| from_result(shared.db.smembers(&a[0]).map(|items| resp_array(&items)))),
        "SCARD" => with_args(args, 1, |a| from_result(shared.db.scard(&a[0]).map(resp_integer))),
        "SISMEMBER" => with_args(args, 2, |a| {
            from_result(shared.db.sismember(&a[0], &a[1]).map(|is_member| resp_integer(is_member as i64)))
        }),
        "HSET" => with_args(args, 3, |a| {
            from_result(shared.db.hset(&a[0], &a[1], &a[2]).map(|was_new| resp_integer(was_new as i64)))
        }),
        "HGET" => with_args(args, 2, |a| {
            from_result(shared.db.hget(&a[0], &a[1]).map(|value| value.map_or_else(resp_null, |v| resp_bulk(&v))))
        }),
        "HDEL" => with_min_args(args, 2, |a| from_result(shared.db.hdel(&a[0], &a[1..]).map(resp_integer))),
        "HGETALL" => with_args(args, 1, |a| {
            from_result(shared.db.hgetall(&a[0]).map(|pairs| {
                let flat: Vec<Vec<u8>> = pairs.into_iter().flat_map(|(f, v)| [f, v]).collect();
                resp_array(&flat)
            }))
        }),
        "HKEYS" => with_args(args, 1, |a| from_result(shared.db.hkeys(&a[0]).map(|items| resp_array(&items)))),
        "HVALS" => with_args(args, 1, |a| from_result(shared.db.hvals(&a[0]).map(|items| resp_array(&items)))),
        "HLL.ADD" => with_args(args, 2, |a| {
            shared.db.hll_add(&a[0], &a[1]);
            resp_integer(1)
        }),
        "HLL.COUNT" => with_args(args, 1, |a| resp_integer(shared.db.hll_count(&a[0]))),
        "EXPIRE" => with_args(args, 2, |a| match parse_i64(&a[1]).filter(|&s| s >= 0) {
            Some(seconds) => resp_integer(shared.db.expire(&a[0], seconds as u64) as i64),
            None => resp_error("invalid expire time"),
        }),
        "SAVE" => from_result(shared.db.save().map(|()| resp_simple("OK"))),
        "LOAD" => from_result(shared.db.load().map(|()| resp_simple("OK"))),
        "FLUSHDB" => {
            shared.db.flushdb();
            resp_simple("OK")
        }
        "DBSIZE" => resp_integer(shared.db.dbsize()),
        "INFO" => resp_bulk(render_info(shared).as_bytes()),
        "PUBLISH" => with_args(args, 2, |a| {
            let channel = String::from_utf8_lossy(&a[0]);
            resp_integer(shared.pubsub.publish(&channel, &a[1]))
        }),
        _ => resp_error(&format!("unknown command '{verb}'")),
    }
}

fn with_args(args: &[Vec<u8>], expected: usize, handler: impl FnOnce(&[Vec<u8>]) -> Vec<u8>) -> Vec<u8> {
    if args.len() != expected {
        return resp_error("wrong number of arguments");
    }
    handler(args)
}

fn with_min_args(args: &[Vec<u8>], minimum: usize, handler: impl FnOnce(&[Vec<u8>]) -> Vec<u8>) -> Vec<u8> {
    if args.len() < minimum {
        return resp_error("wrong number of arguments");
    }
    handler(args)
}

fn from_result(result: Result<Vec<u8>, MydbError>) -> Vec<u8> {
    match result {
        Ok(reply) => reply,
        Err(MydbError::WrongType) => resp_error("WRONGTYPE operation against a key holding the wrong kind of value"),
        Err(MydbError::NotAnInteger) => resp_error("value is not a valid integer"),
        Err(err) => resp_error(&err.to_string()),
    }
}

fn parse_i64(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse::<i64>().ok()
}

fn render_info(shared: &Shared) -> String {
    let info = shared.db.info();
    let metrics = shared.metrics.snapshot();
    format!(
        "role:master\r\nengine:mydb\r\ndb_size:{}\r\ncache_hits:{}\r\ncache_misses:{}\r\nhit_ratio:{:.4}\r\nrequests_total:{}\r\nerrors_total:{}\r\ncache_policy:{}\r\n",
        info.db_size,
        info.cache_hits,
        info.cache_misses,
        info.hit_ratio,
        metrics.requests_total,
        metrics.errors_total,
        format!("{:?}", shared.cache_policy).to_uppercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_arity_is_rejected_without_calling_handler() {
        let reply = with_args(&[b"only-one".to_vec()], 2, |_| resp_simple("OK"));
        assert_eq!(reply, resp_error("wrong number of arguments"));
    }

    #[test]
    fn parse_i64_rejects_non_numeric() {
        assert_eq!(parse_i64(b"not-a-number"), None);
        assert_eq!(parse_i64(b"-12"), Some(-12));
    }
}
