//! # mydb-bench
//!
//! A small, single-connection throughput probe for a running
//! `mydb-server`: fires a configurable number of SET/GET pairs back to
//! back over one pooled connection and reports ops/sec and mean
//! latency. Not a substitute for a proper load-testing harness — it
//! exists to give a quick sanity read on a local build.

use std::time::{Duration, Instant};

use mydb_client::{ClientConfig, KVClient};

fn main() {
    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:6379".to_string());
    let iterations: usize = std::env::args().nth(2).and_then(|s| s.parse().ok()).unwrap_or(10_000);

    let client = KVClient::with_config(ClientConfig {
        addr: addr.clone(),
        max_idle: 1,
        max_total: 1,
        ..ClientConfig::default()
    })
    .expect("connect");

    println!("benchmarking {addr} with {iterations} SET/GET pairs");

    let started_at = Instant::now();
    for i in 0..iterations {
        let key = format!("bench:{i}");
        client.set(key.as_bytes(), b"payload").expect("set");
        client.get(key.as_bytes()).expect("get");
    }
    let elapsed = started_at.elapsed();

    report(iterations, elapsed);
}

fn report(iterations: usize, elapsed: Duration) {
    let ops = iterations * 2;
    let ops_per_sec = ops as f64 / elapsed.as_secs_f64();
    let mean_latency_us = elapsed.as_micros() as f64 / ops as f64;
    println!("{ops} operations in {elapsed:?} ({ops_per_sec:.0} ops/sec, {mean_latency_us:.1} us/op mean)");
}
