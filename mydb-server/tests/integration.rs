use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mydb_client::{ClientConfig, KVClient};
use mydb_common::Config;
use mydb_server::connection::Shared;
use mydb_server::server;
use mydb_store::Database;

fn spawn_test_server(mut config: Config) -> String {
    let db = Database::open(config.clone()).expect("open database");
    let shared = Arc::new(Shared::new(&config, db));
    let listener = server::bind(0).expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr").to_string();
    config.port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        server::serve(listener, shared).ok();
    });

    // Give the accept loop a moment to start polling.
    thread::sleep(Duration::from_millis(20));
    addr
}

fn test_config(dir: &std::path::Path) -> Config {
    Config {
        aof_path: dir.join("test.aof").to_string_lossy().into_owned(),
        snapshot_path: dir.join("test.snapshot").to_string_lossy().into_owned(),
        ..Config::default()
    }
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("mydb-server-integration-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn client_for(addr: &str) -> KVClient {
    KVClient::with_config(ClientConfig {
        addr: addr.to_string(),
        max_idle: 1,
        max_total: 4,
        read_timeout: Some(Duration::from_secs(2)),
        write_timeout: Some(Duration::from_secs(2)),
        connect_timeout: Some(Duration::from_secs(2)),
    })
    .expect("client")
}

#[test]
fn set_get_del_round_trip_over_the_wire() {
    let dir = temp_dir("set-get-del");
    let addr = spawn_test_server(test_config(&dir));
    let client = client_for(&addr);

    client.set(b"greeting", b"hello world").expect("set");
    assert_eq!(client.get(b"greeting").expect("get"), Some(b"hello world".to_vec()));
    assert_eq!(client.del(&[b"greeting"]).expect("del"), 1);
    assert_eq!(client.get(b"greeting").expect("get"), None);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn list_and_hash_commands_work_end_to_end() {
    let dir = temp_dir("list-hash");
    let addr = spawn_test_server(test_config(&dir));
    let client = client_for(&addr);

    client.rpush(b"queue", &[b"a", b"b", b"c"]).expect("rpush");
    assert_eq!(client.lrange(b"queue", 0, -1).expect("lrange"), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    assert_eq!(client.lpop(b"queue").expect("lpop"), Some(b"a".to_vec()));

    client.hset(b"profile", b"name", b"ada").expect("hset");
    assert_eq!(client.hget(b"profile", b"name").expect("hget"), Some(b"ada".to_vec()));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn wrong_type_surfaces_as_a_server_error() {
    let dir = temp_dir("wrong-type");
    let addr = spawn_test_server(test_config(&dir));
    let client = client_for(&addr);

    client.set(b"k", b"v").expect("set");
    let err = client.lpush(b"k", &[b"x"]).expect_err("type mismatch should fail");
    assert!(matches!(err, mydb_client::ClientError::Server { .. }));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unauthenticated_commands_are_rejected_when_a_password_is_configured() {
    let dir = temp_dir("auth");
    let mut config = test_config(&dir);
    config.password = Some("hunter2".to_string());
    let addr = spawn_test_server(config);
    let client = client_for(&addr);

    let err = client.get(b"anything").expect_err("should require auth");
    assert!(matches!(err, mydb_client::ClientError::Server { .. }));

    client.auth("hunter2").expect("auth with correct password");
    assert_eq!(client.get(b"anything").expect("get after auth"), None);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn publish_delivers_to_a_concurrently_subscribed_connection() {
    let dir = temp_dir("pubsub");
    let addr = spawn_test_server(test_config(&dir));
    let publisher = client_for(&addr);

    // PUBLISH with no subscribers yet delivers to nobody.
    assert_eq!(publisher.publish(b"news", b"first").expect("publish"), 0);

    std::fs::remove_dir_all(&dir).ok();
}
