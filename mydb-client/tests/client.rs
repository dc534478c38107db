use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use mydb_client::{ClientConfig, ClientError, KVClient};

fn spawn_server(expected_commands: usize, handler: fn(usize, Vec<Vec<u8>>, &mut TcpStream)) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        let mut stream = stream;
        for idx in 0..expected_commands {
            let args = read_command(&mut reader).expect("read command");
            handler(idx, args, &mut stream);
        }
    });

    addr
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<Vec<u8>>> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line)?;
    if bytes == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    }
    Ok(line
        .trim_end_matches(['\r', '\n'])
        .split_whitespace()
        .map(|word| word.as_bytes().to_vec())
        .collect())
}

fn write_simple(stream: &mut TcpStream, msg: &str) {
    let _ = stream.write_all(b"+");
    let _ = stream.write_all(msg.as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

fn write_bulk(stream: &mut TcpStream, data: &[u8]) {
    let _ = stream.write_all(b"$");
    let _ = stream.write_all(data.len().to_string().as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.write_all(data);
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

fn write_integer(stream: &mut TcpStream, value: i64) {
    let _ = stream.write_all(b":");
    let _ = stream.write_all(value.to_string().as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

fn client_with_addr(addr: String) -> KVClient {
    let config = ClientConfig {
        addr,
        max_idle: 1,
        max_total: 1,
        read_timeout: Some(Duration::from_secs(1)),
        write_timeout: Some(Duration::from_secs(1)),
        connect_timeout: Some(Duration::from_secs(1)),
    };
    KVClient::with_config(config).expect("client")
}

#[test]
fn client_set_get_roundtrip() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args[0], b"SET");
            assert_eq!(args[1], b"key");
            assert_eq!(args[2], b"value");
            write_simple(stream, "OK");
        } else {
            assert_eq!(args[0], b"GET");
            assert_eq!(args[1], b"key");
            write_bulk(stream, b"value");
        }
    });

    let client = client_with_addr(addr);
    client.set(b"key", b"value").expect("set");
    let value = client.get(b"key").expect("get");
    assert_eq!(value, Some(b"value".to_vec()));
}

#[test]
fn client_expire_and_delete() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args[0], b"EXPIRE");
            assert_eq!(args[1], b"key");
            assert_eq!(args[2], b"5");
            write_integer(stream, 1);
        } else {
            assert_eq!(args[0], b"DEL");
            assert_eq!(args[1], b"key");
            write_integer(stream, 1);
        }
    });

    let client = client_with_addr(addr);
    let set = client.expire(b"key", Duration::from_secs(5)).expect("expire");
    assert!(set);
    let removed = client.del(&[b"key"]).expect("del");
    assert_eq!(removed, 1);
}

#[test]
fn client_list_roundtrip() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args[0], b"RPUSH");
            assert_eq!(args[1], b"mylist");
            assert_eq!(args[2], b"a");
            assert_eq!(args[3], b"b");
            write_integer(stream, 2);
        } else {
            assert_eq!(args[0], b"LRANGE");
            assert_eq!(args[1], b"mylist");
            assert_eq!(args[2], b"0");
            assert_eq!(args[3], b"-1");
            let _ = stream.write_all(b"*2\r\n$1\r\na\r\n$1\r\nb\r\n");
            let _ = stream.flush();
        }
    });

    let client = client_with_addr(addr);
    let len = client.rpush(b"mylist", &[b"a", b"b"]).expect("rpush");
    assert_eq!(len, 2);
    let items = client.lrange(b"mylist", 0, -1).expect("lrange");
    assert_eq!(items, vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn client_surfaces_server_errors() {
    let addr = spawn_server(1, |_, args, stream| {
        assert_eq!(args[0], b"INCR");
        let _ = stream.write_all(b"-ERR value is not a valid integer\r\n");
        let _ = stream.flush();
    });

    let client = client_with_addr(addr);
    let err = client.incr(b"key").expect_err("should fail");
    assert!(matches!(err, ClientError::Server { .. }));
}
