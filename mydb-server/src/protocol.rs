//! # Protocol codec (C7)
//!
//! Grounded on `hkv-server/src/server.rs`'s `resp_simple`/`resp_error`/
//! `resp_integer`/`resp_bulk`/`resp_null` builders and
//! `examples/original_source/include/protocol.h`'s line-oriented
//! `CommandParser`/`ResponseFormatter` pair: one
//! logical CRLF-terminated line, whitespace-tokenized, first token
//! uppercased is the verb; `SET`/`LPUSH`/`RPUSH`/`HLL.ADD`/`PUBLISH`
//! consume the remainder of the line as one trailing argument.

use mydb_common::line_protocol::tokenize;

/// A parsed request: an uppercased verb and its raw byte arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub verb: String,
    pub args: Vec<Vec<u8>>,
}

/// Parses one line into a `Request`. A blank line yields `None`, matched
/// against silently by the caller (no reply, keep reading).
pub fn parse_line(line: &str) -> Option<Request> {
    let (verb, args) = tokenize(line)?;
    Some(Request { verb, args })
}

pub fn resp_simple(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 3);
    buf.push(b'+');
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

pub fn resp_error(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 6);
    buf.extend_from_slice(b"-ERR ");
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

pub fn resp_noauth() -> Vec<u8> {
    b"-NOAUTH Authentication required\r\n".to_vec()
}

pub fn resp_integer(value: i64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(b':');
    buf.extend_from_slice(value.to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

pub fn resp_bulk(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 16);
    buf.push(b'$');
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
    buf
}

pub fn resp_null() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

pub fn resp_array(items: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(b'*');
    buf.extend_from_slice(items.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    for item in items {
        buf.extend_from_slice(&resp_bulk(item));
    }
    buf
}

pub fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_with_embedded_spaces() {
        let req = parse_line("SET greeting hello world").unwrap();
        assert_eq!(req.verb, "SET");
        assert_eq!(req.args, vec![b"greeting".to_vec(), b"hello world".to_vec()]);
    }

    #[test]
    fn blank_line_parses_to_none() {
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn builds_nil_bulk() {
        assert_eq!(resp_null(), b"$-1\r\n".to_vec());
    }

    #[test]
    fn builds_array_of_bulks() {
        let out = resp_array(&[b"a".to_vec(), b"bb".to_vec()]);
        assert_eq!(out, b"*2\r\n$1\r\na\r\n$2\r\nbb\r\n".to_vec());
    }
}
