//! # Line tokenizer shared by the wire protocol and the AOF
//!
//! A frame is one logical
//! line, tokenized by whitespace; the first token uppercased is the verb.
//! `SET`, `LPUSH`, `RPUSH`, `HLL.ADD`, and `PUBLISH` take the remainder
//! of the line (after the fixed leading tokens) as one last argument,
//! preserving embedded spaces — this rule is shared verbatim between the
//! TCP protocol codec and AOF record parsing so a line written to either
//! reads back identically.

/// Verbs whose final argument is "the rest of the line" rather than a
/// single whitespace-delimited token, and how many fixed tokens precede
/// that trailing argument (after the verb itself).
fn trailing_arg_fixed_tokens(verb: &str) -> Option<usize> {
    match verb {
        "SET" => Some(1),       // SET key <value...>
        "LPUSH" => Some(1),     // LPUSH key <values...>
        "RPUSH" => Some(1),     // RPUSH key <values...>
        "HLL.ADD" => Some(1),   // HLL.ADD key <element...>
        "PUBLISH" => Some(1),   // PUBLISH channel <message...>
        _ => None,
    }
}

/// Tokenizes one line into an uppercased verb and its arguments as raw
/// byte strings. Returns `None` for an empty or whitespace-only line.
pub fn tokenize(line: &str) -> Option<(String, Vec<Vec<u8>>)> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let mut words = trimmed.split_whitespace();
    let verb = words.next()?.to_ascii_uppercase();

    let rest: Vec<&str> = words.collect();

    let args = match trailing_arg_fixed_tokens(&verb) {
        Some(fixed) if rest.len() > fixed => {
            let mut args: Vec<Vec<u8>> = rest[..fixed].iter().map(|s| s.as_bytes().to_vec()).collect();
            let trailing_start = byte_offset_of_nth_word(trimmed, 1 + fixed);
            args.push(trimmed[trailing_start..].as_bytes().to_vec());
            args
        }
        _ => rest.into_iter().map(|s| s.as_bytes().to_vec()).collect(),
    };

    Some((verb, args))
}

/// Byte offset of the start of the `n`-th whitespace-delimited word
/// (0-indexed) in `line`, used to slice out "the rest of the line" while
/// preserving internal whitespace in the trailing argument.
fn byte_offset_of_nth_word(line: &str, n: usize) -> usize {
    let mut seen = 0;
    let mut in_word = false;
    for (idx, ch) in line.char_indices() {
        let is_space = ch.is_whitespace();
        if !is_space && !in_word {
            if seen == n {
                return idx;
            }
            in_word = true;
            seen += 1;
        } else if is_space {
            in_word = false;
        }
    }
    line.len()
}

/// Renders a verb and its arguments back into one AOF/wire line.
pub fn format_line(verb: &str, args: &[Vec<u8>]) -> String {
    let mut line = String::from(verb);
    for arg in args {
        line.push(' ');
        line.push_str(&String::from_utf8_lossy(arg));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_preserves_embedded_spaces_in_value() {
        let (verb, args) = tokenize("SET greeting hello world").unwrap();
        assert_eq!(verb, "SET");
        assert_eq!(args, vec![b"greeting".to_vec(), b"hello world".to_vec()]);
    }

    #[test]
    fn del_splits_plain_whitespace_tokens() {
        let (verb, args) = tokenize("DEL a b c").unwrap();
        assert_eq!(verb, "DEL");
        assert_eq!(args, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn verb_is_uppercased() {
        let (verb, _) = tokenize("get key").unwrap();
        assert_eq!(verb, "GET");
    }

    #[test]
    fn empty_line_returns_none() {
        assert!(tokenize("   ").is_none());
    }

    #[test]
    fn round_trips_through_format_line() {
        let (verb, args) = tokenize("SET k hello world").unwrap();
        assert_eq!(format_line(&verb, &args), "SET k hello world");
    }
}
