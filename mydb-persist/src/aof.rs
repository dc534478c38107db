//! # Append-only log
//!
//! Grounded on `examples/original_source/src/db.cpp`'s `AOFLogger`:
//! append one text record per mutating command, replay every record on
//! open by invoking a caller-supplied apply function, then truncate.
//! EXPIRE is never logged, so replayed state
//! loses TTL deadlines that were set but not re-persisted by SAVE.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use mydb_common::line_protocol::{format_line, tokenize};
use mydb_common::MydbResult;

/// One decoded AOF line: an uppercased verb and its raw byte arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AofRecord {
    pub verb: String,
    pub args: Vec<Vec<u8>>,
}

/// Verbs that mutate state and are therefore loggable.
const LOGGED_VERBS: &[&str] = &[
    "SET", "DEL", "LPUSH", "RPUSH", "LPOP", "RPOP", "HLL.ADD", "INCR", "DECR", "SADD", "SREM",
    "HSET", "HDEL", "FLUSHDB",
];

pub fn is_loggable(verb: &str) -> bool {
    LOGGED_VERBS.contains(&verb)
}

/// Owns the on-disk AOF file handle; append-only for the process lifetime
/// after the initial replay-then-truncate step.
pub struct AofWriter {
    path: PathBuf,
    file: File,
}

impl AofWriter {
    /// Opens (creating if absent) the AOF at `path`, replays every
    /// well-formed record through `apply`, then truncates the file so
    /// future appends start from empty. Malformed lines are skipped
    /// rather than aborting replay.
    pub fn open<F>(path: impl AsRef<Path>, mut apply: F) -> MydbResult<Self>
    where
        F: FnMut(&AofRecord),
    {
        let path = path.as_ref().to_path_buf();
        let existing = OpenOptions::new().read(true).open(&path);

        if let Ok(file) = existing {
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => continue,
                };
                if let Some((verb, args)) = tokenize(&line) {
                    if is_loggable(&verb) {
                        apply(&AofRecord { verb, args });
                    }
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        Ok(AofWriter { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record, flushing so a crash after this call cannot
    /// lose the write in process-local buffers (the mutex that guards
    /// the caller's mutation also serializes this append).
    pub fn append(&mut self, verb: &str, args: &[Vec<u8>]) -> MydbResult<()> {
        if !is_loggable(verb) {
            return Ok(());
        }
        let line = format_line(verb, args);
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        Ok(())
    }

    /// Discards all logged records, used by FLUSHDB-adjacent resets and
    /// after a successful SAVE makes replay unnecessary. Resets the
    /// write cursor back to the start along with the length — otherwise
    /// the next `append` would write at the old offset, leaving a
    /// zero-filled hole in front of the record that the next replay
    /// can't tokenize.
    pub fn truncate(&mut self) -> MydbResult<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn replays_logged_records_and_truncates() {
        let dir = std::env::temp_dir().join(format!("mydb-aof-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("replay.aof");
        std::fs::write(&path, "SET a 1\nDEL a\nNOTACOMMAND\nFLUSHDB\n").unwrap();

        let mut replayed = Vec::new();
        let writer = AofWriter::open(&path, |record| replayed.push(record.clone()));
        let mut writer = writer.unwrap();

        assert_eq!(replayed.len(), 3);
        assert_eq!(replayed[0].verb, "SET");
        assert_eq!(replayed[1].verb, "DEL");
        assert_eq!(replayed[2].verb, "FLUSHDB");

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.is_empty());

        writer.append("SET", &[b"k".to_vec(), b"v".to_vec()]).unwrap();
        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "SET k v\n");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn expire_is_not_loggable() {
        assert!(!is_loggable("EXPIRE"));
        assert!(is_loggable("SET"));
    }

    #[test]
    fn truncate_mid_process_resets_the_write_cursor() {
        let dir = std::env::temp_dir().join(format!("mydb-aof-truncate-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("truncate.aof");

        let mut writer = AofWriter::open(&path, |_| {}).unwrap();
        writer.append("SET", &[b"a".to_vec(), b"1".to_vec()]).unwrap();
        writer.append("SET", &[b"b".to_vec(), b"2".to_vec()]).unwrap();
        writer.truncate().unwrap();
        writer.append("SET", &[b"c".to_vec(), b"3".to_vec()]).unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "SET c 3\n");

        std::fs::remove_dir_all(&dir).ok();
    }
}
