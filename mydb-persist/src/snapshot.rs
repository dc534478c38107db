//! # Snapshot codec
//!
//! Grounded on `examples/original_source/src/db.cpp`'s `save`/`load`
//! triplet (three near-identical copies in the original; unified here
//! into one codec shared by every caller). A JSON
//! document with `data`/`lists`/`hlls` sections, where `data` values are
//! individually encrypted before the whole document is encrypted a
//! second time. The original embeds raw ciphertext bytes directly in a
//! JSON string field, which is not valid UTF-8 in general; this rewrite
//! base64-encodes the inner ciphertext instead so the intermediate
//! document is always well-formed JSON — documented as an open-question
//! resolution in DESIGN.md, not a behavior change to the outer format.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::cipher::{self, DecryptError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDocument {
    #[serde(default)]
    pub data: HashMap<String, String>,
    #[serde(default)]
    pub lists: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub hlls: HashMap<String, Vec<u8>>,
}

impl SnapshotDocument {
    pub fn new() -> Self {
        SnapshotDocument::default()
    }

    /// Encrypts `plaintext_value` and stores the base64 ciphertext under
    /// `key` in the `data` section.
    pub fn put_string(&mut self, key: String, plaintext_value: &[u8], encryption_key: &[u8; 32]) {
        let ciphertext = cipher::encrypt(encryption_key, plaintext_value);
        self.data.insert(key, BASE64.encode(ciphertext));
    }

    /// Decrypts every entry in `data` back to plaintext bytes.
    pub fn decrypt_strings(&self, encryption_key: &[u8; 32]) -> Result<HashMap<String, Vec<u8>>, SnapshotError> {
        let mut out = HashMap::with_capacity(self.data.len());
        for (key, encoded) in &self.data {
            let ciphertext = BASE64
                .decode(encoded)
                .map_err(|_| SnapshotError::Decrypt(DecryptError::BadPadding))?;
            let plaintext = cipher::decrypt(encryption_key, &ciphertext)?;
            out.insert(key.clone(), plaintext);
        }
        Ok(out)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot decrypt failed: {0}")]
    Decrypt(#[from] DecryptError),
}

/// Serializes, double-encrypts, and writes `document` to `primary_path`,
/// then writes the identical ciphertext to a timestamped backup file
/// named `<primary>.backup_YYYYMMDD_HHMMSS`. Returns the backup path.
pub fn save(
    primary_path: impl AsRef<Path>,
    document: &SnapshotDocument,
    encryption_key: &[u8; 32],
) -> Result<PathBuf, SnapshotError> {
    let primary_path = primary_path.as_ref();
    let json = serde_json::to_vec(document)?;
    let ciphertext = cipher::encrypt(encryption_key, &json);

    fs::write(primary_path, &ciphertext)?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup_path = PathBuf::from(format!("{}.backup_{}", primary_path.display(), stamp));
    fs::write(&backup_path, &ciphertext)?;

    Ok(backup_path)
}

/// Reads and decrypts `primary_path`, returning the parsed document. A
/// decrypt or parse failure leaves no state mutated by the caller — this
/// function performs no side effects beyond the read.
pub fn load(primary_path: impl AsRef<Path>, encryption_key: &[u8; 32]) -> Result<SnapshotDocument, SnapshotError> {
    let ciphertext = fs::read(primary_path)?;
    let json = cipher::decrypt(encryption_key, &ciphertext)?;
    let document: SnapshotDocument = serde_json::from_slice(&json)?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips_every_section() {
        let dir = std::env::temp_dir().join(format!("mydb-snapshot-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("db.snapshot");
        let key = cipher::resolve_key();

        let mut doc = SnapshotDocument::new();
        doc.put_string("greeting".to_string(), b"hello", &key);
        doc.lists.insert("mylist".to_string(), vec!["a".into(), "b".into()]);
        doc.hlls.insert("myhll".to_string(), vec![0, 3, 5, 0]);

        let backup = save(&path, &doc, &key).unwrap();
        assert!(backup.to_string_lossy().contains(".backup_"));

        let loaded = load(&path, &key).unwrap();
        let strings = loaded.decrypt_strings(&key).unwrap();
        assert_eq!(strings.get("greeting"), Some(&b"hello".to_vec()));
        assert_eq!(loaded.lists.get("mylist"), Some(&vec!["a".to_string(), "b".to_string()]));
        assert_eq!(loaded.hlls.get("myhll"), Some(&vec![0, 3, 5, 0]));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupted_primary_file_fails_to_load() {
        let dir = std::env::temp_dir().join(format!("mydb-snapshot-corrupt-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("db.snapshot");
        std::fs::write(&path, b"not a valid ciphertext").unwrap();

        let key = cipher::resolve_key();
        assert!(load(&path, &key).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
