//! # Snapshot block cipher
//!
//! AES-256 in ECB mode with PKCS7 padding, matching
//! `examples/original_source/src/db.cpp`'s `encrypt_data`/`decrypt_data`
//! pair (itself built on `plusaes` in the original). This mode is
//! explicitly unauthenticated and key-reuse-unsafe; it is kept rather
//! than upgraded, since the snapshot format is meant as obfuscation,
//! not confidentiality.

use aes::Aes256;
use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use ecb::{Decryptor, Encryptor};

/// Built-in fallback key, used only when `MYDB_ENCRYPTION_KEY` is unset.
const DEFAULT_KEY: [u8; 32] = *b"mydb-default-snapshot-key-00000";

const ENV_VAR: &str = "MYDB_ENCRYPTION_KEY";

/// Resolves the active 32-byte AES-256 key from the environment, falling
/// back to the built-in default. Keys shorter than 32 bytes are zero
/// padded; longer keys are truncated, so any configured secret still
/// produces a usable key.
pub fn resolve_key() -> [u8; 32] {
    let mut key = DEFAULT_KEY;
    if let Ok(raw) = std::env::var(ENV_VAR) {
        let bytes = raw.into_bytes();
        let len = bytes.len().min(32);
        key[..len].copy_from_slice(&bytes[..len]);
        if len < 32 {
            key[len..].fill(0);
        }
    }
    key
}

pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    Encryptor::<Aes256>::new(key.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

pub fn decrypt(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
    Decryptor::<Aes256>::new(key.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecryptError::BadPadding)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecryptError {
    #[error("ciphertext has invalid padding or length")]
    BadPadding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_plaintext() {
        let key = DEFAULT_KEY;
        let plaintext = b"{\"data\":{},\"lists\":{},\"hlls\":{}}";
        let ciphertext = encrypt(&key, plaintext);
        let recovered = decrypt(&key, &ciphertext).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let key = DEFAULT_KEY;
        let ciphertext = encrypt(&key, b"");
        assert_eq!(decrypt(&key, &ciphertext).unwrap(), b"");
    }

    #[test]
    fn corrupted_ciphertext_fails_to_decrypt() {
        let key = DEFAULT_KEY;
        let mut ciphertext = encrypt(&key, b"hello world");
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(decrypt(&key, &ciphertext).is_err());
    }
}
