//! Local encrypted cache file handling: naming, most-recent-wins selection,
//! and cleanup of superseded cache files.

use std::path::{Path, PathBuf};

use chacha20poly1305::aead::rand_core::RngCore;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};

use crate::error::LookupError;

const NONCE_LEN: usize = 12;

/// `emis_lookup_<12hexhash>.enc`, hashed from a source key identifying the
/// data this cache file represents (e.g. the remote URL or the content
/// hash of the extract it was built from).
pub fn cache_file_name(source_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_key.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("emis_lookup_{}.enc", &digest[..12])
}

fn is_cache_file(name: &str) -> bool {
    name.starts_with("emis_lookup_") && name.ends_with(".enc")
}

/// The most recently modified cache file in `dir`, if any. Most recent file
/// wins on load.
pub fn most_recent_cache_file(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(is_cache_file)
        })
        .max_by_key(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        })
        .map(|entry| entry.path())
}

/// Removes every cache file in `dir` except `keep`. Stale files for a
/// superseded hash are removed.
pub fn cleanup_old_cache_files(dir: &Path, keep: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_cache = entry
            .file_name()
            .to_str()
            .is_some_and(is_cache_file);
        if is_cache && path != keep {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Encrypts `plaintext` with ChaCha20-Poly1305, prefixing a random nonce.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, LookupError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let mut ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| LookupError::DecryptionFailed {
            path: String::new(),
        })?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.append(&mut ciphertext);
    Ok(out)
}

/// Decrypts bytes previously produced by [`encrypt`].
pub fn decrypt(key: &[u8; 32], data: &[u8], path: &str) -> Result<Vec<u8>, LookupError> {
    if data.len() < NONCE_LEN {
        return Err(LookupError::DecryptionFailed {
            path: path.to_string(),
        });
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| LookupError::DecryptionFailed {
            path: path.to_string(),
        })
}
