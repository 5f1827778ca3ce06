//! Input-hash-keyed memoisation of pipeline results: re-entry with the same
//! bytes returns the cached result rather than re-parsing. Values are
//! immutable once inserted; eviction is a caller concern, not handled here.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::result::PipelineResult;

static MEMO: once_cell::sync::OnceCell<Arc<RwLock<HashMap<String, PipelineResult>>>> =
    once_cell::sync::OnceCell::new();

fn memo() -> &'static Arc<RwLock<HashMap<String, PipelineResult>>> {
    MEMO.get_or_init(|| Arc::new(RwLock::new(HashMap::new())))
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn get(hash: &str) -> Option<PipelineResult> {
    memo().read().get(hash).cloned()
}

pub fn insert(hash: String, result: PipelineResult) {
    memo().write().insert(hash, result);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_for_same_bytes() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
    }
}
