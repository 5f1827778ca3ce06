//! C2: the process-wide SNOMED lookup table, loaded once from an encrypted
//! local parquet cache and queried by EMIS GUID.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, BooleanArray, StringArray, UInt64Array};
use parking_lot::RwLock;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::format::KeyValue;

use crate::cache;
use crate::error::LookupError;
use crate::record::{normalise_code_value, LoadSource, LookupRecord, LookupStatistics};

/// Where to find the lookup table and how to unlock it.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub cache_dir: std::path::PathBuf,
    pub remote_url: Option<String>,
    pub decryption_key: [u8; 32],
}

/// The full, loaded lookup table.
pub struct LookupStore {
    records: HashMap<String, LookupRecord>,
    statistics: LookupStatistics,
}

/// A view over [`LookupStore`] restricted to the GUIDs a particular parse
/// actually needs, handed to C8's `enrich`.
pub struct FilteredLookup(HashMap<String, LookupRecord>);

impl FilteredLookup {
    #[cfg(test)]
    pub(crate) fn from_map(map: HashMap<String, LookupRecord>) -> Self {
        Self(map)
    }

    /// A lookup view with nothing in it — every `enrich` call against this
    /// leaves `mapping_status = not_found`.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, guid: &str) -> Option<&LookupRecord> {
        self.0.get(&normalise_code_value(guid))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl LookupStore {
    /// Loads the table from the most recent local cache file, decrypting it
    /// with `config.decryption_key`. Falls back to an error naming the
    /// configured remote source if no cache is present — this crate does
    /// not perform the remote fetch itself; there is no network surface
    /// here.
    pub fn load(config: &LookupConfig) -> Result<Self, LookupError> {
        let Some(path) = cache::most_recent_cache_file(&config.cache_dir) else {
            return match &config.remote_url {
                Some(url) => Err(LookupError::RemoteFetchUnavailable { url: url.clone() }),
                None => Err(LookupError::NoSourceAvailable),
            };
        };

        let display_path = path.display().to_string();
        let encrypted = std::fs::read(&path).map_err(|source| LookupError::Io {
            path: display_path.clone(),
            source,
        })?;
        let plaintext = cache::decrypt(&config.decryption_key, &encrypted, &display_path)?;
        tracing::debug!(path = %display_path, "loaded lookup cache");
        Self::from_parquet_bytes(plaintext, &display_path, LoadSource::LocalCache)
    }

    /// Builds a store directly from decrypted parquet bytes, without going
    /// through the cache directory — used by tests and by a caller that
    /// already has the bytes (e.g. from a fresh remote fetch).
    pub fn from_parquet_bytes(
        bytes: Vec<u8>,
        path: &str,
        source: LoadSource,
    ) -> Result<Self, LookupError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(bytes))
            .map_err(|e| malformed(path, e))?;
        let metadata: Vec<KeyValue> = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .cloned()
            .unwrap_or_default();
        let reader = builder.build().map_err(|e| malformed(path, e))?;

        let mut records = HashMap::new();
        let mut clinical_count = 0usize;
        let mut medication_count = 0usize;
        let mut other_count = 0usize;

        for batch in reader {
            let batch = batch.map_err(|e| malformed(path, e))?;
            let guids = string_column(&batch, "emis_guid", path)?;
            let codes = string_column(&batch, "snomed_code", path)?;
            let descriptions = opt_string_column(&batch, "snomed_description");
            let descendants = opt_u64_column(&batch, "descendants");
            let has_qualifier = opt_bool_column(&batch, "has_qualifier");
            let code_types = opt_string_column(&batch, "code_type");
            let is_medication = opt_bool_column(&batch, "is_medication");
            let is_parent = opt_bool_column(&batch, "is_parent");
            let source_types = opt_string_column(&batch, "source_type");

            for row in 0..batch.num_rows() {
                let guid = normalise_code_value(guids.value(row));
                let medication = is_medication
                    .as_ref()
                    .map(|col| col.value(row))
                    .unwrap_or(false);
                if medication {
                    medication_count += 1;
                } else if codes.value(row).is_empty() {
                    other_count += 1;
                } else {
                    clinical_count += 1;
                }
                records.insert(
                    guid.clone(),
                    LookupRecord {
                        emis_guid: guid,
                        snomed_code: codes.value(row).to_string(),
                        snomed_description: descriptions
                            .as_ref()
                            .filter(|col| !col.is_null(row))
                            .map(|col| col.value(row).to_string()),
                        descendants: descendants
                            .as_ref()
                            .filter(|col| !col.is_null(row))
                            .map(|col| col.value(row)),
                        has_qualifier: has_qualifier
                            .as_ref()
                            .filter(|col| !col.is_null(row))
                            .map(|col| col.value(row)),
                        code_type: code_types
                            .as_ref()
                            .filter(|col| !col.is_null(row))
                            .map(|col| col.value(row).to_string()),
                        is_parent: is_parent
                            .as_ref()
                            .filter(|col| !col.is_null(row))
                            .map(|col| col.value(row)),
                        source_type: source_types
                            .as_ref()
                            .filter(|col| !col.is_null(row))
                            .map(|col| col.value(row).to_string()),
                    },
                );
            }
        }

        let find_meta = |key: &str| {
            metadata
                .iter()
                .find(|kv| kv.key == key)
                .and_then(|kv| kv.value.clone())
        };

        Ok(Self {
            records,
            statistics: LookupStatistics {
                clinical_count,
                medication_count,
                other_count,
                emis_version: find_meta("emis_version"),
                snomed_version: find_meta("snomed_version"),
                extract_date: find_meta("extract_date"),
                load_source: source,
            },
        })
    }

    /// Restricts the table to only the GUIDs a given parse referenced —
    /// enrichment only looks up codes actually present.
    pub fn get_lookup_for_guids(&self, guids: &[String]) -> FilteredLookup {
        let mut filtered = HashMap::with_capacity(guids.len());
        for guid in guids {
            let key = normalise_code_value(guid);
            if let Some(record) = self.records.get(&key) {
                filtered.insert(key, record.clone());
            }
        }
        FilteredLookup(filtered)
    }

    pub fn statistics(&self) -> &LookupStatistics {
        &self.statistics
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn malformed(path: &str, e: impl std::fmt::Display) -> LookupError {
    LookupError::MalformedTable {
        path: path.to_string(),
        message: e.to_string(),
    }
}

fn string_column<'a>(
    batch: &'a arrow::record_batch::RecordBatch,
    name: &str,
    path: &str,
) -> Result<&'a StringArray, LookupError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| LookupError::MalformedTable {
            path: path.to_string(),
            message: format!("missing or non-string column `{name}`"),
        })
}

fn opt_string_column<'a>(
    batch: &'a arrow::record_batch::RecordBatch,
    name: &str,
) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn opt_u64_column<'a>(
    batch: &'a arrow::record_batch::RecordBatch,
    name: &str,
) -> Option<&'a UInt64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
}

fn opt_bool_column<'a>(
    batch: &'a arrow::record_batch::RecordBatch,
    name: &str,
) -> Option<&'a BooleanArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
}

/// Process-wide cache for the loaded table: concurrent readers either see a
/// fully loaded table or wait for the writer.
static GLOBAL_LOOKUP: once_cell::sync::OnceCell<Arc<RwLock<LookupStore>>> =
    once_cell::sync::OnceCell::new();

pub fn global_lookup() -> Option<Arc<RwLock<LookupStore>>> {
    GLOBAL_LOOKUP.get().cloned()
}

/// Installs `store` as the process-wide lookup table. Only the first call
/// wins; later calls are no-ops, matching `OnceCell`'s semantics.
pub fn set_global_lookup(store: LookupStore) -> Arc<RwLock<LookupStore>> {
    let arc = Arc::new(RwLock::new(store));
    GLOBAL_LOOKUP.get_or_init(|| arc.clone()).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_errors_with_no_cache_and_no_remote() {
        let dir = tempfile::tempdir().unwrap();
        let config = LookupConfig {
            cache_dir: dir.path().to_path_buf(),
            remote_url: None,
            decryption_key: [0u8; 32],
        };
        assert!(matches!(
            LookupStore::load(&config),
            Err(LookupError::NoSourceAvailable)
        ));
    }

    #[test]
    fn test_load_reports_remote_unavailable_when_only_url_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = LookupConfig {
            cache_dir: dir.path().to_path_buf(),
            remote_url: Some("https://example/extract".to_string()),
            decryption_key: [0u8; 32],
        };
        assert!(matches!(
            LookupStore::load(&config),
            Err(LookupError::RemoteFetchUnavailable { .. })
        ));
    }
}
