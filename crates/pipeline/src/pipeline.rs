//! C10: the orchestrator. Wires the encoding resolver, walker, structure
//! parser, code store, lookup enrichment and structure enricher into the
//! single entry point every caller of this crate actually uses.

use clinxml_codestore::{Categorised, CodeStore};
use clinxml_lookup::{
    enrich, global_lookup, set_global_lookup, FilteredLookup, LookupConfig, LookupError,
    LookupStatistics, LookupStore,
};
use clinxml_model::{PipelineStatus, Row, Warning};
use clinxml_parser::StructureParser;
use clinxml_patterns::PatternRegistry;
use clinxml_structure::StructureEnricher;
use clinxml_xml::{decode_xml, XmlWalker};

use crate::cache;
use crate::collect::collect_code_entries;
use crate::config::PipelineConfig;
use crate::result::{PipelineResult, StructureData};

/// Parses `bytes` as an EMIS clinical-search document and returns the full
/// result. Never panics and never returns `Err` — failures are reported
/// through `PipelineResult::status` and `::warnings`. Results are memoised
/// by content hash; calling this twice with the same bytes returns the
/// same value without re-parsing.
pub fn parse(bytes: &[u8], config: &PipelineConfig) -> PipelineResult {
    let hash = cache::content_hash(bytes);
    if let Some(cached) = cache::get(&hash) {
        tracing::debug!(%hash, "serving memoised pipeline result");
        return cached;
    }

    let result = parse_uncached(bytes, config);
    cache::insert(hash, result.clone());
    result
}

fn parse_uncached(bytes: &[u8], config: &PipelineConfig) -> PipelineResult {
    let (text, encoding) = decode_xml(bytes);
    let registry = PatternRegistry::default();
    let walker = XmlWalker::new(&text);
    let parser = StructureParser::new(&registry);

    match parser.parse(walker) {
        Ok(doc) => {
            let mut code_store = collect_code_entries(&doc.entities);
            let lookup = apply_lookup(&mut code_store, config);

            let enricher = StructureEnricher::new(&doc.folders, &doc.entities);
            let structure_data = StructureData {
                folder_paths: enricher.folder_paths(),
                dependency_graph: enricher.dependency_graph(),
                dependents: enricher.dependents(),
                folder_tree: enricher.folder_tree(),
                enriched_searches: enricher.enrich_searches(),
                enriched_reports: enricher.enrich_reports(),
            };

            let categorised = code_store.categorise();
            let view = config
                .dedup_view()
                .map(|v| v.as_view())
                .unwrap_or(clinxml_codestore::View::UniqueCodes);
            let ui_rows = code_store.flatten(view).into_iter().map(to_row).collect();

            let mut warnings = doc.warnings;
            let mut status = if warnings.is_empty() {
                PipelineStatus::Ok
            } else {
                PipelineStatus::Partial
            };

            let lookup_statistics = match lookup {
                LookupOutcome::Enriched(stats) => Some(stats),
                LookupOutcome::Degraded(warning) => {
                    warnings.push(warning);
                    status = worse(status, PipelineStatus::Partial);
                    None
                }
                LookupOutcome::Fatal(warning) => {
                    warnings.push(warning);
                    status = worse(status, PipelineStatus::Failed);
                    None
                }
            };

            PipelineResult {
                status,
                ui_rows,
                entities: doc.entities,
                folders: doc.folders,
                structure_data,
                code_store,
                categorised,
                lookup_statistics,
                encoding,
                warnings,
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "document parse failed");
            let empty = StructureEnricher::new(&[], &[]);
            PipelineResult {
                status: PipelineStatus::Failed,
                ui_rows: Vec::new(),
                entities: Vec::new(),
                folders: Vec::new(),
                structure_data: StructureData {
                    folder_paths: empty.folder_paths(),
                    dependency_graph: empty.dependency_graph(),
                    dependents: empty.dependents(),
                    folder_tree: empty.folder_tree(),
                    enriched_searches: Vec::new(),
                    enriched_reports: Vec::new(),
                },
                code_store: CodeStore::new(),
                categorised: Categorised::default(),
                lookup_statistics: None,
                encoding,
                warnings: vec![Warning::new("parse", "", err.to_string())],
            }
        }
    }
}

enum LookupOutcome {
    Enriched(LookupStatistics),
    /// Cache missing, no remote configured, or the table itself is
    /// malformed — every entry is left `mapping_status = not_found`.
    Degraded(Warning),
    /// The cache exists but the configured key can't open it — fatal to
    /// this run's enrichment section.
    Fatal(Warning),
}

fn apply_lookup(code_store: &mut CodeStore, config: &PipelineConfig) -> LookupOutcome {
    let Some(decryption_key) = config.decrypt_key() else {
        enrich(code_store, &FilteredLookup::empty());
        return LookupOutcome::Degraded(Warning::new(
            "lookup",
            "",
            "no decryption key configured; codes left unmapped",
        ));
    };

    let lookup_config = LookupConfig {
        cache_dir: config.lookup_cache_dir.clone(),
        remote_url: config.lookup_remote_url.clone(),
        decryption_key,
    };

    let store = match global_lookup() {
        Some(existing) => existing,
        None => match LookupStore::load(&lookup_config) {
            Ok(loaded) => set_global_lookup(loaded),
            Err(LookupError::DecryptionFailed { path }) => {
                enrich(code_store, &FilteredLookup::empty());
                return LookupOutcome::Fatal(Warning::new(
                    "lookup",
                    path,
                    "lookup cache could not be decrypted",
                ));
            }
            Err(other) => {
                enrich(code_store, &FilteredLookup::empty());
                return LookupOutcome::Degraded(Warning::new("lookup", "", other.to_string()));
            }
        },
    };

    let guard = store.read();
    let guids: Vec<String> = code_store.iter_mut().map(|e| e.emis_guid.clone()).collect();
    let filtered = guard.get_lookup_for_guids(&guids);
    enrich(code_store, &filtered);
    LookupOutcome::Enriched(guard.statistics().clone())
}

fn worse(a: PipelineStatus, b: PipelineStatus) -> PipelineStatus {
    use PipelineStatus::*;
    match (a, b) {
        (Failed, _) | (_, Failed) => Failed,
        (Partial, _) | (_, Partial) => Partial,
        _ => Ok,
    }
}

fn to_row(entry: clinxml_model::CodeEntry) -> Row {
    let first = entry.provenance.first().cloned().unwrap_or_else(|| clinxml_model::Provenance {
        source_type: clinxml_model::SourceType::Search,
        source_guid: String::new(),
        source_name: String::new(),
        source_container: String::new(),
        report_type: None,
    });
    Row {
        value_set_guid: entry.value_set_guid,
        value_set_description: entry.value_set_description,
        emis_guid: entry.emis_guid,
        xml_display_name: entry.xml_display_name,
        code_system: entry.code_system,
        include_children: entry.include_children,
        is_refset: entry.is_refset,
        is_pseudorefset: entry.is_pseudorefset,
        is_pseudomember: entry.is_pseudomember,
        is_emisinternal: entry.is_emisinternal,
        is_medication: entry.is_medication,
        is_library_item: entry.is_library_item,
        inactive: entry.inactive,
        table_context: entry.table_context,
        column_context: entry.column_context,
        source_type: first.source_type,
        source_guid: first.source_guid,
        source_name: first.source_name,
        source_container: first.source_container,
        report_type: first.report_type,
        snomed_code: entry.snomed_code,
        snomed_description: entry.snomed_description,
        descendants: entry.descendants,
        has_qualifier: entry.has_qualifier,
        code_type: entry.code_type,
        is_parent: entry.is_parent,
        mapping_status: entry.mapping_status,
        provenance: entry.provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?><EMISExport></EMISExport>"#;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn test_empty_document_yields_ok_status_with_empty_collections() {
        let result = parse(EMPTY_DOC.as_bytes(), &config());
        assert_eq!(result.status, PipelineStatus::Ok);
        assert!(result.entities.is_empty());
        assert!(result.folders.is_empty());
        assert!(result.ui_rows.is_empty());
    }

    #[test]
    fn test_same_bytes_are_served_from_memo() {
        let bytes = EMPTY_DOC.as_bytes();
        let first = parse(bytes, &config());
        let second = parse(bytes, &config());
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_decrypt_key_degrades_to_not_found_not_failure() {
        let result = parse(EMPTY_DOC.as_bytes(), &config());
        assert_ne!(result.status, PipelineStatus::Failed);
        assert!(result.lookup_statistics.is_none());
    }

    #[test]
    fn test_malformed_xml_sets_failed_status_with_warning() {
        let result = parse(b"<EMISExport><Folder></EMISExport>", &config());
        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].stage, "parse");
    }
}
