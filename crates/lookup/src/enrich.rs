//! C8: attaches SNOMED metadata to every accumulated code entry.

use clinxml_codestore::CodeStore;
use clinxml_model::{MappingStatus, Provenance, SourceType};

use crate::record::normalise_code_value;
use crate::store::FilteredLookup;

/// Looks every entry's `emis_guid` up in `lookup`, setting the SNOMED
/// fields and `mapping_status` on a hit, or leaving `mapping_status` at
/// `NotFound` otherwise. `mapping_status` is a first-class two-state field
/// on every row, not an `Option`.
pub fn enrich(store: &mut CodeStore, lookup: &FilteredLookup) {
    for entry in store.iter_mut() {
        let key = normalise_code_value(&entry.emis_guid);
        match lookup.get(&key) {
            Some(record) => {
                entry.snomed_code = Some(record.snomed_code.clone());
                entry.snomed_description = record.snomed_description.clone();
                entry.descendants = record.descendants;
                entry.has_qualifier = record.has_qualifier;
                entry.code_type = record.code_type.clone();
                entry.is_parent = record.is_parent;
                entry.mapping_status = MappingStatus::Found;

                if entry.provenance.is_empty() {
                    if let Some(source_type) = record.source_type.as_deref().and_then(parse_source_type) {
                        entry.provenance.push(Provenance {
                            source_type,
                            source_guid: String::new(),
                            source_name: String::new(),
                            source_container: String::new(),
                            report_type: None,
                        });
                    }
                }
            }
            None => {
                entry.mapping_status = MappingStatus::NotFound;
            }
        }

        // A refset's GUID already is the SNOMED code it represents; the
        // lookup table is never consulted for it.
        if entry.is_refset {
            entry.snomed_code = Some(entry.emis_guid.clone());
            entry.mapping_status = MappingStatus::Found;
        }
    }
}

fn parse_source_type(raw: &str) -> Option<SourceType> {
    match raw.to_lowercase().replace([' ', '-'], "_").as_str() {
        "search" => Some(SourceType::Search),
        "list_report" | "report" => Some(SourceType::ListReport),
        "audit_report" => Some(SourceType::AuditReport),
        "aggregate_report" => Some(SourceType::AggregateReport),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinxml_model::CodeSystem;
    use std::collections::HashMap;

    fn entry(guid: &str) -> clinxml_model::CodeEntry {
        clinxml_model::CodeEntry {
            emis_guid: guid.to_string(),
            value_set_guid: None,
            value_set_description: None,
            code_system: CodeSystem::Sct,
            xml_display_name: None,
            include_children: false,
            is_refset: false,
            is_pseudorefset: false,
            is_pseudomember: false,
            is_emisinternal: false,
            is_medication: false,
            is_library_item: false,
            inactive: false,
            table_context: None,
            column_context: None,
            provenance: vec![clinxml_model::Provenance {
                source_type: SourceType::Search,
                source_guid: "S1".to_string(),
                source_name: "Diabetics".to_string(),
                source_container: "criteria_group:0".to_string(),
                report_type: None,
            }],
            snomed_code: None,
            snomed_description: None,
            descendants: None,
            has_qualifier: None,
            code_type: None,
            is_parent: None,
            mapping_status: MappingStatus::default(),
        }
    }

    fn entry_without_provenance(guid: &str) -> clinxml_model::CodeEntry {
        clinxml_model::CodeEntry {
            provenance: Vec::new(),
            ..entry(guid)
        }
    }

    fn filtered(map: HashMap<String, crate::record::LookupRecord>) -> FilteredLookup {
        FilteredLookup::from_map(map)
    }

    fn lookup_record(guid: &str) -> crate::record::LookupRecord {
        crate::record::LookupRecord {
            emis_guid: guid.to_string(),
            snomed_code: "73211009".to_string(),
            snomed_description: Some("Diabetes mellitus".to_string()),
            descendants: Some(42),
            has_qualifier: Some(false),
            code_type: Some("finding".to_string()),
            is_parent: Some(true),
            source_type: Some("search".to_string()),
        }
    }

    #[test]
    fn test_enrich_marks_found_on_hit() {
        let mut store = CodeStore::new();
        store.insert(entry("G1.0"));
        let mut table = HashMap::new();
        table.insert("G1".to_string(), lookup_record("G1"));
        enrich(&mut store, &filtered(table));

        let rows = store.flatten(clinxml_codestore::View::UniqueCodes);
        assert_eq!(rows[0].mapping_status, MappingStatus::Found);
        assert_eq!(rows[0].is_parent, Some(true));
        assert_eq!(rows[0].snomed_code.as_deref(), Some("73211009"));
    }

    #[test]
    fn test_enrich_forces_refset_snomed_code_to_its_own_guid() {
        let mut store = CodeStore::new();
        let mut refset = entry("195967001");
        refset.is_refset = true;
        store.insert(refset);
        enrich(&mut store, &filtered(HashMap::new()));

        let rows = store.flatten(clinxml_codestore::View::UniqueCodes);
        assert_eq!(rows[0].snomed_code.as_deref(), Some("195967001"));
        assert_eq!(rows[0].mapping_status, MappingStatus::Found);
    }

    #[test]
    fn test_enrich_marks_not_found_on_miss() {
        let mut store = CodeStore::new();
        store.insert(entry("GUNKNOWN"));
        enrich(&mut store, &filtered(HashMap::new()));

        let rows = store.flatten(clinxml_codestore::View::UniqueCodes);
        assert_eq!(rows[0].mapping_status, MappingStatus::NotFound);
    }

    #[test]
    fn test_enrich_backfills_provenance_source_type_when_absent() {
        let mut store = CodeStore::new();
        store.insert(entry_without_provenance("G1.0"));
        let mut table = HashMap::new();
        table.insert("G1".to_string(), lookup_record("G1"));
        enrich(&mut store, &filtered(table));

        let rows = store.flatten(clinxml_codestore::View::UniqueCodes);
        assert_eq!(rows[0].provenance.len(), 1);
        assert_eq!(rows[0].provenance[0].source_type, SourceType::Search);
    }

    #[test]
    fn test_enrich_leaves_existing_provenance_untouched() {
        let mut store = CodeStore::new();
        store.insert(entry("G1.0"));
        let mut table = HashMap::new();
        table.insert("G1".to_string(), lookup_record("G1"));
        enrich(&mut store, &filtered(table));

        let rows = store.flatten(clinxml_codestore::View::UniqueCodes);
        assert_eq!(rows[0].provenance.len(), 1);
        assert_eq!(rows[0].provenance[0].source_guid, "S1");
    }
}
