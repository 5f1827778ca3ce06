use serde::{Deserialize, Serialize};

use crate::entity::SourceType;
use crate::valueset::CodeSystem;

/// Whether a code's EMIS GUID was resolved to a SNOMED code by the lookup
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    #[default]
    NotFound,
    Found,
}

/// One occurrence of a code: which search/report/column/criterion it came
/// from. A single [`CodeEntry`] accumulates one `Provenance` per distinct
/// occurrence in `unique_codes` view; `per_source` view emits one row per
/// provenance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_type: SourceType,
    pub source_guid: String,
    pub source_name: String,
    /// Free-text description of the containing structure, e.g.
    /// `"criteria_group:0"` or `"column_group:CG1"`.
    pub source_container: String,
    pub report_type: Option<String>,
}

impl Provenance {
    /// `(source_type, source_guid, source_container)` — `report_type` is
    /// descriptive only and does not participate in dedup.
    pub fn dedup_key(&self) -> (SourceType, &str, &str) {
        (self.source_type, self.source_guid.as_str(), self.source_container.as_str())
    }
}

/// A deduplicated code occurrence with full provenance and, after
/// enrichment, SNOMED metadata.
///
/// Dedup key: `(emis_guid, value_set_guid, code_system)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub emis_guid: String,
    pub value_set_guid: Option<String>,
    pub value_set_description: Option<String>,
    pub code_system: CodeSystem,
    pub xml_display_name: Option<String>,
    pub include_children: bool,
    pub is_refset: bool,
    pub is_pseudorefset: bool,
    pub is_pseudomember: bool,
    pub is_emisinternal: bool,
    pub is_medication: bool,
    pub is_library_item: bool,
    pub inactive: bool,
    pub table_context: Option<String>,
    pub column_context: Option<String>,
    pub provenance: Vec<Provenance>,
    pub snomed_code: Option<String>,
    pub snomed_description: Option<String>,
    pub descendants: Option<u64>,
    pub has_qualifier: Option<bool>,
    pub code_type: Option<String>,
    pub is_parent: Option<bool>,
    pub mapping_status: MappingStatus,
}

/// The hashable identity of a code occurrence.
pub type DedupKey = (String, Option<String>, CodeSystem);

impl CodeEntry {
    pub fn dedup_key(&self) -> DedupKey {
        (
            self.emis_guid.clone(),
            self.value_set_guid.clone(),
            self.code_system.clone(),
        )
    }

    /// Count of non-empty descriptive fields, used by `CodeStore::flatten`
    /// to prefer the "most complete" variant among merged insertions.
    pub fn completeness_score(&self) -> u32 {
        [
            self.value_set_description.is_some(),
            self.xml_display_name.is_some(),
            self.table_context.is_some(),
            self.column_context.is_some(),
            self.snomed_code.is_some(),
            self.snomed_description.is_some(),
            self.descendants.is_some(),
            self.has_qualifier.is_some(),
            self.code_type.is_some(),
            self.is_parent.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CodeEntry {
        CodeEntry {
            emis_guid: "guid-1".to_string(),
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
            provenance: Vec::new(),
            snomed_code: None,
            snomed_description: None,
            descendants: None,
            has_qualifier: None,
            code_type: None,
            is_parent: None,
            mapping_status: MappingStatus::default(),
        }
    }

    #[test]
    fn test_dedup_key_ignores_descriptive_fields() {
        let mut a = entry();
        let mut b = entry();
        a.xml_display_name = Some("Asthma".to_string());
        b.xml_display_name = Some("Different display".to_string());
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_completeness_score_counts_populated_descriptive_fields() {
        let mut e = entry();
        assert_eq!(e.completeness_score(), 0);
        e.xml_display_name = Some("Asthma".to_string());
        e.snomed_code = Some("195967001".to_string());
        assert_eq!(e.completeness_score(), 2);
    }

    #[test]
    fn test_mapping_status_defaults_to_not_found() {
        assert_eq!(MappingStatus::default(), MappingStatus::NotFound);
    }

    #[test]
    fn test_provenance_dedup_key_ignores_report_type() {
        let p1 = Provenance {
            source_type: SourceType::Search,
            source_guid: "s1".to_string(),
            source_name: "Search 1".to_string(),
            source_container: "criteria_group:0".to_string(),
            report_type: None,
        };
        let p2 = Provenance {
            report_type: Some("list".to_string()),
            ..p1.clone()
        };
        assert_eq!(p1.dedup_key(), p2.dedup_key());
    }
}
