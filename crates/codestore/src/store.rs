//! Accumulates [`CodeEntry`] occurrences keyed by their dedup identity,
//! merging provenance and classification flags monotonically while keeping
//! first-insertion order.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use clinxml_model::{CodeEntry, DedupKey, MappingStatus};

use crate::view::View;

/// Bucket counts produced by [`CodeStore::categorise`]. EMISINTERNAL codes
/// are recorded but never counted as clinical, medication, refset, or
/// pseudo-member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Categorised {
    pub clinical: usize,
    pub medication: usize,
    pub refsets: usize,
    pub pseudo_refsets: usize,
    pub pseudo_members: usize,
    pub emis_internal: usize,
    pub library: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeStore {
    entries: BTreeMap<DedupKey, CodeEntry>,
    /// First-insertion order of distinct keys, kept separate from the
    /// `BTreeMap`'s lexicographic order so `flatten` can emit rows stably.
    order: Vec<DedupKey>,
}

impl CodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts one occurrence. If the dedup key already exists, provenance
    /// is merged (deduped by [`clinxml_model::Provenance::dedup_key`]),
    /// `mapping_status` and `is_pseudomember` are upgraded monotonically
    /// (never downgraded back to `not_found`/`false`), and the more
    /// descriptively complete of the two entries donates its descriptive
    /// fields — the other classification flags stay as first recorded.
    pub fn insert(&mut self, mut entry: CodeEntry) {
        let key = entry.dedup_key();
        match self.entries.entry(key.clone()) {
            Entry::Vacant(slot) => {
                self.order.push(key);
                slot.insert(entry);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                for provenance in entry.provenance.drain(..) {
                    let duplicate = existing
                        .provenance
                        .iter()
                        .any(|p| p.dedup_key() == provenance.dedup_key());
                    if !duplicate {
                        existing.provenance.push(provenance);
                    }
                }
                if entry.mapping_status == MappingStatus::Found {
                    existing.mapping_status = MappingStatus::Found;
                }
                if entry.is_pseudomember {
                    existing.is_pseudomember = true;
                }
                if entry.completeness_score() > existing.completeness_score() {
                    tracing::debug!(emis_guid = %existing.emis_guid, "adopting more complete descriptive fields");
                    existing.value_set_description = entry.value_set_description;
                    existing.xml_display_name = entry.xml_display_name;
                    existing.table_context = entry.table_context;
                    existing.column_context = entry.column_context;
                    existing.snomed_code = entry.snomed_code;
                    existing.snomed_description = entry.snomed_description;
                    existing.descendants = entry.descendants;
                    existing.has_qualifier = entry.has_qualifier;
                    existing.code_type = entry.code_type;
                }
            }
        }
    }

    /// Mutable access to every accumulated entry, for the enrichment step
    /// (C8) to attach SNOMED metadata in place.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CodeEntry> {
        self.entries.values_mut()
    }

    fn ordered(&self) -> impl Iterator<Item = &CodeEntry> {
        self.order.iter().filter_map(|key| self.entries.get(key))
    }

    /// Flattens the store into rows under the given view, in first-insertion
    /// order of distinct keys.
    pub fn flatten(&self, view: View) -> Vec<CodeEntry> {
        match view {
            View::UniqueCodes => self.ordered().cloned().collect(),
            View::PerSource => self
                .ordered()
                .flat_map(|entry| {
                    entry.provenance.iter().map(move |provenance| {
                        let mut row = entry.clone();
                        row.provenance = vec![provenance.clone()];
                        row
                    })
                })
                .collect(),
        }
    }

    /// Buckets every entry by clinical/medication/refset/pseudo-member/
    /// library category, the entry-level analogue of
    /// `ValueSet::classification`.
    pub fn categorise(&self) -> Categorised {
        let mut buckets = Categorised::default();
        for entry in self.entries.values() {
            if entry.is_emisinternal {
                buckets.emis_internal += 1;
                continue;
            }
            if entry.is_library_item {
                buckets.library += 1;
            }
            if entry.is_pseudomember {
                buckets.pseudo_members += 1;
            }
            if entry.is_pseudorefset {
                buckets.pseudo_refsets += 1;
            } else if entry.is_refset {
                buckets.refsets += 1;
            } else if entry.is_medication {
                buckets.medication += 1;
            } else {
                buckets.clinical += 1;
            }
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinxml_model::{CodeSystem, Provenance, SourceType};

    fn base_entry(guid: &str) -> CodeEntry {
        CodeEntry {
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

    fn provenance(guid: &str) -> Provenance {
        Provenance {
            source_type: SourceType::Search,
            source_guid: guid.to_string(),
            source_name: format!("Search {guid}"),
            source_container: "criteria_group:0".to_string(),
            report_type: None,
        }
    }

    #[test]
    fn test_insert_merges_provenance_for_same_dedup_key() {
        let mut store = CodeStore::new();
        let mut a = base_entry("G1");
        a.provenance.push(provenance("S1"));
        let mut b = base_entry("G1");
        b.provenance.push(provenance("S2"));

        store.insert(a);
        store.insert(b);

        assert_eq!(store.len(), 1);
        let rows = store.flatten(View::UniqueCodes);
        assert_eq!(rows[0].provenance.len(), 2);
    }

    #[test]
    fn test_insert_prefers_more_complete_variant() {
        let mut store = CodeStore::new();
        let sparse = base_entry("G1");
        let mut rich = base_entry("G1");
        rich.xml_display_name = Some("Diabetes mellitus".to_string());
        rich.snomed_code = Some("73211009".to_string());

        store.insert(sparse);
        store.insert(rich);

        let rows = store.flatten(View::UniqueCodes);
        assert_eq!(rows[0].xml_display_name.as_deref(), Some("Diabetes mellitus"));
    }

    #[test]
    fn test_per_source_view_emits_one_row_per_provenance() {
        let mut store = CodeStore::new();
        let mut entry = base_entry("G1");
        entry.provenance.push(provenance("S1"));
        entry.provenance.push(provenance("S2"));
        store.insert(entry);

        let rows = store.flatten(View::PerSource);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.provenance.len() == 1));
    }

    #[test]
    fn test_categorise_excludes_emisinternal_from_clinical_bucket() {
        let mut store = CodeStore::new();
        let mut clinical = base_entry("G1");
        clinical.provenance.push(provenance("S1"));
        let mut internal = base_entry("G2");
        internal.is_emisinternal = true;
        internal.provenance.push(provenance("S1"));

        store.insert(clinical);
        store.insert(internal);

        let categorised = store.categorise();
        assert_eq!(categorised.clinical, 1);
        assert_eq!(categorised.emis_internal, 1);
    }

    #[test]
    fn test_pseudo_member_flag_and_mapping_status_upgrade_monotonically() {
        let mut store = CodeStore::new();
        let mut first = base_entry("G1");
        first.provenance.push(provenance("S1"));
        let mut second = base_entry("G1");
        second.is_pseudomember = true;
        second.mapping_status = MappingStatus::Found;
        second.provenance.push(provenance("S2"));

        store.insert(first);
        store.insert(second);

        let rows = store.flatten(View::UniqueCodes);
        assert!(rows[0].is_pseudomember);
        assert_eq!(rows[0].mapping_status, MappingStatus::Found);

        let categorised = store.categorise();
        assert_eq!(categorised.pseudo_members, 1);
    }

    #[test]
    fn test_insert_never_downgrades_pseudo_member_or_mapping_status() {
        let mut store = CodeStore::new();
        let mut found = base_entry("G1");
        found.is_pseudomember = true;
        found.mapping_status = MappingStatus::Found;
        found.provenance.push(provenance("S1"));
        let mut plain = base_entry("G1");
        plain.provenance.push(provenance("S2"));

        store.insert(found);
        store.insert(plain);

        let rows = store.flatten(View::UniqueCodes);
        assert!(rows[0].is_pseudomember);
        assert_eq!(rows[0].mapping_status, MappingStatus::Found);
    }

    #[test]
    fn test_flatten_preserves_first_insertion_order() {
        let mut store = CodeStore::new();
        for guid in ["G3", "G1", "G2"] {
            let mut entry = base_entry(guid);
            entry.provenance.push(provenance("S1"));
            store.insert(entry);
        }

        let rows = store.flatten(View::UniqueCodes);
        let guids: Vec<&str> = rows.iter().map(|r| r.emis_guid.as_str()).collect();
        assert_eq!(guids, vec!["G3", "G1", "G2"]);
    }
}
