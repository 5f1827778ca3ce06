use crate::builtin::built_in_patterns;
use crate::draft::CriterionDraft;
use crate::pattern::Pattern;

/// Enumerates patterns in priority order and applies matching ones to a
/// draft: **all** matching predicates apply; flag keys are
/// written first-writer-wins, while value-set / column-filter rewrites
/// compose — each rewriter sees the draft as left by the previous one.
pub struct PatternRegistry {
    patterns: Vec<Pattern>,
}

impl Default for PatternRegistry {
    fn default() -> Self {
        let mut patterns = built_in_patterns();
        patterns.sort_by_key(|p| p.priority);
        Self { patterns }
    }
}

impl PatternRegistry {
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn apply(&self, draft: &mut CriterionDraft) {
        for pattern in &self.patterns {
            if !(pattern.predicate)(draft) {
                continue;
            }
            tracing::debug!(pattern = pattern.name, table = %draft.table, "pattern matched");
            for (key, value) in (pattern.produce_flags)(draft) {
                draft.flags.set_if_absent(key, value);
            }
            if let Some(rewriter) = pattern.rewrite_value_sets {
                draft.value_sets = rewriter(draft);
            }
            if let Some(rewriter) = pattern.rewrite_column_filters {
                draft.column_filters = rewriter(draft);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinxml_model::{CodeSystem, CodeValue, ColumnFilter, FilterType, ValueSet};

    fn lsoa_filter(code: &str) -> ColumnFilter {
        let mut cf = ColumnFilter::new("LSOA_LOWER_AREA", FilterType::Generic);
        cf.value_sets.push(ValueSet {
            value_set_guid: None,
            value_set_description: None,
            code_system: CodeSystem::EmisInternal,
            include_children: false,
            is_refset: false,
            is_pseudo_refset: false,
            is_pseudo_member: false,
            is_library_item: false,
            inactive: false,
            values: vec![CodeValue {
                code_value: code.to_string(),
                display_name: None,
                include_children: false,
                inactive: false,
                code_system: CodeSystem::EmisInternal,
            }],
            library_item_id: None,
        });
        cf
    }

    #[test]
    fn test_demographic_pattern_sets_flag() {
        let registry = PatternRegistry::default();
        let mut draft = CriterionDraft::new("PATIENTS");
        draft.column = Some("AGE".to_string());
        registry.apply(&mut draft);
        assert!(draft.flags.get_bool("is_demographic"));
    }

    #[test]
    fn test_lsoa_consolidation_merges_five_filters() {
        let registry = PatternRegistry::default();
        let mut draft = CriterionDraft::new("PATIENTS");
        for code in ["E01001", "E01002", "E01003", "E01004", "E01005"] {
            draft.column_filters.push(lsoa_filter(code));
        }
        registry.apply(&mut draft);

        assert!(draft.flags.get_bool("is_consolidated"));
        assert_eq!(draft.flags.get_int("consolidated_count"), Some(5));
        assert_eq!(
            draft.flags.get_str_list("consolidated_lsoa_codes").map(|v| v.len()),
            Some(5)
        );
        assert_eq!(draft.column_filters.len(), 1);
        assert_eq!(draft.column_filters[0].value_sets[0].values.len(), 5);
    }

    #[test]
    fn test_restriction_only_requires_no_value_sets_or_filters() {
        use clinxml_model::{Restriction, RestrictionKind, SortDirection};
        let registry = PatternRegistry::default();
        let mut draft = CriterionDraft::new("EVENTS");
        draft.restrictions.push(Restriction {
            kind: RestrictionKind::Latest,
            direction: SortDirection::Desc,
            record_count: Some(1),
            column: None,
            value_set_filter: None,
        });
        registry.apply(&mut draft);
        assert!(draft.flags.get_bool("is_restriction_only"));
    }

    #[test]
    fn test_patterns_sorted_by_priority() {
        let registry = PatternRegistry::default();
        let priorities: Vec<i32> = registry.patterns().iter().map(|p| p.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
    }
}
