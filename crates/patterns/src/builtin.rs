//! The fixed set of built-in patterns, auto-loaded by
//! [`crate::registry::PatternRegistry::default`].

use clinxml_model::{ColumnFilter, CodeValue, FlagValue, ValueSet};

use crate::draft::CriterionDraft;
use crate::pattern::Pattern;

const DEMOGRAPHIC_COLUMNS: [&str; 4] = ["AGE", "DOB", "SEX", "LSOA_LOWER_AREA"];
const LSOA_COLUMN: &str = "LSOA_LOWER_AREA";

fn is_demographic(draft: &CriterionDraft) -> bool {
    draft.table.eq_ignore_ascii_case("PATIENTS")
        && draft.column.as_deref().is_some_and(|c| {
            DEMOGRAPHIC_COLUMNS
                .iter()
                .any(|d| c.eq_ignore_ascii_case(d) || c.to_uppercase().starts_with(d))
        })
}

fn demographic_flags(_draft: &CriterionDraft) -> Vec<(String, FlagValue)> {
    vec![("is_demographic".to_string(), FlagValue::Bool(true))]
}

/// S4 — five `LSOA_LOWER_AREA` column filters in one group consolidate into
/// a single criterion carrying `consolidated_lsoa_codes` and
/// `consolidated_count`.
fn has_multiple_lsoa_filters(draft: &CriterionDraft) -> bool {
    draft
        .column_filters
        .iter()
        .filter(|cf| cf.column_name.eq_ignore_ascii_case(LSOA_COLUMN))
        .count()
        > 1
}

fn lsoa_codes(draft: &CriterionDraft) -> Vec<String> {
    draft
        .column_filters
        .iter()
        .filter(|cf| cf.column_name.eq_ignore_ascii_case(LSOA_COLUMN))
        .flat_map(|cf| cf.value_sets.iter())
        .flat_map(|vs| vs.values.iter())
        .map(|v| v.code_value.clone())
        .collect()
}

fn lsoa_flags(draft: &CriterionDraft) -> Vec<(String, FlagValue)> {
    let codes = lsoa_codes(draft);
    vec![
        ("is_consolidated".to_string(), FlagValue::Bool(true)),
        (
            "consolidated_lsoa_codes".to_string(),
            FlagValue::StrList(codes.clone()),
        ),
        (
            "consolidated_count".to_string(),
            FlagValue::Int(codes.len() as i64),
        ),
    ]
}

fn consolidate_lsoa_filters(draft: &CriterionDraft) -> Vec<ColumnFilter> {
    let (lsoa, rest): (Vec<_>, Vec<_>) = draft
        .column_filters
        .iter()
        .cloned()
        .partition(|cf| cf.column_name.eq_ignore_ascii_case(LSOA_COLUMN));
    if lsoa.is_empty() {
        return rest;
    }
    let template = &lsoa[0];
    let merged_values: Vec<CodeValue> = lsoa
        .iter()
        .flat_map(|cf| cf.value_sets.iter())
        .flat_map(|vs| vs.values.iter().cloned())
        .collect();
    let code_system = template
        .value_sets
        .first()
        .map(|vs| vs.code_system.clone())
        .unwrap_or(clinxml_model::CodeSystem::EmisInternal);
    let consolidated_value_set = ValueSet {
        value_set_guid: None,
        value_set_description: Some("Consolidated LSOA areas".to_string()),
        code_system,
        include_children: false,
        is_refset: false,
        is_pseudo_refset: false,
        is_pseudo_member: false,
        is_library_item: false,
        inactive: false,
        values: merged_values,
        library_item_id: None,
    };
    let mut consolidated = template.clone();
    consolidated.value_sets = vec![consolidated_value_set];

    let mut result = rest;
    result.push(consolidated);
    result
}

fn is_emis_internal_only(draft: &CriterionDraft) -> bool {
    !draft.value_sets.is_empty()
        && draft
            .value_sets
            .iter()
            .all(|vs| vs.code_system.is_emis_internal())
}

fn emis_internal_flags(_draft: &CriterionDraft) -> Vec<(String, FlagValue)> {
    vec![(
        "is_emis_internal_filter_only".to_string(),
        FlagValue::Bool(true),
    )]
}

fn has_parameters(draft: &CriterionDraft) -> bool {
    !draft.parameters.is_empty()
}

fn parameter_flags(draft: &CriterionDraft) -> Vec<(String, FlagValue)> {
    vec![
        ("has_parameter".to_string(), FlagValue::Bool(true)),
        (
            "parameter_names".to_string(),
            FlagValue::StrList(draft.parameters.iter().map(|p| p.name.clone()).collect()),
        ),
    ]
}

/// EMIS represents lab/test-attribute criteria (e.g. most-recent-value
/// filters) against the `PATIENT_TEST_ATTRIBUTE` logical table.
fn is_test_attribute(draft: &CriterionDraft) -> bool {
    draft.table.eq_ignore_ascii_case("PATIENT_TEST_ATTRIBUTE")
}

fn test_attribute_flags(_draft: &CriterionDraft) -> Vec<(String, FlagValue)> {
    vec![("is_test_attribute".to_string(), FlagValue::Bool(true))]
}

fn is_restriction_only(draft: &CriterionDraft) -> bool {
    !draft.restrictions.is_empty() && draft.value_sets.is_empty() && draft.column_filters.is_empty()
}

fn restriction_only_flags(_draft: &CriterionDraft) -> Vec<(String, FlagValue)> {
    vec![("is_restriction_only".to_string(), FlagValue::Bool(true))]
}

fn has_linked_criteria(draft: &CriterionDraft) -> bool {
    !draft.linked_criteria.is_empty()
}

fn linked_criteria_flags(draft: &CriterionDraft) -> Vec<(String, FlagValue)> {
    vec![
        ("has_linked_criteria".to_string(), FlagValue::Bool(true)),
        (
            "linked_criteria_count".to_string(),
            FlagValue::Int(draft.linked_criteria.len() as i64),
        ),
    ]
}

pub(crate) fn built_in_patterns() -> Vec<Pattern> {
    vec![
        Pattern {
            name: "demographic",
            priority: 10,
            predicate: is_demographic,
            produce_flags: demographic_flags,
            rewrite_value_sets: None,
            rewrite_column_filters: None,
        },
        Pattern {
            name: "lsoa_consolidation",
            priority: 20,
            predicate: has_multiple_lsoa_filters,
            produce_flags: lsoa_flags,
            rewrite_value_sets: None,
            rewrite_column_filters: Some(consolidate_lsoa_filters),
        },
        Pattern {
            name: "emisinternal_filter_only",
            priority: 30,
            predicate: is_emis_internal_only,
            produce_flags: emis_internal_flags,
            rewrite_value_sets: None,
            rewrite_column_filters: None,
        },
        Pattern {
            name: "parameter_bearing",
            priority: 40,
            predicate: has_parameters,
            produce_flags: parameter_flags,
            rewrite_value_sets: None,
            rewrite_column_filters: None,
        },
        Pattern {
            name: "test_attribute",
            priority: 50,
            predicate: is_test_attribute,
            produce_flags: test_attribute_flags,
            rewrite_value_sets: None,
            rewrite_column_filters: None,
        },
        Pattern {
            name: "restriction_only",
            priority: 90,
            predicate: is_restriction_only,
            produce_flags: restriction_only_flags,
            rewrite_value_sets: None,
            rewrite_column_filters: None,
        },
        Pattern {
            name: "linked_criteria_marker",
            priority: 95,
            predicate: has_linked_criteria,
            produce_flags: linked_criteria_flags,
            rewrite_value_sets: None,
            rewrite_column_filters: None,
        },
    ]
}
