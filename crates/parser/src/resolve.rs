//! Turns the raw subtrees the walker buffered into canonical model records.

use std::collections::BTreeSet;

use clinxml_model::{
    CodeValue, ColumnFilter, FilterType, Restriction, RestrictionKind, ValueSet, Warnings,
};

use clinxml_xml::{RawColumnFilter, RawRangeInfo, RawRestriction, RawValueSet};

/// Resolves one `valueSet` subtree. A library reference never exposes
/// expanded codes, even if the XML carried embedded `<value>` children —
/// per the pinned Open Question resolution, such children are flagged as
/// a warning and otherwise ignored.
pub fn resolve_value_set(raw: RawValueSet, warnings: &mut Warnings) -> ValueSet {
    if raw.is_library_item {
        if !raw.values.is_empty() {
            warnings.unexpected_library_children = true;
        }
        return ValueSet {
            value_set_guid: raw.value_set_guid,
            value_set_description: raw.value_set_description,
            code_system: raw.code_system,
            include_children: raw.include_children,
            is_refset: raw.is_refset,
            is_pseudo_refset: raw.is_pseudo_refset,
            is_pseudo_member: raw.is_pseudo_member,
            is_library_item: true,
            inactive: raw.inactive,
            values: Vec::new(),
            library_item_id: raw.library_item_id,
        };
    }

    let values = raw
        .values
        .into_iter()
        .map(|v| CodeValue {
            code_value: v.code_value,
            display_name: v.display_name,
            include_children: v.include_children,
            inactive: v.inactive,
            code_system: v.code_system,
        })
        .collect();

    ValueSet {
        value_set_guid: raw.value_set_guid,
        value_set_description: raw.value_set_description,
        code_system: raw.code_system,
        include_children: raw.include_children,
        is_refset: raw.is_refset,
        is_pseudo_refset: raw.is_pseudo_refset,
        is_pseudo_member: raw.is_pseudo_member,
        is_library_item: false,
        inactive: raw.inactive,
        values,
        library_item_id: None,
    }
}

fn infer_filter_type(hint: Option<&str>, value_sets: &[ValueSet], column_name: &str) -> FilterType {
    if let Some(hint) = hint {
        match hint.to_uppercase().as_str() {
            "READCODE" => return FilterType::Readcode,
            "DRUGCODE" => return FilterType::Drugcode,
            "DATE" => return FilterType::Date,
            "AGE" => return FilterType::Age,
            "NUMERIC" => return FilterType::Numeric,
            "EMISINTERNAL" => return FilterType::EmisInternal,
            _ => {}
        }
    }
    if let Some(first) = value_sets.first() {
        if first.code_system.is_emis_internal() {
            return FilterType::EmisInternal;
        }
        if first.code_system == clinxml_model::CodeSystem::Emis {
            return FilterType::Drugcode;
        }
        if first.code_system == clinxml_model::CodeSystem::Sct {
            return FilterType::Readcode;
        }
    }
    let upper = column_name.to_uppercase();
    if upper.contains("DATE") {
        FilterType::Date
    } else if upper == "AGE" {
        FilterType::Age
    } else if upper.contains("VALUE") || upper.contains("NUMERIC") {
        FilterType::Numeric
    } else {
        FilterType::Generic
    }
}

/// Resolves one `columnFilter` subtree, inferring its [`FilterType`] from
/// an explicit hint or, failing that, from the code systems of its nested
/// value sets and its column name.
pub fn resolve_column_filter(raw: RawColumnFilter, warnings: &mut Warnings) -> ColumnFilter {
    let value_sets: Vec<ValueSet> = raw
        .value_sets
        .into_iter()
        .map(|vs| resolve_value_set(vs, warnings))
        .collect();
    let filter_type = infer_filter_type(
        raw.filter_type_hint.as_deref(),
        &value_sets,
        &raw.column_name,
    );
    ColumnFilter {
        column_name: raw.column_name,
        column_display: raw.column_display,
        filter_type,
        in_not_in: raw.in_not_in,
        range_info: raw.range_info.map(resolve_range_info),
        value_sets,
        suppressed: false,
    }
}

fn resolve_range_info(raw: RawRangeInfo) -> clinxml_model::RangeInfo {
    clinxml_model::RangeInfo {
        from: raw.from.map(|b| clinxml_model::RangeBound {
            value: b.value,
            relation: b.relation,
        }),
        to: raw.to.map(|b| clinxml_model::RangeBound {
            value: b.value,
            relation: b.relation,
        }),
        relative_to: raw.relative_to,
    }
}

/// Resolves a `restriction` subtree: latest / earliest / "top N ordered by
/// column" are all expressed uniformly.
pub fn resolve_restriction(raw: RawRestriction, warnings: &mut Warnings) -> Restriction {
    let kind = match raw.kind_hint.to_lowercase().as_str() {
        "latest" => RestrictionKind::Latest,
        "earliest" => RestrictionKind::Earliest,
        _ => RestrictionKind::CountOrder,
    };
    Restriction {
        kind,
        direction: raw.direction,
        record_count: raw.record_count,
        column: raw.column,
        value_set_filter: raw.value_set_filter.map(|vs| resolve_value_set(vs, warnings)),
    }
}

/// Marks column filters whose content exactly duplicates a top-level value
/// set (by guid, or by the set of contained codes) as `suppressed`: they
/// are retained for provenance but not rendered independently.
pub fn suppress_duplicate_column_filters(value_sets: &[ValueSet], column_filters: &mut [ColumnFilter]) {
    let top_level_guids: BTreeSet<&str> = value_sets
        .iter()
        .filter_map(|vs| vs.value_set_guid.as_deref())
        .collect();
    let top_level_code_sets: Vec<BTreeSet<&str>> = value_sets
        .iter()
        .map(|vs| vs.values.iter().map(|v| v.code_value.as_str()).collect())
        .collect();

    for filter in column_filters.iter_mut() {
        let duplicates = filter.value_sets.iter().any(|vs| {
            if let Some(guid) = vs.value_set_guid.as_deref() {
                if top_level_guids.contains(guid) {
                    return true;
                }
            }
            if vs.values.is_empty() {
                return false;
            }
            let codes: BTreeSet<&str> = vs.values.iter().map(|v| v.code_value.as_str()).collect();
            top_level_code_sets.iter().any(|t| *t == codes)
        });
        if duplicates {
            filter.suppressed = true;
        }
    }
}
