use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::valueset::ValueSet;

/// A single flag value produced by the pattern registry (C4).
///
/// Flags are intentionally loosely typed (the pattern registry is a plugin
/// system whose producers are independent closures); callers that need a
/// specific shape use the typed accessors on [`FlagSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Str(String),
    StrList(Vec<String>),
}

/// Flags accumulated on a [`Criterion`] draft by the pattern registry.
///
/// Keys are written first-writer-wins: once a pattern has set a key, later
/// patterns in priority order may not overwrite it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagSet(BTreeMap<String, FlagValue>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value` only if `key` is not already present. Returns
    /// `true` if the value was written.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: FlagValue) -> bool {
        let key = key.into();
        if self.0.contains_key(&key) {
            false
        } else {
            self.0.insert(key, value);
            true
        }
    }

    /// Forces `key` to `value`, overwriting any prior writer. Reserved for
    /// state-machine-derived flags that are not produced by patterns (e.g.
    /// `has_parameter`), never for pattern-produced flags.
    pub fn force_set(&mut self, key: impl Into<String>, value: FlagValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&FlagValue> {
        self.0.get(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(FlagValue::Bool(true)))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(FlagValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_str_list(&self, key: &str) -> Option<&[String]> {
        match self.0.get(key) {
            Some(FlagValue::StrList(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(FlagValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlagValue)> {
        self.0.iter()
    }
}

/// Element-local warnings attached to a criterion: issues recovered locally
/// rather than failing the whole parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warnings {
    /// A linked criterion referenced a column not present in the parent
    /// group.
    pub orphan_column: bool,
    /// A library-item value set carried embedded child codes (Open
    /// Question: these are never used, but their presence is notable).
    pub unexpected_library_children: bool,
    /// Any other free-text warning (pattern plugin errors, missing table,
    /// etc.), named so the originating stage can be identified.
    pub other: Vec<String>,
}

impl Warnings {
    pub fn is_empty(&self) -> bool {
        !self.orphan_column && !self.unexpected_library_children && self.other.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Readcode,
    Drugcode,
    Date,
    Age,
    Numeric,
    EmisInternal,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InNotIn {
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    LessThan,
    LessThanOrEqual,
    Equal,
    GreaterThanOrEqual,
    GreaterThan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    pub value: String,
    pub relation: Relation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeInfo {
    pub from: Option<RangeBound>,
    pub to: Option<RangeBound>,
    pub relative_to: Option<String>,
}

/// A column-level filter nested under a criterion.
///
/// Column filters whose content duplicates a top-level value set are
/// suppressed from rendering but retained here for provenance — the
/// `suppressed` flag records that decision instead of dropping the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column_name: String,
    pub column_display: Option<String>,
    pub filter_type: FilterType,
    pub in_not_in: Option<InNotIn>,
    pub range_info: Option<RangeInfo>,
    pub value_sets: Vec<ValueSet>,
    /// Set when this filter duplicates a top-level value set structure and
    /// should not be independently rendered.
    pub suppressed: bool,
}

impl ColumnFilter {
    pub fn new(column_name: impl Into<String>, filter_type: FilterType) -> Self {
        Self {
            column_name: column_name.into(),
            column_display: None,
            filter_type,
            in_not_in: None,
            range_info: None,
            value_sets: Vec::new(),
            suppressed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalOperator {
    Before,
    After,
    Within,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalUnit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalComparator {
    Same,
    Greater,
    Less,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temporal {
    pub operator: TemporalOperator,
    pub offset_value: i32,
    pub offset_unit: TemporalUnit,
    pub comparator: TemporalComparator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub parent_column: String,
    pub child_column: String,
    pub temporal: Option<Temporal>,
}

/// A criterion reachable only through its parent — never rendered as a
/// top-level criterion in its own right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedChild {
    pub relationship: Relationship,
    pub criterion: Box<Criterion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    Latest,
    Earliest,
    CountOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restriction {
    pub kind: RestrictionKind,
    pub direction: SortDirection,
    pub record_count: Option<u32>,
    pub column: Option<String>,
    pub value_set_filter: Option<ValueSet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterScope {
    Global,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub scope: ParameterScope,
}

/// A criterion: the canonical, normalised representation of one `<criterion>`
/// element after C5's state machine has run (flags produced, value sets
/// resolved, column filters classified, linked children attached, and
/// restrictions parsed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: Option<String>,
    pub table: String,
    pub column: Option<String>,
    pub negation: bool,
    pub flags: FlagSet,
    pub column_filters: Vec<ColumnFilter>,
    pub value_sets: Vec<ValueSet>,
    pub linked_criteria: Vec<LinkedChild>,
    pub restrictions: Vec<Restriction>,
    pub parameters: Vec<Parameter>,
    pub warnings: Warnings,
}

impl Criterion {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            id: None,
            table: table.into(),
            column: None,
            negation: false,
            flags: FlagSet::new(),
            column_filters: Vec::new(),
            value_sets: Vec::new(),
            linked_criteria: Vec::new(),
            restrictions: Vec::new(),
            parameters: Vec::new(),
            warnings: Warnings::default(),
        }
    }

    /// True if this criterion carries only a restriction and no value sets.
    pub fn is_restriction_only(&self) -> bool {
        !self.restrictions.is_empty() && self.value_sets.is_empty() && self.column_filters.is_empty()
    }

    /// True when `table = PATIENTS` and the column is one of the
    /// demographic columns that never contribute CodeStore entries.
    pub fn is_demographic(&self) -> bool {
        const DEMOGRAPHIC_COLUMNS: [&str; 4] = ["AGE", "DOB", "SEX", "LSOA_LOWER_AREA"];
        self.table.eq_ignore_ascii_case("PATIENTS")
            && self.column.as_deref().is_some_and(|c| {
                DEMOGRAPHIC_COLUMNS
                    .iter()
                    .any(|d| c.eq_ignore_ascii_case(d) || c.to_uppercase().starts_with(d))
            })
    }

    /// True when every value set attached is EMISINTERNAL-only; such a
    /// criterion contributes no clinical code, only a filter.
    pub fn is_emis_internal_filter_only(&self) -> bool {
        !self.value_sets.is_empty()
            && self
                .value_sets
                .iter()
                .all(|vs| vs.code_system.is_emis_internal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valueset::CodeSystem;

    fn value_set(code_system: CodeSystem) -> ValueSet {
        ValueSet {
            value_set_guid: None,
            value_set_description: None,
            code_system,
            include_children: false,
            is_refset: false,
            is_pseudo_refset: false,
            is_pseudo_member: false,
            is_library_item: false,
            inactive: false,
            values: Vec::new(),
            library_item_id: None,
        }
    }

    #[test]
    fn test_flag_set_first_writer_wins() {
        let mut flags = FlagSet::new();
        assert!(flags.set_if_absent("demographic", FlagValue::Bool(true)));
        assert!(!flags.set_if_absent("demographic", FlagValue::Bool(false)));
        assert!(flags.get_bool("demographic"));
    }

    #[test]
    fn test_flag_set_force_set_overwrites() {
        let mut flags = FlagSet::new();
        flags.set_if_absent("has_parameter", FlagValue::Bool(false));
        flags.force_set("has_parameter", FlagValue::Bool(true));
        assert!(flags.get_bool("has_parameter"));
    }

    #[test]
    fn test_is_demographic_matches_known_columns() {
        let mut criterion = Criterion::new("PATIENTS");
        criterion.column = Some("AGE".to_string());
        assert!(criterion.is_demographic());

        criterion.column = Some("CONSULTATION_DATE".to_string());
        assert!(!criterion.is_demographic());

        criterion.table = "EVENTS".to_string();
        criterion.column = Some("AGE".to_string());
        assert!(!criterion.is_demographic());
    }

    #[test]
    fn test_is_restriction_only() {
        let mut criterion = Criterion::new("EVENTS");
        assert!(!criterion.is_restriction_only());

        criterion.restrictions.push(Restriction {
            kind: RestrictionKind::Latest,
            direction: SortDirection::Desc,
            record_count: Some(1),
            column: None,
            value_set_filter: None,
        });
        assert!(criterion.is_restriction_only());

        criterion.value_sets.push(value_set(CodeSystem::Sct));
        assert!(!criterion.is_restriction_only());
    }

    #[test]
    fn test_is_emis_internal_filter_only() {
        let mut criterion = Criterion::new("EVENTS");
        assert!(!criterion.is_emis_internal_filter_only());

        criterion.value_sets.push(value_set(CodeSystem::EmisInternal));
        assert!(criterion.is_emis_internal_filter_only());

        criterion.value_sets.push(value_set(CodeSystem::Sct));
        assert!(!criterion.is_emis_internal_filter_only());
    }

    #[test]
    fn test_warnings_is_empty() {
        let mut warnings = Warnings::default();
        assert!(warnings.is_empty());
        warnings.orphan_column = true;
        assert!(!warnings.is_empty());
    }
}
