use clinxml_model::{
    ActionIfTrue, CodeSystem, Operator, ParameterScope, ScoreRange, SortDirection, SourceType,
    Temporal,
};

/// A code value inside a `<values>` block, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCodeValue {
    pub code_value: String,
    pub display_name: Option<String>,
    pub include_children: bool,
    pub inactive: bool,
    pub code_system: CodeSystem,
}

/// A `valueSet` subtree, collected whole by the walker: one `ValueSet(...)`
/// event per value set, not a start/end pair, since every value set is
/// fully buffered before being usable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawValueSet {
    pub value_set_guid: Option<String>,
    pub value_set_description: Option<String>,
    pub code_system: CodeSystem,
    pub include_children: bool,
    pub is_refset: bool,
    pub is_pseudo_refset: bool,
    pub is_pseudo_member: bool,
    pub is_library_item: bool,
    pub inactive: bool,
    pub values: Vec<RawCodeValue>,
    pub library_item_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRangeBound {
    pub value: String,
    pub relation: clinxml_model::Relation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRangeInfo {
    pub from: Option<RawRangeBound>,
    pub to: Option<RawRangeBound>,
    pub relative_to: Option<String>,
}

/// A `columnFilter` subtree, collected whole for the same reason as
/// [`RawValueSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumnFilter {
    pub column_name: String,
    pub column_display: Option<String>,
    pub filter_type_hint: Option<String>,
    pub in_not_in: Option<clinxml_model::InNotIn>,
    pub range_info: Option<RawRangeInfo>,
    pub value_sets: Vec<RawValueSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRestriction {
    pub kind_hint: String,
    pub direction: SortDirection,
    pub record_count: Option<u32>,
    pub column: Option<String>,
    pub value_set_filter: Option<RawValueSet>,
}

/// One node in the namespace-agnostic, depth-first event sequence emitted
/// by [`crate::walker::XmlWalker`].
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent {
    FolderStart {
        id: String,
        name: String,
        parent_id: Option<String>,
        description: Option<String>,
    },
    FolderEnd,
    EntityStart {
        source_type: SourceType,
        id: String,
        name: String,
        description: Option<String>,
        folder_id: Option<String>,
        parent_guid: Option<String>,
    },
    EntityEnd,
    CriteriaGroupStart {
        operator: Operator,
        action_if_true: ActionIfTrue,
        action_if_false: ActionIfTrue,
        score_range: Option<ScoreRange>,
    },
    CriteriaGroupEnd,
    CriterionStart {
        id: Option<String>,
        table: Option<String>,
        column: Option<String>,
        negation: bool,
    },
    CriterionEnd,
    ValueSet(RawValueSet),
    ColumnFilter(RawColumnFilter),
    Restriction(RawRestriction),
    LinkedCriterionStart {
        parent_column: String,
        child_column: String,
        temporal: Option<Temporal>,
    },
    LinkedCriterionEnd,
    PopulationReference {
        report_guid: String,
        score_weightage: Option<f64>,
    },
    ColumnGroupStart {
        id: String,
        display_name: String,
        logical_table: String,
    },
    ColumnGroupEnd,
    Column {
        display_name: String,
    },
    SortConfiguration {
        direction: SortDirection,
    },
    AggregateConfigStart {
        logical_table: Option<String>,
    },
    AggregateConfigEnd,
    AggregateGroup {
        display_name: String,
        grouping_column: Option<String>,
    },
    AggregateResult {
        source: String,
        calculation_type: String,
    },
    Parameter {
        name: String,
        scope: ParameterScope,
    },
}
