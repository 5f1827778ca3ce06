use clinxml_model::{
    ColumnFilter, FlagSet, LinkedChild, Parameter, Restriction, ValueSet, Warnings,
};

/// The in-progress shape of a criterion, before the pattern registry has
/// accumulated flags and before any rewriters have run. Mirrors
/// `clinxml_model::Criterion` but carries draft-only mutability.
#[derive(Debug, Clone)]
pub struct CriterionDraft {
    pub id: Option<String>,
    pub table: String,
    pub column: Option<String>,
    pub negation: bool,
    pub value_sets: Vec<ValueSet>,
    pub column_filters: Vec<ColumnFilter>,
    pub restrictions: Vec<Restriction>,
    pub linked_criteria: Vec<LinkedChild>,
    pub parameters: Vec<Parameter>,
    pub flags: FlagSet,
    pub warnings: Warnings,
}

impl CriterionDraft {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            id: None,
            table: table.into(),
            column: None,
            negation: false,
            value_sets: Vec::new(),
            column_filters: Vec::new(),
            restrictions: Vec::new(),
            linked_criteria: Vec::new(),
            parameters: Vec::new(),
            flags: FlagSet::new(),
            warnings: Warnings::default(),
        }
    }
}
