use clinxml_model::{ColumnFilter, FlagValue, ValueSet};

use crate::draft::CriterionDraft;

pub type Predicate = fn(&CriterionDraft) -> bool;
pub type FlagProducer = fn(&CriterionDraft) -> Vec<(String, FlagValue)>;
pub type ValueSetRewriter = fn(&CriterionDraft) -> Vec<ValueSet>;
pub type ColumnFilterRewriter = fn(&CriterionDraft) -> Vec<ColumnFilter>;

/// A declarative rule applied to every [`CriterionDraft`]. A value, not a
/// trait object or subclass: registering a new pattern means
/// adding one to [`crate::registry::PatternRegistry::default`].
#[derive(Clone, Copy)]
pub struct Pattern {
    pub name: &'static str,
    /// Lower runs earlier.
    pub priority: i32,
    pub predicate: Predicate,
    pub produce_flags: FlagProducer,
    pub rewrite_value_sets: Option<ValueSetRewriter>,
    pub rewrite_column_filters: Option<ColumnFilterRewriter>,
}
