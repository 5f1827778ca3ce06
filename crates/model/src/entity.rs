use serde::{Deserialize, Serialize};

use crate::criterion::{Criterion, FlagSet};
#[cfg(test)]
use crate::criterion::{LinkedChild, Relationship};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Search,
    ListReport,
    AuditReport,
    AggregateReport,
}

impl SourceType {
    pub fn is_report(&self) -> bool {
        !matches!(self, SourceType::Search)
    }

    /// Replaces `_` with a space and title-cases each word, e.g.
    /// `list_report` -> `List Report`.
    pub fn label(&self) -> &'static str {
        match self {
            SourceType::Search => "Search",
            SourceType::ListReport => "List Report",
            SourceType::AuditReport => "Audit Report",
            SourceType::AggregateReport => "Aggregate Report",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    And,
    Or,
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionIfTrue {
    Select,
    Next,
    Reject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

/// A report's reference to a base search defining the patient cohort.
///
/// Repeated appearances of the same member search are treated additively,
/// never multiplied through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationReference {
    pub report_guid: String,
    pub score_weightage: Option<f64>,
}

/// A group of criteria combined by `operator`, with select/reject/continue
/// actions for both the true and false branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaGroup {
    pub operator: Operator,
    pub action_if_true: ActionIfTrue,
    pub action_if_false: ActionIfTrue,
    pub score_range: Option<ScoreRange>,
    pub population_criteria: Vec<PopulationReference>,
    pub criteria: Vec<Criterion>,
}

impl CriteriaGroup {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            action_if_true: ActionIfTrue::Select,
            action_if_false: ActionIfTrue::Reject,
            score_range: None,
            population_criteria: Vec::new(),
            criteria: Vec::new(),
        }
    }

    /// Resolves a column name to the index of the top-level criterion in
    /// this group that targets it. This back-reference is always an index
    /// recomputed on demand, never a stored pointer, so the group and its
    /// criteria have no cycle.
    pub fn resolve_column_ref(&self, column: &str) -> Option<usize> {
        self.criteria
            .iter()
            .position(|c| c.column.as_deref() == Some(column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportColumn {
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfiguration {
    pub direction: crate::criterion::SortDirection,
}

/// A list-report section drawing output columns from one logical table,
/// optionally with its own filtering criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnGroup {
    pub id: String,
    pub display_name: String,
    pub logical_table: String,
    pub columns: Vec<ReportColumn>,
    pub sort_configuration: Option<SortConfiguration>,
    pub criteria: Vec<Criterion>,
    pub criteria_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub source: String,
    pub calculation_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateGroup {
    pub display_name: String,
    pub grouping_column: Option<String>,
}

/// Statistical configuration shared by audit and aggregate reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateConfig {
    pub groups: Vec<AggregateGroup>,
    pub logical_table: Option<String>,
    pub result: Option<AggregateResult>,
    /// Only populated for `AggregateReport` entities.
    pub aggregate_criteria: Vec<Criterion>,
}

/// A search or report. `id` is unique across all entities;
/// `parent_guid` and `population_references` cross-reference other entities
/// by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub source_type: SourceType,
    pub name: String,
    pub description: Option<String>,
    pub folder_id: Option<String>,
    pub parent_guid: Option<String>,
    pub parent_type: Option<SourceType>,
    pub flags: FlagSet,
    pub criteria_groups: Vec<CriteriaGroup>,
    pub column_groups: Vec<ColumnGroup>,
    pub report_criteria: Option<Vec<Criterion>>,
    pub aggregate: Option<AggregateConfig>,
    pub population_references: Vec<PopulationReference>,
}

impl Entity {
    pub fn new(id: impl Into<String>, source_type: SourceType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_type,
            name: name.into(),
            description: None,
            folder_id: None,
            parent_guid: None,
            parent_type: None,
            flags: FlagSet::new(),
            criteria_groups: Vec::new(),
            column_groups: Vec::new(),
            report_criteria: None,
            aggregate: None,
            population_references: Vec::new(),
        }
    }

    /// All criteria directly owned by this entity, flattened across its
    /// criteria groups and column groups. Linked children are not included
    /// — they are reachable only through their parent criterion.
    pub fn all_top_level_criteria(&self) -> impl Iterator<Item = &Criterion> {
        let group_criteria = self.criteria_groups.iter().flat_map(|g| g.criteria.iter());
        let column_group_criteria = self.column_groups.iter().flat_map(|g| g.criteria.iter());
        let report_criteria = self.report_criteria.iter().flat_map(|c| c.iter());
        let aggregate_criteria = self
            .aggregate
            .iter()
            .flat_map(|a| a.aggregate_criteria.iter());
        group_criteria
            .chain(column_group_criteria)
            .chain(report_criteria)
            .chain(aggregate_criteria)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_column_ref_finds_matching_criterion() {
        let mut group = CriteriaGroup::new(Operator::And);
        let mut c0 = Criterion::new("EVENTS");
        c0.column = Some("READCODE".to_string());
        let mut c1 = Criterion::new("EVENTS");
        c1.column = Some("CONSULTATION_DATE".to_string());
        group.criteria.push(c0);
        group.criteria.push(c1);

        assert_eq!(group.resolve_column_ref("CONSULTATION_DATE"), Some(1));
        assert_eq!(group.resolve_column_ref("MISSING"), None);
    }

    #[test]
    fn test_source_type_label_and_is_report() {
        assert_eq!(SourceType::Search.label(), "Search");
        assert!(!SourceType::Search.is_report());
        assert_eq!(SourceType::ListReport.label(), "List Report");
        assert!(SourceType::ListReport.is_report());
        assert_eq!(SourceType::AggregateReport.label(), "Aggregate Report");
    }

    #[test]
    fn test_all_top_level_criteria_excludes_linked_children() {
        let mut entity = Entity::new("e1", SourceType::Search, "My Search");
        let mut group = CriteriaGroup::new(Operator::And);
        let mut top = Criterion::new("EVENTS");
        top.linked_criteria.push(LinkedChild {
            relationship: Relationship {
                parent_column: "DATE".to_string(),
                child_column: "DATE".to_string(),
                temporal: None,
            },
            criterion: Box::new(Criterion::new("EVENTS")),
        });
        group.criteria.push(top);
        entity.criteria_groups.push(group);

        assert_eq!(entity.all_top_level_criteria().count(), 1);
    }
}
