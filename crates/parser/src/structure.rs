//! C6: assembles the walker's event stream into folders and entities.

use std::collections::BTreeSet;

use clinxml_model::{
    AggregateConfig, AggregateGroup, AggregateResult, ColumnGroup, CriteriaGroup, Entity, Folder,
    ReportColumn, SortConfiguration, Warning,
};
use clinxml_patterns::PatternRegistry;
use clinxml_xml::{WalkError, XmlEvent};

use crate::criterion::{next_event, CriterionParser};
use crate::error::ParseError;

/// The document-level result of walking one EMIS export: every folder and
/// every top-level entity it defines, plus any structural warnings raised
/// along the way (e.g. the orphan column check).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub folders: Vec<Folder>,
    pub entities: Vec<Entity>,
    pub warnings: Vec<Warning>,
}

pub struct StructureParser<'r> {
    registry: &'r PatternRegistry,
}

impl<'r> StructureParser<'r> {
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self { registry }
    }

    pub fn parse<I>(&self, events: I) -> Result<ParsedDocument, ParseError>
    where
        I: Iterator<Item = Result<XmlEvent, WalkError>>,
    {
        let mut events = events.peekable();
        let mut folders = Vec::new();
        let mut entities = Vec::new();
        let mut warnings = Vec::new();

        loop {
            let event = match events.next() {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(ParseError::Walk(e)),
                None => break,
            };
            match event {
                XmlEvent::FolderStart {
                    id,
                    name,
                    parent_id,
                    description,
                } => {
                    let mut folder = Folder::new(id, name);
                    folder.parent_id = parent_id;
                    folder.description = description;
                    skip_until(&mut events, |e| matches!(e, XmlEvent::FolderEnd))?;
                    folders.push(folder);
                }
                XmlEvent::EntityStart {
                    source_type,
                    id,
                    name,
                    description,
                    folder_id,
                    parent_guid,
                } => {
                    let mut entity = Entity::new(id, source_type, name);
                    entity.description = description;
                    entity.folder_id = folder_id;
                    entity.parent_guid = parent_guid;
                    self.parse_entity_body(&mut entity, &mut events, &mut warnings)?;
                    entities.push(entity);
                }
                _ => {}
            }
        }

        Ok(ParsedDocument {
            folders,
            entities,
            warnings,
        })
    }

    fn parse_entity_body<I>(
        &self,
        entity: &mut Entity,
        events: &mut std::iter::Peekable<I>,
        warnings: &mut Vec<Warning>,
    ) -> Result<(), ParseError>
    where
        I: Iterator<Item = Result<XmlEvent, WalkError>>,
    {
        loop {
            let event = next_event(events, "entity")?;
            match event {
                XmlEvent::EntityEnd => return Ok(()),
                XmlEvent::CriteriaGroupStart {
                    operator,
                    action_if_true,
                    action_if_false,
                    score_range,
                } => {
                    let mut group = CriteriaGroup::new(operator);
                    group.action_if_true = action_if_true;
                    group.action_if_false = action_if_false;
                    group.score_range = score_range;
                    self.fill_criteria_group(&mut group, events)?;
                    apply_orphan_column_check(&mut group, entity, warnings);
                    entity.criteria_groups.push(group);
                }
                XmlEvent::ColumnGroupStart {
                    id,
                    display_name,
                    logical_table,
                } => {
                    let mut group = ColumnGroup {
                        id,
                        display_name,
                        logical_table,
                        columns: Vec::new(),
                        sort_configuration: None,
                        criteria: Vec::new(),
                        criteria_summary: None,
                    };
                    self.fill_column_group(&mut group, events)?;
                    entity.column_groups.push(group);
                }
                XmlEvent::AggregateConfigStart { logical_table } => {
                    let mut config = AggregateConfig {
                        groups: Vec::new(),
                        logical_table,
                        result: None,
                        aggregate_criteria: Vec::new(),
                    };
                    self.fill_aggregate_config(&mut config, events)?;
                    entity.aggregate = Some(config);
                }
                XmlEvent::CriterionStart {
                    id,
                    table,
                    column,
                    negation,
                } => {
                    let registry = self.registry;
                    let criterion = CriterionParser::new(registry).parse(
                        id,
                        table.unwrap_or_default(),
                        column,
                        negation,
                        events,
                    )?;
                    entity
                        .report_criteria
                        .get_or_insert_with(Vec::new)
                        .push(criterion);
                }
                XmlEvent::PopulationReference {
                    report_guid,
                    score_weightage,
                } => {
                    entity
                        .population_references
                        .push(clinxml_model::PopulationReference {
                            report_guid,
                            score_weightage,
                        });
                }
                _ => {}
            }
        }
    }

    fn fill_criteria_group<I>(
        &self,
        group: &mut CriteriaGroup,
        events: &mut std::iter::Peekable<I>,
    ) -> Result<(), ParseError>
    where
        I: Iterator<Item = Result<XmlEvent, WalkError>>,
    {
        loop {
            let event = next_event(events, "criteriaGroup")?;
            match event {
                XmlEvent::CriteriaGroupEnd => return Ok(()),
                XmlEvent::CriterionStart {
                    id,
                    table,
                    column,
                    negation,
                } => {
                    let criterion = CriterionParser::new(self.registry).parse(
                        id,
                        table.unwrap_or_default(),
                        column,
                        negation,
                        events,
                    )?;
                    group.criteria.push(criterion);
                }
                XmlEvent::PopulationReference {
                    report_guid,
                    score_weightage,
                } => {
                    group.population_criteria.push(clinxml_model::PopulationReference {
                        report_guid,
                        score_weightage,
                    });
                }
                _ => {}
            }
        }
    }

    fn fill_column_group<I>(
        &self,
        group: &mut ColumnGroup,
        events: &mut std::iter::Peekable<I>,
    ) -> Result<(), ParseError>
    where
        I: Iterator<Item = Result<XmlEvent, WalkError>>,
    {
        loop {
            let event = next_event(events, "columnGroup")?;
            match event {
                XmlEvent::ColumnGroupEnd => return Ok(()),
                XmlEvent::Column { display_name } => {
                    group.columns.push(ReportColumn { display_name });
                }
                XmlEvent::SortConfiguration { direction } => {
                    group.sort_configuration = Some(SortConfiguration { direction });
                }
                XmlEvent::CriterionStart {
                    id,
                    table,
                    column,
                    negation,
                } => {
                    let criterion = CriterionParser::new(self.registry).parse(
                        id,
                        table.unwrap_or_default(),
                        column,
                        negation,
                        events,
                    )?;
                    group.criteria.push(criterion);
                }
                _ => {}
            }
        }
    }

    fn fill_aggregate_config<I>(
        &self,
        config: &mut AggregateConfig,
        events: &mut std::iter::Peekable<I>,
    ) -> Result<(), ParseError>
    where
        I: Iterator<Item = Result<XmlEvent, WalkError>>,
    {
        loop {
            let event = next_event(events, "aggregate")?;
            match event {
                XmlEvent::AggregateConfigEnd => return Ok(()),
                XmlEvent::AggregateGroup {
                    display_name,
                    grouping_column,
                } => config.groups.push(AggregateGroup {
                    display_name,
                    grouping_column,
                }),
                XmlEvent::AggregateResult {
                    source,
                    calculation_type,
                } => {
                    config.result = Some(AggregateResult {
                        source,
                        calculation_type,
                    })
                }
                XmlEvent::CriterionStart {
                    id,
                    table,
                    column,
                    negation,
                } => {
                    let criterion = CriterionParser::new(self.registry).parse(
                        id,
                        table.unwrap_or_default(),
                        column,
                        negation,
                        events,
                    )?;
                    config.aggregate_criteria.push(criterion);
                }
                _ => {}
            }
        }
    }
}

fn skip_until<I>(
    events: &mut std::iter::Peekable<I>,
    is_end: impl Fn(&XmlEvent) -> bool,
) -> Result<(), ParseError>
where
    I: Iterator<Item = Result<XmlEvent, WalkError>>,
{
    loop {
        let event = next_event(events, "folder")?;
        if is_end(&event) {
            return Ok(());
        }
    }
}

/// A linked criterion whose `parent_column` does not name any top-level
/// criterion's column in its own group is retained, but its (child)
/// criterion is flagged rather than silently accepted.
fn apply_orphan_column_check(group: &mut CriteriaGroup, entity: &Entity, warnings: &mut Vec<Warning>) {
    let columns: BTreeSet<String> = group
        .criteria
        .iter()
        .filter_map(|c| c.column.clone())
        .collect();
    for criterion in group.criteria.iter_mut() {
        for linked in criterion.linked_criteria.iter_mut() {
            if !columns.contains(&linked.relationship.parent_column) {
                linked.criterion.warnings.orphan_column = true;
                warnings.push(Warning::new(
                    "structure",
                    format!("entity/{}/criteriaGroup", entity.id),
                    format!(
                        "linked criterion references column `{}` not present in its parent group",
                        linked.relationship.parent_column
                    ),
                ));
            }
        }
    }
}
