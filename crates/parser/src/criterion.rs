//! C5: the criterion state machine.

use clinxml_model::{Criterion, LinkedChild, Parameter, Relationship};
use clinxml_patterns::{CriterionDraft, PatternRegistry};
use clinxml_xml::{WalkError, XmlEvent};

use crate::error::ParseError;
use crate::resolve::{
    resolve_column_filter, resolve_restriction, resolve_value_set, suppress_duplicate_column_filters,
};

/// Parses one `CriterionStart .. CriterionEnd` region, recursing into any
/// nested `LinkedCriterionStart .. LinkedCriterionEnd` regions to build
/// linked children. The parent draft never sees a linked child's value
/// sets or column filters directly — they live only inside the child's own
/// `Criterion`.
pub struct CriterionParser<'r> {
    registry: &'r PatternRegistry,
}

impl<'r> CriterionParser<'r> {
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self { registry }
    }

    pub fn parse<I>(
        &self,
        id: Option<String>,
        table: String,
        column: Option<String>,
        negation: bool,
        events: &mut std::iter::Peekable<I>,
    ) -> Result<Criterion, ParseError>
    where
        I: Iterator<Item = Result<XmlEvent, WalkError>>,
    {
        let mut draft = CriterionDraft::new(table);
        draft.id = id;
        draft.column = column;
        draft.negation = negation;

        loop {
            let event = next_event(events, "criterion")?;
            match event {
                XmlEvent::CriterionEnd => break,
                XmlEvent::ValueSet(raw) => {
                    draft.value_sets.push(resolve_value_set(raw, &mut draft.warnings))
                }
                XmlEvent::ColumnFilter(raw) => draft
                    .column_filters
                    .push(resolve_column_filter(raw, &mut draft.warnings)),
                XmlEvent::Restriction(raw) => draft
                    .restrictions
                    .push(resolve_restriction(raw, &mut draft.warnings)),
                XmlEvent::Parameter { name, scope } => {
                    draft.parameters.push(Parameter { name, scope })
                }
                XmlEvent::LinkedCriterionStart {
                    parent_column,
                    child_column,
                    temporal,
                } => {
                    let child = self.parse_linked_child(events)?;
                    draft.linked_criteria.push(LinkedChild {
                        relationship: Relationship {
                            parent_column,
                            child_column,
                            temporal,
                        },
                        criterion: Box::new(child),
                    });
                }
                _ => {
                    // Events that don't belong inside a criterion (should not
                    // occur with a well-formed document) are ignored rather
                    // than aborting the whole parse.
                }
            }
        }

        self.registry.apply(&mut draft);
        suppress_duplicate_column_filters(&draft.value_sets, &mut draft.column_filters);

        Ok(Criterion {
            id: draft.id,
            table: draft.table,
            column: draft.column,
            negation: draft.negation,
            flags: draft.flags,
            column_filters: draft.column_filters,
            value_sets: draft.value_sets,
            linked_criteria: draft.linked_criteria,
            restrictions: draft.restrictions,
            parameters: draft.parameters,
            warnings: draft.warnings,
        })
    }

    fn parse_linked_child<I>(
        &self,
        events: &mut std::iter::Peekable<I>,
    ) -> Result<Criterion, ParseError>
    where
        I: Iterator<Item = Result<XmlEvent, WalkError>>,
    {
        let start = next_event(events, "linkedCriterion")?;
        let XmlEvent::CriterionStart {
            id,
            table,
            column,
            negation,
        } = start
        else {
            return Err(ParseError::MissingRequiredElement {
                element: "linkedCriterion".to_string(),
                path: "linkedCriterion".to_string(),
                field: "criterion".to_string(),
            });
        };
        let child = self.parse(id, table.unwrap_or_default(), column, negation, events)?;
        let end = next_event(events, "linkedCriterion")?;
        if !matches!(end, XmlEvent::LinkedCriterionEnd) {
            return Err(ParseError::MissingRequiredElement {
                element: "linkedCriterion".to_string(),
                path: "linkedCriterion".to_string(),
                field: "end tag".to_string(),
            });
        }
        Ok(child)
    }
}

pub(crate) fn next_event<I>(
    events: &mut std::iter::Peekable<I>,
    element: &str,
) -> Result<XmlEvent, ParseError>
where
    I: Iterator<Item = Result<XmlEvent, WalkError>>,
{
    match events.next() {
        Some(Ok(event)) => Ok(event),
        Some(Err(e)) => Err(ParseError::Walk(e)),
        None => Err(ParseError::UnexpectedEof {
            element: element.to_string(),
        }),
    }
}
