//! C3: a namespace-agnostic, depth-first, pull-based walk over an EMIS
//! clinical-search document.
//!
//! A `quick_xml::Reader` drives a `buf`-reusing event loop, and local names
//! are compared with namespace prefixes stripped so callers never see the
//! EMIS namespace.

use std::io::BufRead;

use clinxml_model::{
    ActionIfTrue, CodeSystem, InNotIn, Operator, ParameterScope, Relation, ScoreRange,
    SortDirection, SourceType, Temporal, TemporalComparator, TemporalOperator, TemporalUnit,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::WalkError;
use crate::event::{
    RawCodeValue, RawColumnFilter, RawRangeBound, RawRangeInfo, RawRestriction, RawValueSet,
    XmlEvent,
};

/// A single depth-first, pull-based traversal over one document. Lazy,
/// finite, non-restartable: once exhausted, construct a new walker to
/// re-read the same text.
pub struct XmlWalker<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    pending: std::collections::VecDeque<XmlEvent>,
    done: bool,
}

impl<'a> XmlWalker<std::io::Cursor<&'a [u8]>> {
    pub fn new(text: &'a str) -> Self {
        let mut reader = Reader::from_reader(std::io::Cursor::new(text.as_bytes()));
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            pending: std::collections::VecDeque::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for XmlWalker<R> {
    type Item = Result<XmlEvent, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(Ok(event));
        }
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Eof) => {
                    self.done = true;
                    return None;
                }
                Ok(event) => event,
                Err(e) => {
                    self.done = true;
                    return Some(Err(WalkError::MalformedXml {
                        offset: self.reader.buffer_position() as usize,
                        message: e.to_string(),
                    }));
                }
            };

            match event {
                Event::Start(start) => match self.start_event(&start, false) {
                    Ok(Some(mapped)) => return Some(Ok(mapped)),
                    Ok(None) => continue,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
                Event::Empty(start) => {
                    let name = local_name(start.name().as_ref()).to_string();
                    match self.start_event(&start, true) {
                        Ok(Some(mapped)) => {
                            if let Some(end) = self.end_event(&name) {
                                self.pending.push_back(end);
                            }
                            return Some(Ok(mapped));
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
                Event::End(end) => match self.end_event(local_name(end.name().as_ref())) {
                    Some(mapped) => return Some(Ok(mapped)),
                    None => continue,
                },
                _ => continue,
            }
        }
    }
}

fn local_name(qname: &[u8]) -> &str {
    let name = std::str::from_utf8(qname).unwrap_or("");
    match name.rfind(':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

fn attr(start: &BytesStart, name: &str) -> Option<String> {
    start.attributes().filter_map(|a| a.ok()).find_map(|a| {
        if local_name(a.key.as_ref()) == name {
            Some(String::from_utf8_lossy(&a.value).into_owned())
        } else {
            None
        }
    })
}

fn attr_bool(start: &BytesStart, name: &str) -> bool {
    attr(start, name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

impl<R: BufRead> XmlWalker<R> {
    /// Handles a `Start`/`Empty` tag. For leaf subtrees that are modelled
    /// as a single flat event (`valueSet`, `columnFilter`, `restriction`),
    /// this buffers the whole subtree via [`Self::read_value_set`] etc. and
    /// returns it as one event; for structural tags it emits a `*Start`
    /// event directly. `is_empty` distinguishes a self-closing tag (no
    /// subtree to read at all) from one whose children still need reading.
    fn start_event(&mut self, start: &BytesStart, is_empty: bool) -> Result<Option<XmlEvent>, WalkError> {
        let name = local_name(start.name().as_ref()).to_string();
        match name.as_str() {
            "folder" => Ok(Some(XmlEvent::FolderStart {
                id: attr(start, "id").unwrap_or_default(),
                name: attr(start, "name").unwrap_or_default(),
                parent_id: attr(start, "parentId"),
                description: attr(start, "description"),
            })),
            "search" => Ok(Some(XmlEvent::EntityStart {
                source_type: SourceType::Search,
                id: attr(start, "id").unwrap_or_default(),
                name: attr(start, "name").unwrap_or_default(),
                description: attr(start, "description"),
                folder_id: attr(start, "folderId"),
                parent_guid: attr(start, "parentGuid"),
            })),
            "report" => {
                let source_type = match attr(start, "type").as_deref() {
                    Some("audit") => SourceType::AuditReport,
                    Some("aggregate") => SourceType::AggregateReport,
                    _ => SourceType::ListReport,
                };
                Ok(Some(XmlEvent::EntityStart {
                    source_type,
                    id: attr(start, "id").unwrap_or_default(),
                    name: attr(start, "name").unwrap_or_default(),
                    description: attr(start, "description"),
                    folder_id: attr(start, "folderId"),
                    parent_guid: attr(start, "parentGuid"),
                }))
            }
            "criteriaGroup" => {
                let operator = match attr(start, "op").as_deref() {
                    Some("OR") => Operator::Or,
                    Some("SCORE") => Operator::Score,
                    _ => Operator::And,
                };
                let score_range = if operator == Operator::Score {
                    Some(ScoreRange {
                        min: attr(start, "scoreMin").and_then(|v| v.parse().ok()),
                        max: attr(start, "scoreMax").and_then(|v| v.parse().ok()),
                    })
                } else {
                    None
                };
                Ok(Some(XmlEvent::CriteriaGroupStart {
                    operator,
                    action_if_true: parse_action(attr(start, "actionIfTrue").as_deref()),
                    action_if_false: parse_action(attr(start, "actionIfFalse").as_deref()),
                    score_range,
                }))
            }
            "criterion" => Ok(Some(XmlEvent::CriterionStart {
                id: attr(start, "id"),
                table: attr(start, "table"),
                column: attr(start, "column"),
                negation: attr_bool(start, "negate"),
            })),
            "valueSet" => Ok(Some(XmlEvent::ValueSet(if is_empty {
                empty_value_set(start)
            } else {
                self.read_value_set(start)?
            }))),
            "columnFilter" => Ok(Some(XmlEvent::ColumnFilter(if is_empty {
                empty_column_filter(start)
            } else {
                self.read_column_filter(start)?
            }))),
            "restriction" => Ok(Some(XmlEvent::Restriction(if is_empty {
                empty_restriction(start)
            } else {
                self.read_restriction(start)?
            }))),
            "linkedCriterion" => Ok(Some(XmlEvent::LinkedCriterionStart {
                parent_column: attr(start, "parentColumn").unwrap_or_default(),
                child_column: attr(start, "childColumn").unwrap_or_default(),
                temporal: self.read_optional_temporal(start)?,
            })),
            "populationReference" => Ok(Some(XmlEvent::PopulationReference {
                report_guid: attr(start, "reportGuid").unwrap_or_default(),
                score_weightage: attr(start, "scoreWeightage").and_then(|v| v.parse().ok()),
            })),
            "columnGroup" => Ok(Some(XmlEvent::ColumnGroupStart {
                id: attr(start, "id").unwrap_or_default(),
                display_name: attr(start, "displayName").unwrap_or_default(),
                logical_table: attr(start, "logicalTable").unwrap_or_default(),
            })),
            "column" => Ok(Some(XmlEvent::Column {
                display_name: attr(start, "displayName").unwrap_or_default(),
            })),
            "sortConfiguration" => Ok(Some(XmlEvent::SortConfiguration {
                direction: match attr(start, "direction").as_deref() {
                    Some("DESC") => SortDirection::Desc,
                    _ => SortDirection::Asc,
                },
            })),
            "aggregate" => Ok(Some(XmlEvent::AggregateConfigStart {
                logical_table: attr(start, "logicalTable"),
            })),
            "group" => Ok(Some(XmlEvent::AggregateGroup {
                display_name: attr(start, "displayName").unwrap_or_default(),
                grouping_column: attr(start, "groupingColumn"),
            })),
            "result" => Ok(Some(XmlEvent::AggregateResult {
                source: attr(start, "source").unwrap_or_default(),
                calculation_type: attr(start, "calculationType").unwrap_or_default(),
            })),
            "parameter" => Ok(Some(XmlEvent::Parameter {
                name: attr(start, "name").unwrap_or_default(),
                scope: match attr(start, "scope").as_deref() {
                    Some("local") => ParameterScope::Local,
                    _ => ParameterScope::Global,
                },
            })),
            _ => Ok(None),
        }
    }

    fn end_event(&mut self, name: &str) -> Option<XmlEvent> {
        match name {
            "folder" => Some(XmlEvent::FolderEnd),
            "search" | "report" => Some(XmlEvent::EntityEnd),
            "criteriaGroup" => Some(XmlEvent::CriteriaGroupEnd),
            "criterion" => Some(XmlEvent::CriterionEnd),
            "linkedCriterion" => Some(XmlEvent::LinkedCriterionEnd),
            "columnGroup" => Some(XmlEvent::ColumnGroupEnd),
            "aggregate" => Some(XmlEvent::AggregateConfigEnd),
            _ => None,
        }
    }

    /// Reads a complete `<valueSet>...</valueSet>` subtree: direct child
    /// elements `<refset>`, `<pseudoRefset>`, `<libraryItem>`, and a
    /// `<values codeSystem="...">` block of `<value>` leaves.
    fn read_value_set(&mut self, start: &BytesStart) -> Result<RawValueSet, WalkError> {
        let mut value_set = RawValueSet {
            value_set_guid: attr(start, "id"),
            value_set_description: attr(start, "description"),
            code_system: CodeSystem::from_raw(attr(start, "codeSystem").as_deref().unwrap_or("SCT")),
            include_children: attr_bool(start, "includeChildren"),
            is_refset: false,
            is_pseudo_refset: false,
            is_pseudo_member: attr_bool(start, "isPseudoMember"),
            is_library_item: false,
            inactive: attr_bool(start, "inactive"),
            values: Vec::new(),
            library_item_id: None,
        };

        let mut depth = 0usize;
        let mut current_values_system: Option<CodeSystem> = None;
        let mut current_bool_tag: Option<String> = None;
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf).map_err(|e| {
                WalkError::MalformedXml {
                    offset: self.reader.buffer_position() as usize,
                    message: e.to_string(),
                }
            })? {
                Event::Eof => {
                    return Err(WalkError::UnexpectedEof {
                        element: "valueSet".to_string(),
                    })
                }
                Event::Start(tag) => {
                    depth += 1;
                    match local_name(tag.name().as_ref()) {
                        "values" => {
                            current_values_system = Some(CodeSystem::from_raw(
                                attr(&tag, "codeSystem").as_deref().unwrap_or("SCT"),
                            ));
                        }
                        "libraryItem" => {
                            value_set.is_library_item = true;
                            value_set.library_item_id = attr(&tag, "id");
                        }
                        name @ ("refset" | "pseudoRefset") => {
                            current_bool_tag = Some(name.to_string());
                        }
                        _ => {}
                    }
                }
                Event::Empty(tag) => match local_name(tag.name().as_ref()) {
                    "value" => {
                        value_set.values.push(RawCodeValue {
                            code_value: attr(&tag, "guid").unwrap_or_default(),
                            display_name: attr(&tag, "displayName"),
                            include_children: attr_bool(&tag, "includeChildren"),
                            inactive: attr_bool(&tag, "inactive"),
                            code_system: current_values_system
                                .clone()
                                .unwrap_or_else(|| value_set.code_system.clone()),
                        });
                    }
                    "libraryItem" => {
                        value_set.is_library_item = true;
                        value_set.library_item_id = attr(&tag, "id");
                    }
                    _ => {}
                },
                Event::Text(text) => {
                    if let Some(tag_name) = current_bool_tag.as_deref() {
                        let is_true = text
                            .unescape()
                            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                            .unwrap_or(false);
                        match tag_name {
                            "refset" => value_set.is_refset = is_true,
                            "pseudoRefset" => value_set.is_pseudo_refset = is_true,
                            _ => {}
                        }
                    }
                }
                Event::End(tag) => {
                    let ended = local_name(tag.name().as_ref());
                    if ended == "valueSet" && depth == 0 {
                        return Ok(value_set);
                    }
                    if ended == "values" {
                        current_values_system = None;
                    }
                    if ended == "refset" || ended == "pseudoRefset" {
                        current_bool_tag = None;
                    }
                    if depth > 0 {
                        depth -= 1;
                    }
                }
                _ => {}
            }
        }
    }

    /// Reads a complete `<columnFilter>...</columnFilter>` subtree,
    /// collecting nested `<rangeInfo>` and `<valueSet>` children.
    fn read_column_filter(&mut self, start: &BytesStart) -> Result<RawColumnFilter, WalkError> {
        let mut filter = RawColumnFilter {
            column_name: attr(start, "columnName").unwrap_or_default(),
            column_display: attr(start, "columnDisplay"),
            filter_type_hint: attr(start, "filterType"),
            in_not_in: attr(start, "inNotIn").as_deref().map(|v| {
                if v.eq_ignore_ascii_case("NOT_IN") {
                    InNotIn::NotIn
                } else {
                    InNotIn::In
                }
            }),
            range_info: None,
            value_sets: Vec::new(),
        };

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf).map_err(|e| {
                WalkError::MalformedXml {
                    offset: self.reader.buffer_position() as usize,
                    message: e.to_string(),
                }
            })? {
                Event::Eof => {
                    return Err(WalkError::UnexpectedEof {
                        element: "columnFilter".to_string(),
                    })
                }
                Event::Start(tag) if local_name(tag.name().as_ref()) == "valueSet" => {
                    filter.value_sets.push(self.read_value_set(&tag)?);
                }
                Event::Empty(tag) if local_name(tag.name().as_ref()) == "rangeInfo" => {
                    filter.range_info = Some(RawRangeInfo {
                        from: parse_bound(&tag, "from", "fromRelation"),
                        to: parse_bound(&tag, "to", "toRelation"),
                        relative_to: attr(&tag, "relativeTo"),
                    });
                }
                Event::End(tag) if local_name(tag.name().as_ref()) == "columnFilter" => {
                    return Ok(filter)
                }
                _ => {}
            }
        }
    }

    fn read_restriction(&mut self, start: &BytesStart) -> Result<RawRestriction, WalkError> {
        let mut restriction = RawRestriction {
            kind_hint: attr(start, "kind").unwrap_or_default(),
            direction: match attr(start, "direction").as_deref() {
                Some("DESC") => SortDirection::Desc,
                _ => SortDirection::Asc,
            },
            record_count: attr(start, "recordCount").and_then(|v| v.parse().ok()),
            column: attr(start, "column"),
            value_set_filter: None,
        };

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf).map_err(|e| {
                WalkError::MalformedXml {
                    offset: self.reader.buffer_position() as usize,
                    message: e.to_string(),
                }
            })? {
                Event::Eof => {
                    return Err(WalkError::UnexpectedEof {
                        element: "restriction".to_string(),
                    })
                }
                Event::Start(tag) if local_name(tag.name().as_ref()) == "valueSet" => {
                    restriction.value_set_filter = Some(self.read_value_set(&tag)?);
                }
                Event::End(tag) if local_name(tag.name().as_ref()) == "restriction" => {
                    return Ok(restriction)
                }
                _ => {}
            }
        }
    }

    fn read_optional_temporal(
        &mut self,
        start: &BytesStart,
    ) -> Result<Option<Temporal>, WalkError> {
        let operator = match attr(start, "temporalOperator").as_deref() {
            Some("before") => Some(TemporalOperator::Before),
            Some("after") => Some(TemporalOperator::After),
            Some("within") => Some(TemporalOperator::Within),
            _ => None,
        };
        let Some(operator) = operator else {
            return Ok(None);
        };
        let offset_unit = match attr(start, "offsetUnit").as_deref() {
            Some("week") => TemporalUnit::Week,
            Some("month") => TemporalUnit::Month,
            Some("year") => TemporalUnit::Year,
            _ => TemporalUnit::Day,
        };
        let comparator = match attr(start, "comparator").as_deref() {
            Some("greater") => TemporalComparator::Greater,
            Some("less") => TemporalComparator::Less,
            Some("equal") => TemporalComparator::Equal,
            _ => TemporalComparator::Same,
        };
        Ok(Some(Temporal {
            operator,
            offset_value: attr(start, "offsetValue")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            offset_unit,
            comparator,
        }))
    }
}

/// Builds a [`RawValueSet`] from a self-closing `<valueSet/>` tag, which by
/// definition has no `<values>`/`<refset>`/`<libraryItem>` children.
fn empty_value_set(start: &BytesStart) -> RawValueSet {
    RawValueSet {
        value_set_guid: attr(start, "id"),
        value_set_description: attr(start, "description"),
        code_system: CodeSystem::from_raw(attr(start, "codeSystem").as_deref().unwrap_or("SCT")),
        include_children: attr_bool(start, "includeChildren"),
        is_refset: false,
        is_pseudo_refset: false,
        is_pseudo_member: attr_bool(start, "isPseudoMember"),
        is_library_item: false,
        inactive: attr_bool(start, "inactive"),
        values: Vec::new(),
        library_item_id: None,
    }
}

/// Builds a [`RawColumnFilter`] from a self-closing `<columnFilter/>` tag,
/// which has no `<rangeInfo>`/`<valueSet>` children.
fn empty_column_filter(start: &BytesStart) -> RawColumnFilter {
    RawColumnFilter {
        column_name: attr(start, "columnName").unwrap_or_default(),
        column_display: attr(start, "columnDisplay"),
        filter_type_hint: attr(start, "filterType"),
        in_not_in: attr(start, "inNotIn").as_deref().map(|v| {
            if v.eq_ignore_ascii_case("NOT_IN") {
                InNotIn::NotIn
            } else {
                InNotIn::In
            }
        }),
        range_info: None,
        value_sets: Vec::new(),
    }
}

/// Builds a [`RawRestriction`] from a self-closing `<restriction/>` tag,
/// which has no nested `<valueSet>` filter.
fn empty_restriction(start: &BytesStart) -> RawRestriction {
    RawRestriction {
        kind_hint: attr(start, "kind").unwrap_or_default(),
        direction: match attr(start, "direction").as_deref() {
            Some("DESC") => SortDirection::Desc,
            _ => SortDirection::Asc,
        },
        record_count: attr(start, "recordCount").and_then(|v| v.parse().ok()),
        column: attr(start, "column"),
        value_set_filter: None,
    }
}

fn parse_bound(tag: &BytesStart, value_attr: &str, relation_attr: &str) -> Option<RawRangeBound> {
    let value = attr(tag, value_attr)?;
    let relation = match attr(tag, relation_attr).as_deref() {
        Some("lt") => Relation::LessThan,
        Some("lte") => Relation::LessThanOrEqual,
        Some("gte") => Relation::GreaterThanOrEqual,
        Some("gt") => Relation::GreaterThan,
        _ => Relation::Equal,
    };
    Some(RawRangeBound { value, relation })
}

fn parse_action(value: Option<&str>) -> ActionIfTrue {
    match value {
        Some("NEXT") => ActionIfTrue::Next,
        Some("REJECT") => ActionIfTrue::Reject,
        _ => ActionIfTrue::Select,
    }
}
