//! Walks parsed entities and feeds every value set they carry into a
//! [`CodeStore`], attaching provenance back to the owning search/report,
//! criteria group or column group, and (for linked children) the
//! relationship that nested them.

use clinxml_codestore::CodeStore;
use clinxml_model::{
    CodeEntry, CodeSystem, Criterion, Entity, MappingStatus, Provenance, SourceType, ValueSet,
};

struct SourceContext<'a> {
    source_type: SourceType,
    source_guid: &'a str,
    source_name: &'a str,
    report_type: Option<String>,
}

pub fn collect_code_entries(entities: &[Entity]) -> CodeStore {
    let mut store = CodeStore::new();
    for entity in entities {
        let ctx = SourceContext {
            source_type: entity.source_type,
            source_guid: &entity.id,
            source_name: &entity.name,
            report_type: entity
                .source_type
                .is_report()
                .then(|| entity.source_type.label().to_string()),
        };

        for (idx, group) in entity.criteria_groups.iter().enumerate() {
            let container = format!("criteria_group:{idx}");
            for criterion in &group.criteria {
                collect_criterion(criterion, &ctx, &container, &mut store);
            }
        }
        for group in &entity.column_groups {
            let container = format!("column_group:{}", group.id);
            for criterion in &group.criteria {
                collect_criterion(criterion, &ctx, &container, &mut store);
            }
        }
        if let Some(criteria) = &entity.report_criteria {
            for criterion in criteria {
                collect_criterion(criterion, &ctx, "report_criteria", &mut store);
            }
        }
        if let Some(aggregate) = &entity.aggregate {
            for criterion in &aggregate.aggregate_criteria {
                collect_criterion(criterion, &ctx, "aggregate_criteria", &mut store);
            }
        }
    }
    store
}

fn collect_criterion(criterion: &Criterion, ctx: &SourceContext, container: &str, store: &mut CodeStore) {
    let table_context = Some(criterion.table.clone());

    for value_set in &criterion.value_sets {
        collect_value_set(value_set, ctx, container, table_context.clone(), None, store);
    }
    for filter in &criterion.column_filters {
        let column_context = Some(filter.column_name.clone());
        for value_set in &filter.value_sets {
            collect_value_set(
                value_set,
                ctx,
                container,
                table_context.clone(),
                column_context.clone(),
                store,
            );
        }
    }
    for restriction in &criterion.restrictions {
        if let Some(value_set) = &restriction.value_set_filter {
            collect_value_set(value_set, ctx, container, table_context.clone(), None, store);
        }
    }
    for linked in &criterion.linked_criteria {
        let linked_container = format!("{container}:linked:{}", linked.relationship.parent_column);
        collect_criterion(&linked.criterion, ctx, &linked_container, store);
    }
}

fn collect_value_set(
    value_set: &ValueSet,
    ctx: &SourceContext,
    container: &str,
    table_context: Option<String>,
    column_context: Option<String>,
    store: &mut CodeStore,
) {
    let provenance = Provenance {
        source_type: ctx.source_type,
        source_guid: ctx.source_guid.to_string(),
        source_name: ctx.source_name.to_string(),
        source_container: container.to_string(),
        report_type: ctx.report_type.clone(),
    };

    if value_set.is_library_item {
        store.insert(CodeEntry {
            emis_guid: value_set.library_item_id.clone().unwrap_or_default(),
            value_set_guid: value_set.value_set_guid.clone(),
            value_set_description: value_set.value_set_description.clone(),
            code_system: value_set.code_system.clone(),
            xml_display_name: value_set.value_set_description.clone(),
            include_children: value_set.include_children,
            is_refset: value_set.is_refset,
            is_pseudorefset: value_set.is_pseudo_refset,
            is_pseudomember: value_set.is_pseudo_member,
            is_emisinternal: value_set.code_system.is_emis_internal(),
            is_medication: value_set.code_system == CodeSystem::Emis,
            is_library_item: true,
            inactive: value_set.inactive,
            table_context,
            column_context,
            provenance: vec![provenance],
            snomed_code: None,
            snomed_description: None,
            descendants: None,
            has_qualifier: None,
            code_type: None,
            is_parent: None,
            mapping_status: MappingStatus::default(),
        });
        return;
    }

    for code in &value_set.values {
        store.insert(CodeEntry {
            emis_guid: code.code_value.clone(),
            value_set_guid: value_set.value_set_guid.clone(),
            value_set_description: value_set.value_set_description.clone(),
            code_system: code.code_system.clone(),
            xml_display_name: code.display_name.clone(),
            include_children: code.include_children,
            is_refset: value_set.is_refset,
            is_pseudorefset: value_set.is_pseudo_refset,
            is_pseudomember: value_set.is_pseudo_member,
            is_emisinternal: code.code_system.is_emis_internal(),
            is_medication: code.code_system == CodeSystem::Emis,
            is_library_item: false,
            inactive: code.inactive,
            table_context: table_context.clone(),
            column_context: column_context.clone(),
            provenance: vec![provenance.clone()],
            snomed_code: None,
            snomed_description: None,
            descendants: None,
            has_qualifier: None,
            code_type: None,
            is_parent: None,
            mapping_status: MappingStatus::default(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinxml_model::{CodeValue, CriteriaGroup, Operator};

    fn clinical_value_set(guid: &str, code: &str) -> ValueSet {
        ValueSet {
            value_set_guid: Some(guid.to_string()),
            value_set_description: Some("Diabetes".to_string()),
            code_system: CodeSystem::Sct,
            include_children: true,
            is_refset: false,
            is_pseudo_refset: false,
            is_pseudo_member: false,
            is_library_item: false,
            inactive: false,
            values: vec![CodeValue {
                code_value: code.to_string(),
                display_name: Some("Diabetes mellitus".to_string()),
                include_children: true,
                inactive: false,
                code_system: CodeSystem::Sct,
            }],
            library_item_id: None,
        }
    }

    #[test]
    fn test_collects_top_level_value_set_with_provenance() {
        let mut entity = Entity::new("s1", SourceType::Search, "Diabetics");
        let mut group = CriteriaGroup::new(Operator::And);
        let mut criterion = Criterion::new("EVENTS");
        criterion.value_sets.push(clinical_value_set("VS1", "G1"));
        group.criteria.push(criterion);
        entity.criteria_groups.push(group);

        let store = collect_code_entries(&[entity]);
        let rows = store.flatten(clinxml_codestore::View::UniqueCodes);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].emis_guid, "G1");
        assert_eq!(rows[0].provenance[0].source_container, "criteria_group:0");
        assert_eq!(rows[0].provenance[0].source_guid, "s1");
    }

    #[test]
    fn test_library_item_collects_single_opaque_entry() {
        let mut entity = Entity::new("s1", SourceType::Search, "Diabetics");
        let mut group = CriteriaGroup::new(Operator::And);
        let mut criterion = Criterion::new("EVENTS");
        criterion.value_sets.push(ValueSet {
            is_library_item: true,
            library_item_id: Some("LIB1".to_string()),
            ..clinical_value_set("VS1", "G1")
        });
        criterion.value_sets[0].values.clear();
        group.criteria.push(criterion);
        entity.criteria_groups.push(group);

        let store = collect_code_entries(&[entity]);
        let rows = store.flatten(clinxml_codestore::View::UniqueCodes);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].emis_guid, "LIB1");
        assert!(rows[0].is_library_item);
    }

    #[test]
    fn test_linked_criterion_container_names_the_relationship() {
        let mut entity = Entity::new("s1", SourceType::Search, "Diabetics");
        let mut group = CriteriaGroup::new(Operator::And);
        let mut parent = Criterion::new("EVENTS");
        let mut child = Criterion::new("EVENTS");
        child.value_sets.push(clinical_value_set("VS2", "G2"));
        parent.linked_criteria.push(clinxml_model::LinkedChild {
            relationship: clinxml_model::Relationship {
                parent_column: "DATE".to_string(),
                child_column: "DATE".to_string(),
                temporal: None,
            },
            criterion: Box::new(child),
        });
        group.criteria.push(parent);
        entity.criteria_groups.push(group);

        let store = collect_code_entries(&[entity]);
        let rows = store.flatten(clinxml_codestore::View::UniqueCodes);
        assert_eq!(rows[0].provenance[0].source_container, "criteria_group:0:linked:DATE");
    }
}
