//! Flat per-entity enrichment: names resolved for every id reference,
//! alongside the entity's folder breadcrumb and human-readable type.

use std::collections::{BTreeMap, HashMap};

use clinxml_model::{Entity, SourceType};

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedEntity {
    pub id: String,
    pub name: String,
    pub type_label: &'static str,
    pub folder_id: Option<String>,
    pub folder_path: Vec<String>,
    pub dependency_ids: Vec<String>,
    pub dependency_names: Vec<String>,
    pub dependent_ids: Vec<String>,
    pub dependent_names: Vec<String>,
}

fn resolve_names(ids: &[String], names_by_id: &HashMap<&str, &str>) -> Vec<String> {
    ids.iter()
        .map(|id| names_by_id.get(id.as_str()).map(|n| n.to_string()).unwrap_or_else(|| id.clone()))
        .collect()
}

fn enrich_one(
    entity: &Entity,
    graph: &BTreeMap<String, Vec<String>>,
    dependents: &HashMap<String, Vec<String>>,
    folder_paths: &HashMap<String, Vec<String>>,
    names_by_id: &HashMap<&str, &str>,
) -> EnrichedEntity {
    let dependency_ids = graph.get(&entity.id).cloned().unwrap_or_default();
    let dependent_ids = dependents.get(&entity.id).cloned().unwrap_or_default();
    let folder_path = entity
        .folder_id
        .as_deref()
        .and_then(|fid| folder_paths.get(fid))
        .cloned()
        .unwrap_or_default();

    EnrichedEntity {
        id: entity.id.clone(),
        name: entity.name.clone(),
        type_label: entity.source_type.label(),
        folder_id: entity.folder_id.clone(),
        folder_path,
        dependency_names: resolve_names(&dependency_ids, names_by_id),
        dependency_ids,
        dependent_names: resolve_names(&dependent_ids, names_by_id),
        dependent_ids,
    }
}

/// Enriches every entity matching `filter` (searches, or the report kinds).
pub fn enrich_entities(
    entities: &[Entity],
    filter: impl Fn(SourceType) -> bool,
    graph: &BTreeMap<String, Vec<String>>,
    dependents: &HashMap<String, Vec<String>>,
    folder_paths: &HashMap<String, Vec<String>>,
) -> Vec<EnrichedEntity> {
    let names_by_id: HashMap<&str, &str> =
        entities.iter().map(|e| (e.id.as_str(), e.name.as_str())).collect();

    entities
        .iter()
        .filter(|e| filter(e.source_type))
        .map(|e| enrich_one(e, graph, dependents, folder_paths, &names_by_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{dependency_graph, dependents as dependents_of, folder_paths};
    use clinxml_model::{Folder, PopulationReference};

    #[test]
    fn test_enrich_searches_resolves_folder_path_and_dependency_names() {
        let folders = vec![Folder::new("f1", "Diabetes")];
        let mut base = Entity::new("s1", SourceType::Search, "Base");
        base.folder_id = Some("f1".to_string());
        let mut refinement = Entity::new("s2", SourceType::Search, "Refinement");
        refinement.folder_id = Some("f1".to_string());
        refinement.parent_guid = Some("s1".to_string());

        let entities = vec![base, refinement];
        let graph = dependency_graph(&entities);
        let dependents = dependents_of(&graph);
        let paths = folder_paths(&folders);

        let enriched = enrich_entities(
            &entities,
            |t| t == SourceType::Search,
            &graph,
            &dependents,
            &paths,
        );

        let refinement = enriched.iter().find(|e| e.id == "s2").unwrap();
        assert_eq!(refinement.dependency_names, vec!["Base".to_string()]);
        assert_eq!(refinement.folder_path, vec!["Diabetes".to_string()]);

        let base = enriched.iter().find(|e| e.id == "s1").unwrap();
        assert_eq!(base.dependent_names, vec!["Refinement".to_string()]);
    }

    #[test]
    fn test_enrich_reports_filters_to_report_kinds_only() {
        let mut search = Entity::new("s1", SourceType::Search, "Base");
        let mut report = Entity::new("r1", SourceType::ListReport, "Report");
        report.population_references.push(PopulationReference {
            report_guid: "s1".to_string(),
            score_weightage: None,
        });
        search.folder_id = None;

        let entities = vec![search, report];
        let graph = dependency_graph(&entities);
        let dependents = dependents_of(&graph);
        let paths = folder_paths(&[]);

        let enriched = enrich_entities(&entities, SourceType::is_report, &graph, &dependents, &paths);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].id, "r1");
        assert_eq!(enriched[0].dependency_names, vec!["Base".to_string()]);
    }
}
