//! Folder breadcrumbs and entity dependency graphs.

use std::collections::{BTreeMap, HashMap, HashSet};

use clinxml_model::{Entity, Folder};

/// Maps every folder id to the ordered list of folder names from the forest
/// root down to (and including) that folder, e.g. `["Long Term Conditions",
/// "Diabetes"]`. A folder whose ancestor chain does not terminate (a dangling
/// or cyclic `parent_id`) stops at the point the cycle is detected rather
/// than looping forever.
pub fn folder_paths(folders: &[Folder]) -> HashMap<String, Vec<String>> {
    let by_id: HashMap<&str, &Folder> = folders.iter().map(|f| (f.id.as_str(), f)).collect();
    let mut paths = HashMap::with_capacity(folders.len());

    for folder in folders {
        let mut breadcrumb = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(folder);
        while let Some(f) = current {
            if !visited.insert(f.id.as_str()) {
                tracing::debug!(folder_id = %folder.id, "folder ancestor chain cycles; truncating breadcrumb");
                break;
            }
            breadcrumb.push(f.name.clone());
            current = f
                .parent_id
                .as_deref()
                .and_then(|parent_id| by_id.get(parent_id).copied());
        }
        breadcrumb.reverse();
        paths.insert(folder.id.clone(), breadcrumb);
    }

    paths
}

/// The ids an entity depends on, in declaration order: its `parent_guid`
/// first (if any), then the searches behind its population references.
/// Linked criteria are not dependencies — they already belong wholly to
/// their parent criterion's own entity.
fn raw_dependencies(entity: &Entity) -> Vec<String> {
    let mut deps = Vec::new();
    if let Some(parent) = &entity.parent_guid {
        deps.push(parent.clone());
    }
    for population_reference in &entity.population_references {
        deps.push(population_reference.report_guid.clone());
    }
    dedup_preserve_order(deps)
}

fn dedup_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Entity id -> ids it depends on. Entities with no dependencies are not
/// present as keys at all (an empty adjacency list carries no information
/// a caller couldn't get from absence).
pub fn dependency_graph(entities: &[Entity]) -> BTreeMap<String, Vec<String>> {
    let mut graph = BTreeMap::new();
    for entity in entities {
        let deps = raw_dependencies(entity);
        if !deps.is_empty() {
            graph.insert(entity.id.clone(), deps);
        }
    }
    graph
}

/// The reverse of [`dependency_graph`]: entity id -> ids that depend on it.
pub fn dependents(graph: &BTreeMap<String, Vec<String>>) -> HashMap<String, Vec<String>> {
    let mut reverse: HashMap<String, Vec<String>> = HashMap::new();
    for (dependent, deps) in graph {
        for dep in deps {
            reverse.entry(dep.clone()).or_default().push(dependent.clone());
        }
    }
    reverse
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinxml_model::{PopulationReference, SourceType};

    fn folder(id: &str, name: &str, parent: Option<&str>) -> Folder {
        let mut f = Folder::new(id, name);
        f.parent_id = parent.map(|p| p.to_string());
        f
    }

    #[test]
    fn test_folder_paths_builds_breadcrumb_to_root() {
        let folders = vec![
            folder("f1", "Long Term Conditions", None),
            folder("f2", "Diabetes", Some("f1")),
        ];
        let paths = folder_paths(&folders);
        assert_eq!(
            paths.get("f2").unwrap(),
            &vec!["Long Term Conditions".to_string(), "Diabetes".to_string()]
        );
        assert_eq!(paths.get("f1").unwrap(), &vec!["Long Term Conditions".to_string()]);
    }

    #[test]
    fn test_folder_paths_tolerates_cycle() {
        let folders = vec![folder("f1", "A", Some("f2")), folder("f2", "B", Some("f1"))];
        let paths = folder_paths(&folders);
        assert_eq!(paths.get("f1").unwrap().len(), 2);
    }

    #[test]
    fn test_dependency_graph_only_includes_nonempty_entries() {
        let mut with_parent = Entity::new("e2", SourceType::Search, "Child");
        with_parent.parent_guid = Some("e1".to_string());
        let standalone = Entity::new("e1", SourceType::Search, "Root");
        let mut with_population = Entity::new("e3", SourceType::ListReport, "Report");
        with_population.population_references.push(PopulationReference {
            report_guid: "e1".to_string(),
            score_weightage: None,
        });

        let entities = vec![standalone, with_parent, with_population];
        let graph = dependency_graph(&entities);

        assert_eq!(graph.get("e2").unwrap(), &vec!["e1".to_string()]);
        assert_eq!(graph.get("e3").unwrap(), &vec!["e1".to_string()]);
        assert!(!graph.contains_key("e1"));
    }

    #[test]
    fn test_dependency_graph_dedups_parent_and_population_overlap() {
        let mut entity = Entity::new("e2", SourceType::Search, "Child");
        entity.parent_guid = Some("e1".to_string());
        entity.population_references.push(PopulationReference {
            report_guid: "e1".to_string(),
            score_weightage: None,
        });
        let graph = dependency_graph(&[entity]);
        assert_eq!(graph.get("e2").unwrap(), &vec!["e1".to_string()]);
    }

    #[test]
    fn test_dependents_is_reverse_of_dependency_graph() {
        let mut graph = BTreeMap::new();
        graph.insert("e2".to_string(), vec!["e1".to_string()]);
        graph.insert("e3".to_string(), vec!["e1".to_string()]);
        let reverse = dependents(&graph);
        let mut deps = reverse.get("e1").unwrap().clone();
        deps.sort();
        assert_eq!(deps, vec!["e2".to_string(), "e3".to_string()]);
    }
}
