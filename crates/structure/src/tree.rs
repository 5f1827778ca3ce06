//! The nested folder/search/report tree used for navigation views.
//!
//! A search nests under another search when its `parent_guid` names a
//! search; a report nests under its parent search only when both live in the
//! same folder, otherwise it surfaces at the folder level next to its
//! siblings. Everything unassigned to a real folder collects under a
//! synthetic root node rather than being dropped.

use std::collections::{HashMap, HashSet};

use clinxml_model::{Entity, Folder, SourceType};

pub const ROOT_ID: &str = "__root__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportNode {
    pub id: String,
    pub name: String,
    pub type_label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchNode {
    pub id: String,
    pub name: String,
    pub type_label: &'static str,
    pub children: Vec<SearchNode>,
    pub reports: Vec<ReportNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    pub children: Vec<FolderNode>,
    pub searches: Vec<SearchNode>,
    pub reports: Vec<ReportNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderTree {
    pub root: FolderNode,
}

struct TreeBuilder<'a> {
    entity_by_id: HashMap<&'a str, &'a Entity>,
    folder_by_id: HashMap<&'a str, &'a Folder>,
    folder_children: HashMap<String, Vec<String>>,
    folder_searches: HashMap<String, Vec<String>>,
    folder_reports: HashMap<String, Vec<String>>,
    search_children: HashMap<String, Vec<String>>,
    search_reports: HashMap<String, Vec<String>>,
}

fn resolved_folder_key(folder_id: Option<&str>, valid_folder_ids: &HashSet<&str>) -> String {
    match folder_id {
        Some(id) if valid_folder_ids.contains(id) => id.to_string(),
        _ => ROOT_ID.to_string(),
    }
}

impl<'a> TreeBuilder<'a> {
    fn new(folders: &'a [Folder], entities: &'a [Entity]) -> Self {
        let valid_folder_ids: HashSet<&str> = folders.iter().map(|f| f.id.as_str()).collect();
        let folder_by_id: HashMap<&str, &Folder> =
            folders.iter().map(|f| (f.id.as_str(), f)).collect();
        let entity_by_id: HashMap<&str, &Entity> =
            entities.iter().map(|e| (e.id.as_str(), e)).collect();
        let search_ids: HashSet<&str> = entities
            .iter()
            .filter(|e| e.source_type == SourceType::Search)
            .map(|e| e.id.as_str())
            .collect();

        let mut folder_children: HashMap<String, Vec<String>> = HashMap::new();
        for folder in folders {
            let parent_key = match &folder.parent_id {
                Some(pid) if valid_folder_ids.contains(pid.as_str()) => pid.clone(),
                _ => ROOT_ID.to_string(),
            };
            folder_children.entry(parent_key).or_default().push(folder.id.clone());
        }

        let mut search_children: HashMap<String, Vec<String>> = HashMap::new();
        let mut folder_searches: HashMap<String, Vec<String>> = HashMap::new();
        for entity in entities.iter().filter(|e| e.source_type == SourceType::Search) {
            let nests_under_search = entity
                .parent_guid
                .as_deref()
                .filter(|parent| search_ids.contains(parent));
            if let Some(parent) = nests_under_search {
                search_children.entry(parent.to_string()).or_default().push(entity.id.clone());
            } else {
                let key = resolved_folder_key(entity.folder_id.as_deref(), &valid_folder_ids);
                folder_searches.entry(key).or_default().push(entity.id.clone());
            }
        }

        let mut search_reports: HashMap<String, Vec<String>> = HashMap::new();
        let mut folder_reports: HashMap<String, Vec<String>> = HashMap::new();
        for entity in entities.iter().filter(|e| e.source_type.is_report()) {
            let parent_search = entity
                .parent_guid
                .as_deref()
                .filter(|parent| search_ids.contains(parent))
                .and_then(|parent| entity_by_id.get(parent))
                .filter(|parent_entity| parent_entity.folder_id == entity.folder_id);

            if let Some(parent_entity) = parent_search {
                search_reports
                    .entry(parent_entity.id.clone())
                    .or_default()
                    .push(entity.id.clone());
            } else {
                let key = resolved_folder_key(entity.folder_id.as_deref(), &valid_folder_ids);
                folder_reports.entry(key).or_default().push(entity.id.clone());
            }
        }

        Self {
            entity_by_id,
            folder_by_id,
            folder_children,
            folder_searches,
            folder_reports,
            search_children,
            search_reports,
        }
    }

    fn build_report(&self, id: &str) -> ReportNode {
        let entity = self.entity_by_id[id];
        ReportNode {
            id: entity.id.clone(),
            name: entity.name.clone(),
            type_label: entity.source_type.label(),
        }
    }

    fn build_search(&self, id: &str) -> SearchNode {
        let entity = self.entity_by_id[id];
        let children = self
            .search_children
            .get(id)
            .map(|ids| ids.iter().map(|cid| self.build_search(cid)).collect())
            .unwrap_or_default();
        let reports = self
            .search_reports
            .get(id)
            .map(|ids| ids.iter().map(|rid| self.build_report(rid)).collect())
            .unwrap_or_default();
        SearchNode {
            id: entity.id.clone(),
            name: entity.name.clone(),
            type_label: entity.source_type.label(),
            children,
            reports,
        }
    }

    fn build_folder(&self, id: &str, name: &str) -> FolderNode {
        let children = self
            .folder_children
            .get(id)
            .map(|ids| {
                ids.iter()
                    .map(|cid| {
                        let folder = self.folder_by_id[cid.as_str()];
                        self.build_folder(cid, &folder.name)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let searches = self
            .folder_searches
            .get(id)
            .map(|ids| ids.iter().map(|sid| self.build_search(sid)).collect())
            .unwrap_or_default();
        let reports = self
            .folder_reports
            .get(id)
            .map(|ids| ids.iter().map(|rid| self.build_report(rid)).collect())
            .unwrap_or_default();
        FolderNode { id: id.to_string(), name: name.to_string(), children, searches, reports }
    }
}

pub fn folder_tree(folders: &[Folder], entities: &[Entity]) -> FolderTree {
    let builder = TreeBuilder::new(folders, entities);
    FolderTree { root: builder.build_folder(ROOT_ID, "") }
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

    fn search(id: &str, name: &str, folder_id: Option<&str>, parent_guid: Option<&str>) -> Entity {
        let mut e = Entity::new(id, SourceType::Search, name);
        e.folder_id = folder_id.map(|s| s.to_string());
        e.parent_guid = parent_guid.map(|s| s.to_string());
        e
    }

    fn report(id: &str, name: &str, folder_id: Option<&str>, parent_guid: Option<&str>) -> Entity {
        let mut e = Entity::new(id, SourceType::ListReport, name);
        e.folder_id = folder_id.map(|s| s.to_string());
        e.parent_guid = parent_guid.map(|s| s.to_string());
        if let Some(parent) = parent_guid {
            e.population_references.push(PopulationReference {
                report_guid: parent.to_string(),
                score_weightage: None,
            });
        }
        e
    }

    #[test]
    fn test_unassigned_entity_nests_under_synthetic_root() {
        let folders = vec![];
        let entities = vec![search("s1", "Orphan Search", None, None)];
        let tree = folder_tree(&folders, &entities);
        assert_eq!(tree.root.id, ROOT_ID);
        assert_eq!(tree.root.searches.len(), 1);
        assert_eq!(tree.root.searches[0].id, "s1");
    }

    #[test]
    fn test_folder_nests_under_parent_folder() {
        let folders = vec![folder("f1", "Parent", None), folder("f2", "Child", Some("f1"))];
        let tree = folder_tree(&folders, &[]);
        assert_eq!(tree.root.children.len(), 1);
        assert_eq!(tree.root.children[0].id, "f1");
        assert_eq!(tree.root.children[0].children[0].id, "f2");
    }

    #[test]
    fn test_search_nests_under_parent_search_not_folder() {
        let folders = vec![folder("f1", "Diabetes", None)];
        let entities = vec![
            search("s1", "Base", Some("f1"), None),
            search("s2", "Refinement", Some("f1"), Some("s1")),
        ];
        let tree = folder_tree(&folders, &entities);
        let f1 = &tree.root.children[0];
        assert_eq!(f1.searches.len(), 1);
        assert_eq!(f1.searches[0].id, "s1");
        assert_eq!(f1.searches[0].children[0].id, "s2");
    }

    #[test]
    fn test_report_nests_under_parent_search_when_same_folder() {
        let folders = vec![folder("f1", "Diabetes", None)];
        let entities = vec![
            search("s1", "Base", Some("f1"), None),
            report("r1", "List", Some("f1"), Some("s1")),
        ];
        let tree = folder_tree(&folders, &entities);
        let f1 = &tree.root.children[0];
        assert!(f1.reports.is_empty());
        assert_eq!(f1.searches[0].reports.len(), 1);
        assert_eq!(f1.searches[0].reports[0].id, "r1");
    }

    #[test]
    fn test_report_surfaces_at_folder_level_when_different_folder() {
        let folders = vec![folder("f1", "Diabetes", None), folder("f2", "Reports", None)];
        let entities = vec![
            search("s1", "Base", Some("f1"), None),
            report("r1", "List", Some("f2"), Some("s1")),
        ];
        let tree = folder_tree(&folders, &entities);
        let f1 = tree.root.children.iter().find(|f| f.id == "f1").unwrap();
        let f2 = tree.root.children.iter().find(|f| f.id == "f2").unwrap();
        assert!(f1.searches[0].reports.is_empty());
        assert_eq!(f2.reports.len(), 1);
        assert_eq!(f2.reports[0].id, "r1");
    }
}
