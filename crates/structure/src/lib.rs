//! C9: turns the flat folders/entities parsed out of a document into the
//! navigation views a client actually renders — folder breadcrumbs,
//! dependency graphs, and the nested folder/search/report tree.

pub mod enrich;
pub mod graph;
pub mod tree;

pub use enrich::EnrichedEntity;
pub use graph::{dependency_graph, dependents, folder_paths};
pub use tree::{folder_tree, FolderNode, FolderTree, ReportNode, SearchNode, ROOT_ID};

use std::collections::{BTreeMap, HashMap};

use clinxml_model::{Entity, Folder, SourceType};

/// Borrows a document's folders and entities long enough to derive every
/// navigation view without cloning the underlying records.
pub struct StructureEnricher<'a> {
    folders: &'a [Folder],
    entities: &'a [Entity],
}

impl<'a> StructureEnricher<'a> {
    pub fn new(folders: &'a [Folder], entities: &'a [Entity]) -> Self {
        Self { folders, entities }
    }

    pub fn folder_paths(&self) -> HashMap<String, Vec<String>> {
        folder_paths(self.folders)
    }

    pub fn dependency_graph(&self) -> BTreeMap<String, Vec<String>> {
        dependency_graph(self.entities)
    }

    pub fn dependents(&self) -> HashMap<String, Vec<String>> {
        dependents(&self.dependency_graph())
    }

    pub fn folder_tree(&self) -> FolderTree {
        folder_tree(self.folders, self.entities)
    }

    pub fn enrich_searches(&self) -> Vec<EnrichedEntity> {
        let graph = self.dependency_graph();
        let dependents = dependents(&graph);
        let paths = self.folder_paths();
        enrich::enrich_entities(self.entities, |t| t == SourceType::Search, &graph, &dependents, &paths)
    }

    pub fn enrich_reports(&self) -> Vec<EnrichedEntity> {
        let graph = self.dependency_graph();
        let dependents = dependents(&graph);
        let paths = self.folder_paths();
        enrich::enrich_entities(self.entities, SourceType::is_report, &graph, &dependents, &paths)
    }
}
