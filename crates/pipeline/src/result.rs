use std::collections::{BTreeMap, HashMap};

use clinxml_codestore::{Categorised, CodeStore};
use clinxml_lookup::LookupStatistics;
use clinxml_model::{EncodingReport, Entity, Folder, PipelineStatus, Row, Warning};
use clinxml_structure::{EnrichedEntity, FolderTree};

/// Every view `clinxml-structure` can derive over a document's folders and
/// entities, bundled together for the pipeline's public result.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureData {
    pub folder_paths: HashMap<String, Vec<String>>,
    pub dependency_graph: BTreeMap<String, Vec<String>>,
    pub dependents: HashMap<String, Vec<String>>,
    pub folder_tree: FolderTree,
    pub enriched_searches: Vec<EnrichedEntity>,
    pub enriched_reports: Vec<EnrichedEntity>,
}

/// The orchestrator's single return value. Always produced, never an
/// `Err` — `status` and `warnings` carry failure information.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub ui_rows: Vec<Row>,
    pub entities: Vec<Entity>,
    pub folders: Vec<Folder>,
    pub structure_data: StructureData,
    pub code_store: CodeStore,
    pub categorised: Categorised,
    pub lookup_statistics: Option<LookupStatistics>,
    pub encoding: EncodingReport,
    pub warnings: Vec<Warning>,
}
