use serde::{Deserialize, Serialize};

use crate::code_entry::{MappingStatus, Provenance};
use crate::entity::SourceType;
use crate::valueset::CodeSystem;

/// Diagnostics from the encoding resolver (C1). Never represents failure —
/// the resolver always produces text, falling back to lossy ISO-8859-1
/// decoding as a last resort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingReport {
    pub encoding_used: String,
    pub declared_encoding: Option<String>,
    pub guessed_encoding: Option<String>,
    /// True if the last-resort lossy path was used (undecodable bytes were
    /// replaced with U+FFFD).
    pub lossy: bool,
}

/// Overall pipeline outcome. The orchestrator always returns a
/// `PipelineResult`, never an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Ok,
    Partial,
    Failed,
}

/// An element-local or document-level issue recorded during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub stage: String,
    pub path: String,
    pub message: String,
}

impl Warning {
    pub fn new(stage: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The UI-row contract exposed to external presentation layers.
///
/// The singular `source_*`/`report_type` fields mirror the first (most
/// complete) entry of `provenance` for callers that only need one
/// representative source; `provenance` itself carries the full chain and is
/// length 1 in the `per_source` view and length N in the `unique_codes`
/// view when a code was inserted under N distinct provenance tuples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub value_set_guid: Option<String>,
    pub value_set_description: Option<String>,
    pub emis_guid: String,
    pub xml_display_name: Option<String>,
    pub code_system: CodeSystem,
    pub include_children: bool,
    pub is_refset: bool,
    pub is_pseudorefset: bool,
    pub is_pseudomember: bool,
    pub is_emisinternal: bool,
    pub is_medication: bool,
    pub is_library_item: bool,
    pub inactive: bool,
    pub table_context: Option<String>,
    pub column_context: Option<String>,
    pub source_type: SourceType,
    pub source_guid: String,
    pub source_name: String,
    pub source_container: String,
    pub report_type: Option<String>,
    pub snomed_code: Option<String>,
    pub snomed_description: Option<String>,
    pub descendants: Option<u64>,
    pub has_qualifier: Option<bool>,
    pub code_type: Option<String>,
    pub is_parent: Option<bool>,
    pub mapping_status: MappingStatus,
    pub provenance: Vec<Provenance>,
}
