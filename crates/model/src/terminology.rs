use thiserror::Error;

/// Collaborator contract for an external SNOMED CT terminology server.
/// Nothing in this crate implements this trait: the lookup and enrichment
/// stages call it only when a caller supplies one, and run without
/// descendant expansion otherwise.
pub trait TerminologyClient {
    /// Returns the transitive descendants of `snomed_id`, including the
    /// concept itself, or an error if the server cannot be reached or the
    /// concept is unknown.
    fn expand_descendants(&self, snomed_id: &str) -> Result<DescendantExpansion, TerminologyError>;
}

/// The result of a descendant expansion query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescendantExpansion {
    pub root: String,
    pub descendant_ids: Vec<String>,
}

impl DescendantExpansion {
    pub fn count(&self) -> u64 {
        self.descendant_ids.len() as u64
    }
}

#[derive(Debug, Error)]
pub enum TerminologyError {
    #[error("terminology server unreachable: {0}")]
    Unreachable(String),
    #[error("unknown concept: {0}")]
    UnknownConcept(String),
    #[error("terminology server returned malformed response: {0}")]
    MalformedResponse(String),
}
