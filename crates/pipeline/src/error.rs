use thiserror::Error;

/// The top-level error type for the pipeline crate. `parse` itself never
/// returns this — it always produces a `PipelineResult` with a `status` —
/// this is reserved for setup failures that happen before a document is
/// even available, e.g. loading the lookup cache.
#[derive(Debug, Error)]
pub enum ClinXmlError {
    #[error(transparent)]
    Parse(#[from] clinxml_parser::ParseError),

    #[error(transparent)]
    Lookup(#[from] clinxml_lookup::LookupError),

    #[error("invalid pipeline configuration: {0}")]
    Config(String),
}
