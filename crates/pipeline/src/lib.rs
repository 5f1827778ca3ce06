//! C10: the pipeline orchestrator crate. Ties every other `clinxml-*` crate
//! together behind one `parse` entry point, plus the ambient CLI/config/
//! logging/caching stack around it.

pub mod cache;
pub mod collect;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod result;

pub use config::{DedupViewArg, PipelineConfig};
pub use error::ClinXmlError;
pub use logging::init_logging;
pub use pipeline::parse;
pub use result::{PipelineResult, StructureData};
