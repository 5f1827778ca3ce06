//! The built-in pattern registry (C4): a plugin system of declarative rules
//! evaluated over every criterion draft during parsing.

pub mod builtin;
pub mod draft;
pub mod pattern;
pub mod registry;

pub use draft::CriterionDraft;
pub use pattern::{ColumnFilterRewriter, FlagProducer, Pattern, Predicate, ValueSetRewriter};
pub use registry::PatternRegistry;
