//! Core data model for ClinXML.
//!
//! Types here are owned records, never pointers: cross-references between
//! folders, entities, criteria, and population references are always by
//! identifier (`String` GUIDs), matching the "no cyclic ownership" invariant
//! in the parsing pipeline design.

pub mod code_entry;
pub mod criterion;
pub mod entity;
pub mod folder;
pub mod result;
pub mod terminology;
pub mod valueset;

pub use code_entry::{CodeEntry, DedupKey, MappingStatus, Provenance};
pub use criterion::{
    ColumnFilter, Criterion, FilterType, FlagSet, FlagValue, InNotIn, LinkedChild, Parameter,
    ParameterScope, RangeBound, RangeInfo, Relation, Relationship, Restriction, RestrictionKind,
    SortDirection, Temporal, TemporalComparator, TemporalOperator, TemporalUnit, Warnings,
};
pub use entity::{
    ActionIfTrue, AggregateConfig, AggregateGroup, AggregateResult, ColumnGroup, CriteriaGroup,
    Entity, Operator, PopulationReference, ReportColumn, ScoreRange, SortConfiguration,
    SourceType,
};
pub use folder::Folder;
pub use result::{EncodingReport, PipelineStatus, Row, Warning};
pub use terminology::{DescendantExpansion, TerminologyClient, TerminologyError};
pub use valueset::{CodeSystem, CodeValue, ValueKind, ValueSet};
