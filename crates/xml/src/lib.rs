//! Encoding resolution (C1) and the streaming, namespace-agnostic XML walker
//! (C3) over EMIS clinical-search documents.

pub mod encoding;
pub mod error;
pub mod event;
pub mod walker;

pub use encoding::decode_xml;
pub use error::WalkError;
pub use event::{
    RawCodeValue, RawColumnFilter, RawRangeBound, RawRangeInfo, RawRestriction, RawValueSet,
    XmlEvent,
};
pub use walker::XmlWalker;
