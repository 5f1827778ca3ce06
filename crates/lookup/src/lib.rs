pub mod cache;
pub mod enrich;
pub mod error;
pub mod record;
pub mod store;

pub use enrich::enrich;
pub use error::LookupError;
pub use record::{normalise_code_value, LoadSource, LookupRecord, LookupStatistics};
pub use store::{global_lookup, set_global_lookup, FilteredLookup, LookupConfig, LookupStore};
