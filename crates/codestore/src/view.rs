/// The two flattening shapes `CodeStore::flatten` supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// One row per distinct `(emis_guid, value_set_guid, code_system)`, with
    /// every provenance occurrence folded onto that row.
    UniqueCodes,
    /// One row per provenance occurrence — the same code appearing under
    /// three searches yields three rows, each carrying a single provenance.
    PerSource,
}
