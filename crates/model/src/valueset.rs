use serde::{Deserialize, Serialize};

/// The code system a value or value set is drawn from.
///
/// `EMISINTERNAL` codes are recorded but excluded from the clinical /
/// medication / refset categorisation buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeSystem {
    /// SNOMED CT, the default clinical terminology.
    Sct,
    /// EMIS' internal classification codes.
    EmisInternal,
    /// A drug dictionary code (medication).
    Emis,
    /// Any code system the document declares that we do not specifically
    /// recognise; preserved verbatim for provenance.
    Other(String),
}

impl CodeSystem {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SCT" | "SNOMED" | "SNOMED_CONCEPT" => CodeSystem::Sct,
            "EMISINTERNAL" => CodeSystem::EmisInternal,
            "EMIS" | "EMIS_DRUG" => CodeSystem::Emis,
            other => CodeSystem::Other(other.to_string()),
        }
    }

    pub fn is_emis_internal(&self) -> bool {
        matches!(self, CodeSystem::EmisInternal)
    }
}

impl std::fmt::Display for CodeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeSystem::Sct => write!(f, "SCT"),
            CodeSystem::EmisInternal => write!(f, "EMISINTERNAL"),
            CodeSystem::Emis => write!(f, "EMIS"),
            CodeSystem::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A single code inside a [`ValueSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeValue {
    /// EMIS GUID or, for refsets, a SNOMED id reused directly as the GUID.
    pub code_value: String,
    pub display_name: Option<String>,
    pub include_children: bool,
    pub inactive: bool,
    pub code_system: CodeSystem,
}

/// A value set attached to a criterion or column filter.
///
/// `values` has exactly one element for a single-code value set; a value
/// set may instead be a library reference, carrying only `library_item_id`
/// with an empty `values` — opaque, never expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSet {
    pub value_set_guid: Option<String>,
    pub value_set_description: Option<String>,
    pub code_system: CodeSystem,
    pub include_children: bool,
    pub is_refset: bool,
    pub is_pseudo_refset: bool,
    pub is_pseudo_member: bool,
    pub is_library_item: bool,
    pub inactive: bool,
    pub values: Vec<CodeValue>,
    /// Populated only when `is_library_item` is true and the reference
    /// carries no expandable member codes.
    pub library_item_id: Option<String>,
}

impl ValueSet {
    /// Classifies a single code's kind: pseudo-refset wins over refset when
    /// a malformed document marks both.
    pub fn classification(&self) -> ValueKind {
        if self.is_library_item {
            ValueKind::Library
        } else if self.is_pseudo_refset {
            ValueKind::PseudoRefset
        } else if self.is_refset {
            ValueKind::Refset
        } else if self.code_system.is_emis_internal() {
            ValueKind::EmisInternal
        } else if self.code_system == CodeSystem::Emis {
            ValueKind::Medication
        } else {
            ValueKind::Clinical
        }
    }

    pub fn is_single_code(&self) -> bool {
        self.values.len() == 1
    }
}

/// The kind a value set's contained codes should be classified as when
/// inserted into the code store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Clinical,
    Medication,
    Refset,
    PseudoRefset,
    EmisInternal,
    Library,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_set() -> ValueSet {
        ValueSet {
            value_set_guid: None,
            value_set_description: None,
            code_system: CodeSystem::Sct,
            include_children: false,
            is_refset: false,
            is_pseudo_refset: false,
            is_pseudo_member: false,
            is_library_item: false,
            inactive: false,
            values: Vec::new(),
            library_item_id: None,
        }
    }

    #[test]
    fn test_classification_defaults_to_clinical() {
        assert_eq!(value_set().classification(), ValueKind::Clinical);
    }

    #[test]
    fn test_pseudo_refset_wins_over_refset() {
        let vs = ValueSet {
            is_refset: true,
            is_pseudo_refset: true,
            ..value_set()
        };
        assert_eq!(vs.classification(), ValueKind::PseudoRefset);
    }

    #[test]
    fn test_library_item_wins_over_everything() {
        let vs = ValueSet {
            is_refset: true,
            is_pseudo_refset: true,
            is_library_item: true,
            ..value_set()
        };
        assert_eq!(vs.classification(), ValueKind::Library);
    }

    #[test]
    fn test_emis_drug_classifies_as_medication() {
        let vs = ValueSet {
            code_system: CodeSystem::Emis,
            ..value_set()
        };
        assert_eq!(vs.classification(), ValueKind::Medication);
    }

    #[test]
    fn test_from_raw_recognises_known_systems() {
        assert_eq!(CodeSystem::from_raw("snomed_concept"), CodeSystem::Sct);
        assert_eq!(CodeSystem::from_raw("EMISINTERNAL"), CodeSystem::EmisInternal);
        assert_eq!(CodeSystem::from_raw("emis_drug"), CodeSystem::Emis);
        assert_eq!(
            CodeSystem::from_raw("ICD10"),
            CodeSystem::Other("ICD10".to_string())
        );
    }

    #[test]
    fn test_is_single_code() {
        let mut vs = value_set();
        assert!(!vs.is_single_code());
        vs.values.push(CodeValue {
            code_value: "123".to_string(),
            display_name: None,
            include_children: false,
            inactive: false,
            code_system: CodeSystem::Sct,
        });
        assert!(vs.is_single_code());
    }
}
