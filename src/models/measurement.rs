use std::fmt;

use serde::{Deserialize, Serialize};

/// A name that does not follow the reference database's title-case convention.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} name '{name}' is not in canonical title-case form")]
pub struct NamingError {
    pub kind: &'static str,
    pub name: String,
}

/// Title-case check used for every canonical identifier.
///
/// The first alphabetic character must be uppercase (so `2,4-D` and `Apple`
/// pass, `apple` does not), and the name carries no surrounding whitespace.
pub fn is_title_case(name: &str) -> bool {
    if name.is_empty() || name.trim() != name {
        return false;
    }
    name.chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(|c| c.is_uppercase())
}

macro_rules! canonical_id {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Result<Self, NamingError> {
                let name = name.into();
                if is_title_case(&name) {
                    Ok(Self(name))
                } else {
                    Err(NamingError { kind: $kind, name })
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = NamingError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

canonical_id!(CanonicalAnalyteId, "Analyte");
canonical_id!(CanonicalCommodityId, "Commodity");

/// A measurement exactly as the response parser found it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMeasurement {
    /// Position of the originating segment within the model response.
    pub segment_index: usize,
    pub analyte_raw: String,
    /// Literal value text, marker characters and units included.
    pub value_raw: String,
    pub commodity_raw: Option<String>,
}

/// A candidate mapped onto canonical identifiers with an integer value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMeasurement {
    /// Index into `DocumentResult::candidates`.
    pub candidate_index: usize,
    pub analyte: CanonicalAnalyteId,
    pub commodity: CanonicalCommodityId,
    pub value: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_accepts_capitalized_names() {
        assert!(is_title_case("Apple"));
        assert!(is_title_case("Lambda-cyhalothrin"));
        assert!(is_title_case("Table grapes"));
        assert!(is_title_case("2,4-D"));
    }

    #[test]
    fn title_case_rejects_lowercase_and_padding() {
        assert!(!is_title_case("apple"));
        assert!(!is_title_case(" Apple"));
        assert!(!is_title_case("Apple "));
        assert!(!is_title_case(""));
        assert!(!is_title_case("123"));
    }

    #[test]
    fn canonical_id_rejects_non_title_case() {
        let err = CanonicalAnalyteId::new("atrazine").unwrap_err();
        assert_eq!(err.kind, "Analyte");
        assert!(CanonicalCommodityId::new("Apple").is_ok());
    }

    #[test]
    fn canonical_id_deserialization_validates() {
        let ok: CanonicalCommodityId = serde_json::from_str("\"Apple\"").unwrap();
        assert_eq!(ok.as_str(), "Apple");
        let bad: Result<CanonicalCommodityId, _> = serde_json::from_str("\"apple\"");
        assert!(bad.is_err());
    }
}
