use serde::{Deserialize, Serialize};

/// A response segment the parser could not turn into a candidate measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseAnomaly {
    pub segment_index: usize,
    pub raw_segment: String,
    pub reason: String,
}

/// Why a candidate could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum NormalizationIssue {
    MissingCommodity,
    UnknownAnalyte { name: String },
    UnknownCommodity { name: String },
    AmbiguousName { name: String, matches: Vec<String> },
    EmptyValue,
    /// The report (or the model) stated the value was not found.
    NotReported { value: String },
    /// Limits are integers; fractional values are never rounded.
    FractionalValue { value: String },
    NegativeValue { value: String },
    MissingMarker { value: String },
    UnsupportedUnit { unit: String },
    UnparseableValue { value: String },
}

impl NormalizationIssue {
    pub fn describe(&self) -> String {
        match self {
            Self::MissingCommodity => "no commodity given".into(),
            Self::UnknownAnalyte { name } => format!("unknown analyte '{name}'"),
            Self::UnknownCommodity { name } => format!("unknown commodity '{name}'"),
            Self::AmbiguousName { name, matches } => {
                format!("'{name}' matches several names: {}", matches.join(", "))
            }
            Self::EmptyValue => "empty value".into(),
            Self::NotReported { value } => format!("value not reported ('{value}')"),
            Self::FractionalValue { value } => format!("fractional value '{value}'"),
            Self::NegativeValue { value } => format!("negative value '{value}'"),
            Self::MissingMarker { value } => format!("value '{value}' lacks the terminal marker"),
            Self::UnsupportedUnit { unit } => format!("unsupported unit '{unit}'"),
            Self::UnparseableValue { value } => format!("unparseable value '{value}'"),
        }
    }
}

/// A candidate that failed normalization. The candidate itself stays in the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationAnomaly {
    pub candidate_index: usize,
    pub analyte_raw: String,
    pub issues: Vec<NormalizationIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Anomaly {
    Parse(ParseAnomaly),
    Normalization(NormalizationAnomaly),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anomaly_serializes_with_stage_tag() {
        let anomaly = Anomaly::Normalization(NormalizationAnomaly {
            candidate_index: 2,
            analyte_raw: "Glyphosate".into(),
            issues: vec![NormalizationIssue::FractionalValue {
                value: "7.5".into(),
            }],
        });
        let json = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(json["stage"], "normalization");
        assert_eq!(json["issues"][0]["issue"], "fractional_value");
        let back: Anomaly = serde_json::from_value(json).unwrap();
        assert_eq!(back, anomaly);
    }

    #[test]
    fn describe_mentions_offending_text() {
        let issue = NormalizationIssue::UnsupportedUnit { unit: "µg/kg".into() };
        assert!(issue.describe().contains("µg/kg"));
    }
}
