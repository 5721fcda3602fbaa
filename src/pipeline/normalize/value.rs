use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::NormalizationIssue;

/// Spellings a report or the model uses for "no value".
const NOT_REPORTED: &[&str] = &[
    "not found",
    "not detected",
    "not reported",
    "n/a",
    "n.d.",
    "nd",
];

static NUMBER_WITH_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sign>[-−+]?)\s*(?P<whole>\d+)(?P<fraction>[.,]\d*)?\s*(?P<unit>.*)$").unwrap()
});

/// True when `text` states that no value was found (`Not found`, `n.d.`, ...).
/// Marker characters around the phrase are ignored.
pub fn is_not_reported(text: &str) -> bool {
    let bare = text
        .trim()
        .trim_matches(|c: char| c == '*' || c.is_whitespace())
        .to_lowercase();
    NOT_REPORTED.contains(&bare.as_str())
}

/// What to do with the marker character that terminates extracted values.
///
/// The extraction prompt asks for a trailing `*`; whether that marker is a
/// sentinel or an artifact is left to configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MarkerPolicy {
    /// Remove any of these characters from both ends of the value.
    Strip { markers: Vec<char> },
    /// The value must end with this marker; it is removed before parsing.
    Require { marker: char },
    /// Values are taken as-is; a marker makes them unparseable.
    Keep,
}

impl Default for MarkerPolicy {
    fn default() -> Self {
        Self::Strip { markers: vec!['*'] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePolicy {
    pub marker: MarkerPolicy,
    /// Units equal to the reference table's unit. A value with no unit is
    /// taken to be in the reference unit.
    pub accepted_units: Vec<String>,
}

impl Default for ValuePolicy {
    fn default() -> Self {
        Self {
            marker: MarkerPolicy::default(),
            accepted_units: vec!["mg/kg".to_string()],
        }
    }
}

/// Turns a literal value (`"5*"`, `"12 mg/kg*"`) into an integer.
///
/// Failure modes, each a distinct [`NormalizationIssue`]:
/// empty text, a "not found" phrase, a missing required marker, a leading
/// minus sign, a decimal part (`.` or `,`), a unit outside the accepted list,
/// or text that is not a number at all. Values are never rounded.
#[derive(Debug, Clone, Default)]
pub struct ValueParser {
    policy: ValuePolicy,
}

impl ValueParser {
    pub fn new(policy: ValuePolicy) -> Self {
        Self { policy }
    }

    pub fn parse(&self, raw: &str) -> Result<u64, NormalizationIssue> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NormalizationIssue::EmptyValue);
        }
        if is_not_reported(trimmed) {
            return Err(NormalizationIssue::NotReported {
                value: raw.to_string(),
            });
        }

        let bare = match &self.policy.marker {
            MarkerPolicy::Strip { markers } => trimmed
                .trim_matches(|c: char| markers.contains(&c) || c.is_whitespace()),
            MarkerPolicy::Require { marker } => match trimmed.strip_suffix(*marker) {
                Some(rest) => rest.trim_end(),
                None => {
                    return Err(NormalizationIssue::MissingMarker {
                        value: raw.to_string(),
                    })
                }
            },
            MarkerPolicy::Keep => trimmed,
        };
        if bare.is_empty() {
            return Err(NormalizationIssue::EmptyValue);
        }

        let unparseable = || NormalizationIssue::UnparseableValue {
            value: raw.to_string(),
        };
        let caps = NUMBER_WITH_UNIT.captures(bare).ok_or_else(unparseable)?;

        if matches!(&caps["sign"], "-" | "−") {
            return Err(NormalizationIssue::NegativeValue {
                value: raw.to_string(),
            });
        }
        if caps.name("fraction").is_some() {
            return Err(NormalizationIssue::FractionalValue {
                value: raw.to_string(),
            });
        }

        let unit = caps["unit"].trim();
        if !unit.is_empty()
            && !self
                .policy
                .accepted_units
                .iter()
                .any(|u| u.eq_ignore_ascii_case(unit))
        {
            return Err(NormalizationIssue::UnsupportedUnit {
                unit: unit.to_string(),
            });
        }

        caps["whole"].parse::<u64>().map_err(|_| unparseable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<u64, NormalizationIssue> {
        ValueParser::default().parse(raw)
    }

    #[test]
    fn strips_trailing_marker_and_whitespace() {
        assert_eq!(parse("5*"), Ok(5));
        assert_eq!(parse("  12 * "), Ok(12));
        assert_eq!(parse("*7*"), Ok(7));
        assert_eq!(parse("40"), Ok(40));
    }

    #[test]
    fn accepted_unit_is_allowed() {
        assert_eq!(parse("5 mg/kg*"), Ok(5));
        assert_eq!(parse("5MG/KG"), Ok(5));
    }

    #[test]
    fn other_units_are_flagged_not_converted() {
        assert_eq!(
            parse("500 µg/kg*"),
            Err(NormalizationIssue::UnsupportedUnit {
                unit: "µg/kg".into()
            })
        );
    }

    #[test]
    fn fractional_values_are_anomalies() {
        assert!(matches!(parse("7.5*"), Err(NormalizationIssue::FractionalValue { .. })));
        assert!(matches!(parse("0,01*"), Err(NormalizationIssue::FractionalValue { .. })));
        assert!(matches!(parse("12.0"), Err(NormalizationIssue::FractionalValue { .. })));
    }

    #[test]
    fn bare_decimal_point_is_fractional() {
        assert_eq!(
            parse("5.*"),
            Err(NormalizationIssue::FractionalValue { value: "5.*".into() })
        );
        assert!(matches!(parse("5."), Err(NormalizationIssue::FractionalValue { .. })));
        assert!(matches!(parse("5, mg/kg"), Err(NormalizationIssue::FractionalValue { .. })));
    }

    #[test]
    fn negative_and_garbage_values() {
        assert!(matches!(parse("-3*"), Err(NormalizationIssue::NegativeValue { .. })));
        assert!(matches!(parse("<0,01*"), Err(NormalizationIssue::UnparseableValue { .. })));
        assert!(matches!(parse("abc*"), Err(NormalizationIssue::UnparseableValue { .. })));
        assert!(matches!(
            parse("99999999999999999999999"),
            Err(NormalizationIssue::UnparseableValue { .. })
        ));
    }

    #[test]
    fn empty_and_not_found() {
        assert_eq!(parse("  "), Err(NormalizationIssue::EmptyValue));
        assert_eq!(parse("**"), Err(NormalizationIssue::EmptyValue));
        assert_eq!(
            parse("Not found"),
            Err(NormalizationIssue::NotReported {
                value: "Not found".into()
            })
        );
        assert!(matches!(parse("n.d.*"), Err(NormalizationIssue::NotReported { .. })));
    }

    #[test]
    fn require_policy_demands_marker() {
        let parser = ValueParser::new(ValuePolicy {
            marker: MarkerPolicy::Require { marker: '*' },
            ..ValuePolicy::default()
        });
        assert_eq!(parser.parse("5*"), Ok(5));
        assert_eq!(
            parser.parse("5"),
            Err(NormalizationIssue::MissingMarker { value: "5".into() })
        );
    }

    #[test]
    fn keep_policy_leaves_marker_in_place() {
        let parser = ValueParser::new(ValuePolicy {
            marker: MarkerPolicy::Keep,
            ..ValuePolicy::default()
        });
        assert_eq!(parser.parse("5"), Ok(5));
        assert!(matches!(
            parser.parse("5*"),
            Err(NormalizationIssue::UnsupportedUnit { .. })
        ));
    }

    #[test]
    fn custom_marker_set() {
        let parser = ValueParser::new(ValuePolicy {
            marker: MarkerPolicy::Strip {
                markers: vec!['*', '†'],
            },
            ..ValuePolicy::default()
        });
        assert_eq!(parser.parse("8†"), Ok(8));
    }

    #[test]
    fn not_reported_phrases() {
        assert!(is_not_reported("Not found"));
        assert!(is_not_reported(" not found* "));
        assert!(is_not_reported("N/A"));
        assert!(!is_not_reported("Atrazine"));
    }

    #[test]
    fn policy_serializes_with_mode_tag() {
        let json = serde_json::to_value(ValuePolicy::default()).unwrap();
        assert_eq!(json["marker"]["mode"], "strip");
        assert_eq!(json["marker"]["markers"][0], "*");
    }
}
