use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {field}: '{value}'")]
pub struct InvalidEnumValue {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnumValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnumValue {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(VerdictStatus {
    Compliant => "compliant",
    NonCompliant => "non_compliant",
    LimitUnavailable => "limit_unavailable",
});

str_enum!(DocumentVerdict {
    Compliant => "compliant",
    NonCompliant => "non_compliant",
    Incomplete => "incomplete",
});

str_enum!(DocumentFormat {
    Pdf => "pdf",
    PlainText => "plain_text",
});

str_enum!(LlmProvider {
    Ollama => "ollama",
    OpenAi => "openai",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn verdict_status_round_trip() {
        for (variant, s) in [
            (VerdictStatus::Compliant, "compliant"),
            (VerdictStatus::NonCompliant, "non_compliant"),
            (VerdictStatus::LimitUnavailable, "limit_unavailable"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(VerdictStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn llm_provider_parses_cli_values() {
        assert_eq!(LlmProvider::from_str("ollama").unwrap(), LlmProvider::Ollama);
        assert_eq!(LlmProvider::from_str("openai").unwrap(), LlmProvider::OpenAi);
    }

    #[test]
    fn unknown_value_reports_field() {
        let err = DocumentVerdict::from_str("maybe").unwrap_err();
        assert_eq!(err.field, "DocumentVerdict");
        assert_eq!(err.value, "maybe");
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&VerdictStatus::LimitUnavailable).unwrap();
        assert_eq!(json, "\"limit_unavailable\"");
        let back: VerdictStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VerdictStatus::LimitUnavailable);
    }
}
