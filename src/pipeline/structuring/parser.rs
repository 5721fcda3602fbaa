//! Tolerant parsing of the model's free-text answer into candidate measurements.
//!
//! Two layouts are understood:
//!
//! - the JSON object the extraction prompt asks for
//!   (`{"Product", "Product_EU", "Substances": [{"Name", "Name_EU", "MRL"}]}`),
//!   bare or inside a fenced block, possibly surrounded by prose;
//! - one measurement per line (`Analyte: 5*`, `Analyte = 5*`,
//!   `Analyte (Commodity): 5*`, `Analyte | Commodity | 5*`), with optional
//!   `Product:` / `Commodity:` header lines.
//!
//! Every segment yields either a candidate or a [`ParseAnomaly`]. Only a
//! response with no content at all is an error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::{CandidateMeasurement, ParseAnomaly};
use crate::pipeline::normalize::is_not_reported;

use super::ResponseParseError;

const COMMODITY_KEYS: &[&str] = &["Product_EU", "Commodity", "Matrix", "Product"];
const SUBSTANCE_LIST_KEYS: &[&str] = &["Substances", "Measurements", "Results", "Analytes"];
const ANALYTE_KEYS: &[&str] = &["Name_EU", "Analyte", "Substance", "Name"];
const VALUE_KEYS: &[&str] = &["MRL", "Value", "Result", "Concentration"];

const TABLE_HEADER_WORDS: &[&str] = &[
    "analyte",
    "substance",
    "name",
    "name_eu",
    "commodity",
    "product",
    "product_eu",
    "matrix",
    "value",
    "mrl",
    "result",
    "concentration",
];

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-•·]|\*|\d{1,3}[.)])\s+").unwrap());

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:product_eu|product|commodity|matrix)\s*[:=]\s*(?P<commodity>.*)$").unwrap()
});

static KEYED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<analyte>[^:=()]+?)\s*(?:\((?P<commodity>[^()]*)\))?\s*[:=]\s*(?P<value>.*)$",
    )
    .unwrap()
});

static TABLE_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|?\s*:?-{2,}:?\s*(?:\|\s*:?-{2,}:?\s*)*\|?$").unwrap());

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Output of [`parse_extraction_response`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub candidates: Vec<CandidateMeasurement>,
    pub anomalies: Vec<ParseAnomaly>,
}

impl ParsedResponse {
    /// Number of measurement segments seen: every segment is either a
    /// candidate or an anomaly, never both, never neither.
    pub fn segment_count(&self) -> usize {
        self.candidates.len() + self.anomalies.len()
    }

    fn accept(&mut self, analyte: &str, value: &str, commodity: Option<String>) {
        let segment_index = self.segment_count();
        self.candidates.push(CandidateMeasurement {
            segment_index,
            analyte_raw: analyte.trim().to_string(),
            value_raw: value.trim().to_string(),
            commodity_raw: commodity,
        });
    }

    fn reject(&mut self, raw_segment: &str, reason: impl Into<String>) {
        let segment_index = self.segment_count();
        self.anomalies.push(ParseAnomaly {
            segment_index,
            raw_segment: raw_segment.to_string(),
            reason: reason.into(),
        });
    }
}

/// Parse one model response.
///
/// `commodity_hint` applies to measurements for which the response itself
/// names no commodity.
pub fn parse_extraction_response(
    response: &str,
    commodity_hint: Option<&str>,
) -> Result<ParsedResponse, ResponseParseError> {
    if response.trim().is_empty() {
        return Err(ResponseParseError::EmptyResponse);
    }

    let hint = commodity_hint
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string);
    let mut parsed = ParsedResponse::default();

    match locate_json(response) {
        JsonBlock::Parsed { root, start, end } => {
            // Measurement lines outside the block are kept; prose is skipped.
            let fallback = document_commodity(&root).or(hint);
            let mut lines = LineParser::around_json(fallback.clone());
            lines.parse(&response[..start], &mut parsed);
            parse_json_layout(&root, fallback, &mut parsed);
            lines.parse(&response[end..], &mut parsed);
        }
        JsonBlock::Broken { start, end, reason } => {
            // Lines around the block are still read, in order.
            let mut lines = LineParser::new(hint);
            lines.parse(&response[..start], &mut parsed);
            parsed.reject(response[start..end].trim(), reason);
            lines.parse(&response[end..], &mut parsed);
        }
        JsonBlock::Absent => LineParser::new(hint).parse(response, &mut parsed),
    }

    Ok(parsed)
}

// ---------------------------------------------------------------------------
// JSON layout
// ---------------------------------------------------------------------------

enum JsonBlock {
    Parsed {
        root: Value,
        start: usize,
        end: usize,
    },
    Broken {
        start: usize,
        end: usize,
        reason: String,
    },
    Absent,
}

/// Find a JSON payload: a fenced ```json block first, otherwise the span from
/// the first `{` to the last `}` (or a whole response that is a JSON array).
fn locate_json(response: &str) -> JsonBlock {
    let (start, end, body) = match fenced_json(response) {
        Some(found) => found,
        None => {
            let trimmed = response.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                let start = response.len() - response.trim_start().len();
                (start, start + trimmed.len(), trimmed)
            } else {
                match (response.find('{'), response.rfind('}')) {
                    (Some(open), Some(close)) if close > open => {
                        (open, close + 1, &response[open..=close])
                    }
                    _ => return JsonBlock::Absent,
                }
            }
        }
    };

    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(first_error) => {
            let repaired = TRAILING_COMMA.replace_all(body, "$1");
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) => value,
                Err(_) => {
                    return JsonBlock::Broken {
                        start,
                        end,
                        reason: format!("malformed JSON: {first_error}"),
                    }
                }
            }
        }
    };

    let usable = match &value {
        Value::Array(_) => true,
        Value::Object(obj) => {
            field(obj, SUBSTANCE_LIST_KEYS).is_some() || field(obj, VALUE_KEYS).is_some()
        }
        _ => false,
    };

    if usable {
        JsonBlock::Parsed {
            root: value,
            start,
            end,
        }
    } else {
        JsonBlock::Broken {
            start,
            end,
            reason: "JSON has no substance list".into(),
        }
    }
}

/// Returns `(block_start, block_end, body)` for a fenced json block.
fn fenced_json(response: &str) -> Option<(usize, usize, &str)> {
    // ASCII lowercasing keeps byte offsets aligned with `response`.
    let lower = response.to_ascii_lowercase();
    let open = lower.find("```json")?;
    let body_start = open + "```json".len();
    let close = response[body_start..].find("```")? + body_start;
    Some((open, close + 3, response[body_start..close].trim()))
}

/// Document-level commodity of a JSON answer (`Product_EU`, `Product`, ...).
fn document_commodity(root: &Value) -> Option<String> {
    match root {
        Value::Object(obj) => reported_text(obj, COMMODITY_KEYS),
        _ => None,
    }
}

/// `fallback` is the commodity for entries that name none.
fn parse_json_layout(root: &Value, fallback: Option<String>, parsed: &mut ParsedResponse) {
    let substances: Vec<&Value> = match root {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match field(obj, SUBSTANCE_LIST_KEYS) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(other) => {
                parsed.reject(&other.to_string(), "substance list is not an array");
                return;
            }
            // A lone measurement object.
            None => vec![root],
        },
        _ => Vec::new(),
    };

    for element in substances {
        let Value::Object(entry) = element else {
            parsed.reject(&element.to_string(), "substance entry is not an object");
            continue;
        };

        let Some(analyte) = reported_text(entry, ANALYTE_KEYS) else {
            parsed.reject(&element.to_string(), "substance entry has no name");
            continue;
        };

        // "Not found" is kept as a value: the normalizer reports it.
        let Some(value) = field(entry, VALUE_KEYS).and_then(literal_text) else {
            parsed.reject(&element.to_string(), "substance entry has no value");
            continue;
        };

        let commodity = reported_text(entry, COMMODITY_KEYS).or_else(|| fallback.clone());
        parsed.accept(&analyte, &value, commodity);
    }
}

/// Case-insensitive key lookup, first matching key in `keys` order wins.
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|wanted| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
            .map(|(_, v)| v)
    })
}

/// First field among `keys` holding a usable, reported text value.
fn reported_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        field(obj, &[key])
            .and_then(literal_text)
            .filter(|text| !is_not_reported(text))
    })
}

fn literal_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Line layout
// ---------------------------------------------------------------------------

struct LineParser {
    hint: Option<String>,
    current_commodity: Option<String>,
    /// Set for text around a parsed JSON block: lines without an
    /// analyte/value form are prose, not anomalies.
    skip_prose: bool,
}

impl LineParser {
    fn new(hint: Option<String>) -> Self {
        Self {
            hint,
            current_commodity: None,
            skip_prose: false,
        }
    }

    fn around_json(hint: Option<String>) -> Self {
        Self {
            skip_prose: true,
            ..Self::new(hint)
        }
    }

    fn commodity(&self) -> Option<String> {
        self.current_commodity.clone().or_else(|| self.hint.clone())
    }

    fn parse(&mut self, text: &str, parsed: &mut ParsedResponse) {
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("```") || TABLE_RULE.is_match(trimmed) {
                continue;
            }
            let content = BULLET.replace(trimmed, "");
            let content = content.trim();
            if content.is_empty() {
                continue;
            }

            if let Some(caps) = HEADER_LINE.captures(content) {
                let name = caps["commodity"].trim();
                if !name.is_empty() && !is_not_reported(name) {
                    self.current_commodity = Some(name.to_string());
                }
                continue;
            }

            if content.contains('|') {
                self.parse_table_row(content, trimmed, parsed);
            } else {
                self.parse_keyed(content, trimmed, parsed);
            }
        }
    }

    fn parse_table_row(&mut self, content: &str, raw: &str, parsed: &mut ParsedResponse) {
        let cells: Vec<&str> = content
            .trim_matches('|')
            .split('|')
            .map(str::trim)
            .collect();

        if cells
            .iter()
            .all(|c| TABLE_HEADER_WORDS.contains(&c.to_lowercase().as_str()))
        {
            return;
        }

        match cells.as_slice() {
            [analyte, value] => self.emit(analyte, None, value, raw, parsed),
            [analyte, commodity, value] => self.emit(analyte, Some(*commodity), value, raw, parsed),
            _ => parsed.reject(raw, format!("expected 2 or 3 columns, found {}", cells.len())),
        }
    }

    fn parse_keyed(&mut self, content: &str, raw: &str, parsed: &mut ParsedResponse) {
        match KEYED_LINE.captures(content) {
            // "Here is the result:" introduces the block.
            Some(caps) if self.skip_prose && caps["value"].trim().is_empty() => {}
            Some(caps) => {
                let commodity = caps.name("commodity").map(|m| m.as_str());
                self.emit(&caps["analyte"], commodity, &caps["value"], raw, parsed);
            }
            None if self.skip_prose => {}
            None => parsed.reject(raw, "no analyte/value separator"),
        }
    }

    fn emit(
        &self,
        analyte: &str,
        commodity: Option<&str>,
        value: &str,
        raw: &str,
        parsed: &mut ParsedResponse,
    ) {
        let analyte = analyte.trim().trim_matches('"');
        let value = value.trim().trim_end_matches(',').trim_matches('"');
        if analyte.is_empty() {
            parsed.reject(raw, "missing analyte name");
            return;
        }
        if value.trim().is_empty() {
            parsed.reject(raw, "missing value");
            return;
        }

        let commodity = commodity
            .map(str::trim)
            .filter(|c| !c.is_empty() && !is_not_reported(c))
            .map(str::to_string)
            .or_else(|| self.commodity());
        parsed.accept(analyte, value, commodity);
    }
}
