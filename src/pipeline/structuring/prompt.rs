/// Identifies the instruction template in every result artifact.
/// Bump whenever the wording below changes.
pub const PROMPT_VERSION: &str = "residue-json-v1";

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are an assistant that extracts pesticide residue measurements from
laboratory reports issued by EU laboratories. The report can be in any language.

RULES:
1. Extract ONLY information explicitly stated in the report.
2. Identify the product (commodity) tested and translate its name into English.
3. Identify every substance detected. Translate each name into English, using the
   usual English spelling with the first letter capitalized.
4. For each substance, copy the measured value exactly as written in the report,
   including its unit, and end the value with a single asterisk (*).
5. If you cannot find a value, write "Not found".
6. Return ONLY the JSON object, no additional text.
"#;

/// Build the extraction prompt for one document.
pub fn build_extraction_prompt(document_text: &str, commodity_hint: Option<&str>) -> String {
    let hint = match commodity_hint {
        Some(c) if !c.trim().is_empty() => {
            format!("NOTE: The submitting analyst states the product tested is \"{}\".\n", c.trim())
        }
        _ => String::new(),
    };

    format!(
        r#"{hint}
<document>
{document_text}
</document>

Extract the residue measurements from the above report into this JSON structure:

```json
{{
  "Product": "name of the product in the document language",
  "Product_EU": "name of the product in English",
  "Substances": [
    {{
      "Name": "name of the substance in the document language",
      "Name_EU": "name of the substance in English",
      "MRL": "measured value as written in the report, ending with *"
    }}
  ]
}}
```
"#
    )
}
