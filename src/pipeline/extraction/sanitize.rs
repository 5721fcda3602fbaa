/// Sanitize extracted text before passing downstream.
/// Strips control characters, trims lines, drops blank lines. Keeps the
/// punctuation lab reports use for values and units (`*`, `<`, `µ`, `/`).
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
