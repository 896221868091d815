//! Model-output cleanup before JSON parsing.
//!
//! Strips MedGemma thinking artifacts and Markdown fences, then reads the
//! first JSON object and ignores any prose after it.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static UNUSED_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*```[a-zA-Z]*\s*$").expect("valid regex"));

/// Remove thinking prefixes, stray `<unusedN>` tokens and code fences.
pub fn sanitize_model_output(raw: &str) -> String {
    let mut text = raw;

    // Thinking block: <unusedN>thought\n ... up to the answer.
    if let Some(idx) = text.find("<unused") {
        if let Some(offset) = text[idx..].find("thought\n") {
            text = &text[idx + offset + "thought\n".len()..];
        }
    }

    let text = UNUSED_TOKEN_RE.replace_all(text, "");
    let text = FENCE_RE.replace_all(&text, "");
    text.trim().to_string()
}

/// The JSON object starting at the first `{`. Trailing text is not read.
/// `None` when there is no `{` at all.
pub fn first_json_object(text: &str) -> Option<Result<Value, serde_json::Error>> {
    let start = text.find('{')?;
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()
}
