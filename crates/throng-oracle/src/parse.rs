//! Lenient extraction of JSON from raw LLM text.
//!
//! Models wrap JSON in prose, code fences, and trailing commas. Parsing
//! tries, in order:
//! 1. Direct deserialization
//! 2. The body of a markdown code block
//! 3. The outermost `{ ... }` span
//! 4. Each of the above with trailing commas stripped
//!
//! The target type is strict: a shape mismatch after every strategy is a
//! hard failure, never a default.

use serde::de::DeserializeOwned;

use crate::error::OracleError;

/// Parse raw response text into `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, OracleError> {
    let trimmed = raw.trim();

    let mut candidates: Vec<&str> = vec![trimmed];
    if let Some(block) = extract_json_from_codeblock(trimmed) {
        candidates.push(block);
    }
    if let Some(span) = outermost_object(trimmed) {
        candidates.push(span);
    }

    let mut last_error = None;
    for candidate in &candidates {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }
    for candidate in &candidates {
        if let Ok(value) = serde_json::from_str::<T>(&strip_trailing_commas(candidate)) {
            return Ok(value);
        }
    }

    Err(OracleError::Parse(match last_error {
        Some(e) => format!("{e}"),
        None => "empty response".to_owned(),
    }))
}

/// Extract the body of a markdown code block (```` ```json ```` or bare).
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = text.get(open.checked_add(3)?..)?;
    // Skip the info string (e.g. `json`) up to the first newline.
    let body_start = after_fence.find('\n').and_then(|nl| nl.checked_add(1))?;
    let body = after_fence.get(body_start..)?;
    let end = body.find("```")?;
    body.get(..end).map(str::trim)
}

/// The span from the first `{` to the last `}`.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    text.get(start..=end)
}

/// Strip commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == ',' {
            let rest: String = chars.clone().skip_while(|n| n.is_whitespace()).take(1).collect();
            if rest == "}" || rest == "]" {
                continue;
            }
        }
        result.push(c);
    }
    result
}
