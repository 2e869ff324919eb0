// src/eval/messages.rs

use super::EvalError;
use crate::dataset::Message;
use once_cell::sync::Lazy;
use regex::Regex;

const THINK_END: &str = "</think>";

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("valid fence regex")
});

/// Drop reasoning text. With a `</think>` marker present, only the segment between the first
/// marker and the next one (or the end) survives.
pub fn strip_think(text: &str) -> &str {
    if text.contains(THINK_END) {
        text.split(THINK_END).nth(1).unwrap_or("")
    } else {
        text
    }
}

/// Unwrap SQL enclosed in a single markdown code fence.
pub fn strip_code_fence(text: &str) -> &str {
    CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str())
}

/// The SQL candidate from the final message of a transcript.
pub fn extract_sql(messages: &[Message]) -> Result<String, EvalError> {
    let text = messages
        .last()
        .and_then(Message::text)
        .ok_or(EvalError::NoOutput)?;
    let sql = strip_code_fence(strip_think(text).trim()).trim();
    if sql.is_empty() {
        return Err(EvalError::EmptyOutput);
    }
    Ok(sql.to_string())
}
