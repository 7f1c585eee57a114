//! Pulls the generated text out of a response body.
//!
//! Endpoints have returned several shapes over time. Each matcher handles
//! one shape, is total (never panics) and has no side effects; they run in
//! order and the first non-empty match wins.

use serde_json::Value;

type Matcher = fn(&Value) -> Option<String>;

pub static RESPONSE_MATCHERS: &[(&str, Matcher)] = &[
    ("output_text", flat_output_text),
    ("output.content", nested_output_content),
    ("choices.message", legacy_chat_message),
    ("choices.text", legacy_completion_text),
];

pub fn extract_text(body: &Value) -> Option<String> {
    RESPONSE_MATCHERS.iter().find_map(|(name, matcher)| {
        let text = matcher(body)?;
        tracing::trace!(shape = name, "Matched AI response shape");
        Some(text)
    })
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `{"output_text": "..."}`
fn flat_output_text(body: &Value) -> Option<String> {
    body.get("output_text").and_then(non_empty)
}

/// `{"output": [{"content": [{"type": "output_text", "text": "..."}]}]}`
fn nested_output_content(body: &Value) -> Option<String> {
    body.get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| {
            part.get("type")
                .and_then(Value::as_str)
                .map_or(true, |kind| kind == "output_text" || kind == "text")
        })
        .find_map(|part| part.get("text").and_then(non_empty))
}

/// `{"choices": [{"message": {"content": "..."}}]}`
fn legacy_chat_message(body: &Value) -> Option<String> {
    body.get("choices")?
        .as_array()?
        .iter()
        .find_map(|choice| choice.get("message")?.get("content").and_then(non_empty))
}

/// `{"choices": [{"text": "..."}]}`
fn legacy_completion_text(body: &Value) -> Option<String> {
    body.get("choices")?
        .as_array()?
        .iter()
        .find_map(|choice| choice.get("text").and_then(non_empty))
}
