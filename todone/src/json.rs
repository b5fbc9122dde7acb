//! JSON extraction from free-form agent output
//!
//! Agents often wrap the JSON they were asked for in a markdown fence or a
//! sentence of prose. Candidates are tried in order until one parses.

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

type Extractor = fn(&str) -> Option<&str>;

const EXTRACTORS: &[Extractor] = &[json_fence, any_fence, outer_brackets, whole_text];

/// Parse the first JSON candidate in `text` that deserializes into `T`
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let mut last_error = None;
    for candidate in EXTRACTORS.iter().filter_map(|extract| extract(text)) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }

    let preview: String = text.chars().take(200).collect();
    Err(match last_error {
        Some(e) => anyhow!("Failed to parse JSON from agent output: {e}. Output: {preview}"),
        None => anyhow!("No JSON found in agent output: {preview}"),
    })
}

fn json_fence(text: &str) -> Option<&str> {
    fenced(text, "```json")
}

fn any_fence(text: &str) -> Option<&str> {
    fenced(text, "```")
}

fn fenced<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let body = &text[start..];
    let end = body.find("```").unwrap_or(body.len());
    let inner = body[..end].trim();
    (!inner.is_empty()).then_some(inner)
}

fn outer_brackets(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '[' || c == '{')?;
    let close = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn whole_text(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
