//! Utility functions shared across pipeline stages.
//!
//! This module provides:
//! - Order-preserving deduplication by identity key
//! - JSON extraction helpers for loosely formatted model output
//! - String helpers for logging, truncation, and title casing

use std::collections::HashSet;

/// Collapse a list down to unique identity keys, preserving first-seen order.
///
/// The first occurrence of each key wins. Items whose key is empty are
/// treated as always-unique: they are all retained and never matched as
/// duplicates of each other (a blank URL is not a duplicate of another
/// blank URL).
pub fn dedupe_by_key<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        let k = key(&item);
        if k.is_empty() || seen.insert(k) {
            unique.push(item);
        }
    }
    unique
}

/// Extract the outermost JSON object from free-form model text.
///
/// Models asked for "solo JSON" still occasionally wrap the payload in
/// prose. This takes the slice between the first `{` and the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Strip markdown code fences from model output.
///
/// Handles both ```` ```json ... ``` ```` and bare ```` ``` ... ``` ````
/// wrappers; text without fences is returned trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some((_, after)) = trimmed.split_once("```json") {
        if let Some((inner, _)) = after.split_once("```") {
            return inner.trim();
        }
        return after.trim();
    }
    if let Some((_, after)) = trimmed.split_once("```") {
        if let Some((inner, _)) = after.split_once("```") {
            return inner.trim();
        }
        return after.trim();
    }
    trimmed
}

/// Truncate a string to at most `max` characters, appending a byte-count
/// indicator when truncated. Used to keep model responses out of logs.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}…(+{} bytes)", cut, s.len() - cut.len())
}

/// Truncate to at most `max` characters on a character boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Capitalize the first letter of every whitespace-separated word.
///
/// Used to turn a raw user topic ("cassata siciliana") into an article
/// title ("Cassata Siciliana").
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
