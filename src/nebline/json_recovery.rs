//! Recover a single well-formed JSON payload from free-form model output.
//!
//! Models asked for JSON still wrap it in markdown fences or chat around it.
//! [`unwrap_json`] tries, in order: the whole text, the first fenced code
//! block, and finally every `{`..`}` substring, keeping the longest one that
//! parses.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("failed to extract valid JSON from the provided text")]
pub struct NoJsonFound;

const FENCE: &str = "```";

fn parses(text: &str) -> bool {
    serde_json::from_str::<Value>(text).is_ok()
}

/// Content of the first fenced block, with an optional `json` tag dropped.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_open = &text[open + FENCE.len()..];
    let body = after_open.strip_prefix("json").unwrap_or(after_open);
    let close = body.find(FENCE)?;
    Some(body[..close].trim())
}

/// Longest `{`..`}` substring of `text` that parses as JSON, counted in chars.
///
/// Every (open, close) brace pair is a candidate, so braces inside string
/// literals only add candidates; they never cause a non-parsing answer.
pub fn find_largest_json_object(text: &str) -> Option<&str> {
    let opens: Vec<usize> = text.match_indices('{').map(|(i, _)| i).collect();
    let closes: Vec<usize> = text.match_indices('}').map(|(i, _)| i).collect();
    let last_close = *closes.last()?;

    let mut best: Option<(&str, usize)> = None;
    for &start in &opens {
        let best_chars = best.map_or(0, |(_, chars)| chars);
        // A span never holds more chars than bytes.
        if last_close < start || last_close - start + 1 <= best_chars {
            // Opens only move right, so no later start can beat `best`.
            break;
        }
        for &end in closes.iter().rev() {
            if end <= start || end - start + 1 <= best_chars {
                break;
            }
            let candidate = &text[start..=end];
            if parses(candidate) {
                let chars = candidate.chars().count();
                if chars > best_chars {
                    best = Some((candidate, chars));
                }
                break;
            }
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Return `text` itself when it is JSON, otherwise the JSON it contains.
pub fn unwrap_json(text: &str) -> Result<&str, NoJsonFound> {
    if parses(text) {
        return Ok(text);
    }

    if let Some(extracted) = fenced_block(text).filter(|block| !block.is_empty()) {
        if parses(extracted) {
            return Ok(extracted);
        }
        if let Some(inner) = find_largest_json_object(extracted) {
            return Ok(inner);
        }
    }

    find_largest_json_object(text).ok_or(NoJsonFound)
}
