//! JSON extraction utilities for parsing LLM responses.
//!
//! Structured-output modes usually return a bare JSON object, but models
//! still wrap answers in markdown fences or add a sentence before the payload.
//! Extraction tries, in order:
//!
//! 1. JSON in a ```json code block
//! 2. JSON in a generic code block
//! 3. Direct JSON (content starts with '{')
//! 4. The first balanced JSON object anywhere in the content
//!
//! # Example
//!
//! ```
//! use caseforge::utils::json_extraction::try_extract_json_from_response;
//!
//! let response = "Here is the record: {\"service_id\": 382}";
//! let json = try_extract_json_from_response(response).json().map(str::to_string);
//! assert_eq!(json.as_deref(), Some("{\"service_id\": 382}"));
//! ```

use std::sync::OnceLock;

use regex::Regex;

/// Result of a JSON extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtractionResult {
    /// Extracted text that parses as a JSON object.
    Success(String),
    /// An object was started but never closed.
    Truncated {
        partial_json: String,
        unclosed_braces: usize,
    },
    /// No JSON-like content in the response.
    NotFound,
}

impl JsonExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JsonExtractionResult::Success(_))
    }

    /// Returns the extracted JSON for the Success case.
    pub fn json(&self) -> Option<&str> {
        match self {
            JsonExtractionResult::Success(json) => Some(json),
            _ => None,
        }
    }
}

fn json_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)\s*\n?(.*?)```").expect("static regex is valid")
    })
}

fn generic_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[a-zA-Z]*\s*\n?(.*?)```").expect("static regex is valid")
    })
}

/// Attempts to extract a JSON object from an LLM response.
pub fn try_extract_json_from_response(content: &str) -> JsonExtractionResult {
    let trimmed = content.trim();

    for fence in [json_fence(), generic_fence()] {
        if let Some(body) = fence.captures(trimmed).and_then(|c| c.get(1)) {
            let body = body.as_str().trim();
            if is_json_object(body) {
                return JsonExtractionResult::Success(body.to_string());
            }
        }
    }

    let Some(start) = trimmed.find('{') else {
        return JsonExtractionResult::NotFound;
    };

    let mut search_from = start;
    while let Some(offset) = trimmed[search_from..].find('{') {
        let candidate_start = search_from + offset;
        let candidate = &trimmed[candidate_start..];
        match find_matching_brace(candidate) {
            Some(end) if is_json_object(&candidate[..=end]) => {
                return JsonExtractionResult::Success(candidate[..=end].to_string());
            }
            Some(_) => search_from = candidate_start + 1,
            None => break,
        }
    }

    let partial = &trimmed[start..];
    let unclosed_braces = unclosed_braces(partial);
    if unclosed_braces > 0 {
        JsonExtractionResult::Truncated {
            partial_json: partial.to_string(),
            unclosed_braces,
        }
    } else {
        JsonExtractionResult::NotFound
    }
}

fn is_json_object(candidate: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(candidate),
        Ok(serde_json::Value::Object(_))
    )
}

/// Finds the index of the brace closing the object that starts at `s[0]`.
///
/// String literals and escape sequences are skipped.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn unclosed_braces(s: &str) -> usize {
    let mut depth: isize = 0;
    let mut in_string = false;
    let mut escape_next = false;
    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth.max(0) as usize
}
