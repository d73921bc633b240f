//! Reply post-processing shared by pipeline steps.
//!
//! Models occasionally wrap JSON in markdown code fences or leak literal
//! `null` fragments into word lists (`"hovedsakelig < null < null"`).  Both
//! are cleaned before a step output is merged into the field map.

use regex::Regex;

// ---------------------------------------------------------------------------
// Code fences
// ---------------------------------------------------------------------------

/// Strip a surrounding markdown code fence (with optional language tag) and
/// a bare `json` prefix, returning the inner body.
pub fn strip_code_fence(text: &str) -> String {
    let t = text.trim();

    if let Some(rest) = t.strip_prefix("```") {
        let rest = rest.trim_end().strip_suffix("```").unwrap_or(rest);
        // Drop the language tag on the opening fence line, if any.
        let body = match rest.split_once('\n') {
            Some((tag, body)) if tag.trim().len() <= 10 && !tag.contains('{') => body,
            _ => rest,
        };
        return body.trim().to_string();
    }

    // Some models prefix raw JSON with a bare "json" marker.
    if let Some(rest) = t.strip_prefix("json") {
        let rest_trimmed = rest.trim_start();
        if rest_trimmed.starts_with('{') || rest_trimmed.starts_with('[') {
            return rest_trimmed.to_string();
        }
    }

    t.to_string()
}

// ---------------------------------------------------------------------------
// Scrubber
// ---------------------------------------------------------------------------

/// Removes literal `null` fragments while keeping the valid word part.
#[derive(Debug)]
pub struct Scrubber {
    null_tail: Regex,
    null_head: Regex,
    null_word: Regex,
    spaces: Regex,
}

impl Scrubber {
    pub fn new() -> Self {
        Self {
            // "hovedsakelig < null < null" → "hovedsakelig"
            null_tail: Regex::new(r"(?im)\s*<\s*null.*$").expect("valid pattern"),
            // "null < ordet" → "ordet"
            null_head: Regex::new(r"(?im)^.*null\s*<\s*").expect("valid pattern"),
            null_word: Regex::new(r"(?i)\bnull\b").expect("valid pattern"),
            // Collapse runs of spaces/tabs but preserve newlines.
            spaces: Regex::new(r"[ \t]+").expect("valid pattern"),
        }
    }

    /// Clean `null` fragments and collapse horizontal whitespace.
    ///
    /// Returns an empty string when the input is `"null"` itself.
    pub fn scrub(&self, text: &str) -> String {
        if text.is_empty() || text.trim().eq_ignore_ascii_case("null") {
            return String::new();
        }

        let cleaned = self.null_tail.replace_all(text, "");
        let cleaned = self.null_head.replace_all(&cleaned, "");
        let cleaned = self.null_word.replace_all(&cleaned, "");
        let cleaned = self.spaces.replace_all(&cleaned, " ");
        cleaned.trim().to_string()
    }
}

impl Default for Scrubber {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
